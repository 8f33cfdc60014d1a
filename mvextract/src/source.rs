//! # Compressed packet source

use crate::prelude::v1::*;
use log::*;

/// Properties of the selected video stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamInfo {
    /// Coded width in pixels, `0` if not known before decoding.
    pub width: usize,
    /// Coded height in pixels, `0` if not known before decoding.
    pub height: usize,
    /// Average frame rate, if known.
    pub framerate: Option<f64>,
    /// Short name of the codec.
    pub codec: String,
    /// Number of frames as reported by the container.
    ///
    /// This is informational only. Many containers do not store it, and it may be inaccurate.
    pub frame_count: Option<u64>,
}

/// Container demultiplexer.
///
/// Opening is scoped acquisition: a successfully constructed demuxer owns the stream handle, and
/// dropping it closes the stream.
pub trait Demuxer: Sized {
    /// Compressed packet of the selected video stream.
    type Packet;
    /// Codec parameters needed to configure a matching decoder.
    type Params;

    /// Open a source and select its video stream.
    ///
    /// Fails if the source can not be read, its format is not supported, or it has no video
    /// stream.
    fn open(path: &str, config: &CaptureConfig) -> Result<Self>;

    /// Read the next packet of the video stream in decode order.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    fn next_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// Parameters of the selected stream.
    fn params(&self) -> &Self::Params;

    /// Information about the selected stream.
    fn info(&self) -> &StreamInfo;
}

/// Owner of an optional open [`Demuxer`].
pub struct SourceReader<D> {
    demuxer: Option<D>,
}

impl<D> Default for SourceReader<D> {
    fn default() -> Self {
        Self { demuxer: None }
    }
}

impl<D: Demuxer> SourceReader<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a source, closing any previously opened one.
    ///
    /// Returns `false` if the source could not be opened. The reader is closed in that case.
    pub fn open(&mut self, path: &str, config: &CaptureConfig) -> bool {
        self.close();

        match D::open(path, config) {
            Ok(demuxer) => {
                debug!("Opened {}: {:?}", path, demuxer.info());
                self.demuxer = Some(demuxer);
                true
            }
            Err(e) => {
                warn!("Failed to open {}: {}", path, e);
                false
            }
        }
    }

    /// Read the next packet.
    ///
    /// A closed reader behaves like an exhausted one.
    pub fn read_next_packet(&mut self) -> Result<Option<D::Packet>> {
        match &mut self.demuxer {
            Some(demuxer) => demuxer.next_packet(),
            None => Ok(None),
        }
    }

    /// Close the source. Does nothing if it is not open.
    pub fn close(&mut self) {
        if self.demuxer.take().is_some() {
            debug!("Closed source");
        }
    }

    pub fn is_open(&self) -> bool {
        self.demuxer.is_some()
    }

    pub fn demuxer(&self) -> Option<&D> {
        self.demuxer.as_ref()
    }
}
