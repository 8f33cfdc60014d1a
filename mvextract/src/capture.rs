//! # Capture session
//!
//! [`VideoCap`] is the user facing side of the library. It opens a source, and then hands out one
//! [`DecodedUnit`] per frame until the stream ends:
//!
//! ```ignore
//! let mut cap = AvVideoCap::new();
//!
//! if cap.open("vid_h264.mp4") {
//!     loop {
//!         let unit = cap.read();
//!         if !unit.success {
//!             break;
//!         }
//!         println!("{} {:?}", unit.frame_type, unit.motion_vectors.shape());
//!     }
//! }
//! ```
//!
//! No call on a session ever fails loudly. Whether the stream ended, was never opened, or broke
//! mid-way, reads return the same failure unit (see [`DecodedUnit::failure`]).

use crate::decoder::{CodecDecoder, DecodedFrame, DecoderState, FrameDecoder};
use crate::motion;
use crate::prelude::v1::*;
use crate::source::{SourceReader, StreamInfo};
use log::*;

/// Result of a single read.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedUnit {
    /// Whether a frame was produced.
    pub success: bool,
    /// Reconstructed pixels, absent when frame decoding is disabled or on failure.
    pub frame: Option<PixelFrame>,
    /// Motion vectors of the frame, empty on failure.
    pub motion_vectors: MotionVectorTable,
    /// Coding type of the frame, `Unknown` on failure.
    pub frame_type: FrameType,
    /// Presentation time of the frame in seconds, if known.
    pub timestamp: Option<f64>,
}

impl DecodedUnit {
    /// The unit returned whenever no frame is available.
    pub fn failure() -> Self {
        Self {
            success: false,
            frame: None,
            motion_vectors: MotionVectorTable::new(),
            frame_type: FrameType::Unknown,
            timestamp: None,
        }
    }

    /// Split into `(success, frame, motion_vectors, frame_type)`.
    pub fn into_parts(self) -> (bool, Option<PixelFrame>, MotionVectorTable, FrameType) {
        (
            self.success,
            self.frame,
            self.motion_vectors,
            self.frame_type,
        )
    }
}

impl From<DecodedFrame> for DecodedUnit {
    fn from(frame: DecodedFrame) -> Self {
        Self {
            success: true,
            motion_vectors: motion::collect(&frame),
            frame: frame.pixels,
            frame_type: frame.frame_type,
            timestamp: frame.timestamp,
        }
    }
}

/// Motion vector capture session over a demuxer `D` and codec `C`.
pub struct VideoCap<D, C> {
    config: CaptureConfig,
    source: SourceReader<D>,
    decoder: Option<FrameDecoder<C>>,
    grabbed: Option<DecodedFrame>,
    decode_frames: bool,
    frame_type: FrameType,
}

impl<D: Demuxer, C: CodecDecoder<D>> Default for VideoCap<D, C> {
    fn default() -> Self {
        Self::with_config(Default::default())
    }
}

impl<D: Demuxer, C: CodecDecoder<D>> VideoCap<D, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session that opens sources with given configuration.
    pub fn with_config(config: CaptureConfig) -> Self {
        Self {
            config,
            source: SourceReader::new(),
            decoder: None,
            grabbed: None,
            decode_frames: true,
            frame_type: FrameType::Unknown,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Open a video file or stream.
    ///
    /// Any previously opened source is released first. Returns `false` if the source can not be
    /// read, has no video stream, or its codec is not supported, leaving the session closed.
    ///
    /// Frame decoding is enabled after a successful open.
    pub fn open(&mut self, path: &str) -> bool {
        self.release();

        if !self.source.open(path, &self.config) {
            return false;
        }

        let decoder = self
            .source
            .demuxer()
            .ok_or_else(|| anyhow!("Source not open"))
            .and_then(|demuxer| FrameDecoder::new(demuxer, &self.config));

        match decoder {
            Ok(decoder) => {
                self.decoder = Some(decoder);
                true
            }
            Err(e) => {
                warn!("Failed to configure decoder for {}: {}", path, e);
                self.source.close();
                false
            }
        }
    }

    /// Whether a source is open.
    ///
    /// This stays `true` after the end of the stream has been reached, until the session is
    /// released. A decoding error closes the source, and this turns `false` together with
    /// [`stream_info`](Self::stream_info) becoming `None`.
    pub fn is_opened(&self) -> bool {
        self.decoder
            .as_ref()
            .map(|d| d.state() != DecoderState::Error)
            .unwrap_or(false)
    }

    /// Information about the opened stream.
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.source.demuxer().map(|d| d.info())
    }

    /// Decode the next frame, keeping it for [`retrieve`](Self::retrieve).
    ///
    /// Returns `false` at the end of the stream, on a decoding error, or if the session is not
    /// open. A decoding error is final: the stream is closed, and every later grab fails until
    /// the session is released or reopened.
    pub fn grab(&mut self) -> bool {
        self.grabbed = None;
        self.frame_type = FrameType::Unknown;

        let decoder = match &mut self.decoder {
            Some(decoder) if decoder.state() != DecoderState::Error => decoder,
            // Failures were reported when they happened.
            _ => return false,
        };

        match decoder.decode_next(&mut self.source, self.decode_frames) {
            Ok(Some(frame)) => {
                self.frame_type = frame.frame_type;
                self.grabbed = Some(frame);
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("Stopping capture: {}", e);
                self.source.close();
                false
            }
        }
    }

    /// Hand out the frame decoded by the last successful [`grab`](Self::grab).
    ///
    /// The frame is moved out of the session, so unlike OpenCV's `retrieve` it can only be
    /// retrieved once. Without a new grab, further calls return [`DecodedUnit::failure`].
    pub fn retrieve(&mut self) -> DecodedUnit {
        self.grabbed
            .take()
            .map(DecodedUnit::from)
            .unwrap_or_else(DecodedUnit::failure)
    }

    /// Grab and retrieve the next frame.
    pub fn read(&mut self) -> DecodedUnit {
        if self.grab() {
            self.retrieve()
        } else {
            DecodedUnit::failure()
        }
    }

    /// Close the source and decoder.
    ///
    /// Frame decoding is re-enabled. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.close();
        }

        self.source.close();
        self.grabbed = None;
        self.frame_type = FrameType::Unknown;
        self.decode_frames = true;
    }

    /// Enable or disable pixel reconstruction for subsequent reads.
    ///
    /// With frame decoding disabled, reads still produce motion vectors and frame types, but no
    /// frame. Frames that other frames predict from are always fully decoded, so once decoding is
    /// enabled again, frames match those of a session that never disabled it. The exception is
    /// a non-reference frame the codec already decoded and held back for reordering when the flag
    /// was flipped: it may come out without post-processing such as deblocking.
    pub fn set_decode_frames(&mut self, enable: bool) {
        self.decode_frames = enable;
    }

    /// Whether reads reconstruct pixels.
    pub fn decode_frames(&self) -> bool {
        self.decode_frames
    }

    /// Coding type of the last grabbed frame.
    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }
}

impl<D, C> Drop for VideoCap<D, C> {
    fn drop(&mut self) {
        // Codec before the stream it was configured from.
        self.decoder = None;
    }
}
