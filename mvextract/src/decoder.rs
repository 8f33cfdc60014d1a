//! # Frame decoding
//!
//! The [`FrameDecoder`] drives a [`CodecDecoder`] with packets from a [`SourceReader`]. Codecs
//! may hold on to several packets before emitting a frame (bidirectional prediction reorders
//! frames), and keep frames buffered when input runs out. Both are handled by an explicit state
//! machine, see [`DecoderState`].

use crate::prelude::v1::*;
use crate::source::SourceReader;
use log::*;

/// Frame as produced by a codec, before motion vectors are collected.
#[derive(Clone, Debug, Default)]
pub struct DecodedFrame {
    /// Coding type of the frame.
    pub frame_type: FrameType,
    /// Reconstructed pixels, only present if reconstruction was requested.
    pub pixels: Option<PixelFrame>,
    /// Raw motion vector side data blocks, in emission order.
    pub motion_side_data: Vec<Vec<u8>>,
    /// Presentation time in seconds.
    pub timestamp: Option<f64>,
}

/// Result of pulling a frame out of a codec.
#[derive(Debug)]
pub enum Pulled<T> {
    /// A frame is ready.
    Frame(T),
    /// The codec needs more input before it can emit another frame.
    NeedsMoreInput,
    /// The codec has been flushed and has no more frames.
    Drained,
}

/// Video codec decoder.
///
/// Implementations must export motion vectors as side data of every decoded frame.
pub trait CodecDecoder<D: Demuxer>: Sized {
    /// Create a decoder matching the parameters of an opened stream.
    fn configure(params: &D::Params, config: &CaptureConfig) -> Result<Self>;

    /// Select whether frames are fully reconstructed.
    ///
    /// When disabled, the bitstream must still be parsed completely so that motion vectors and
    /// frame types are unaffected, but the decoder may skip any work that only contributes to
    /// pixel output, and [`DecodedFrame::pixels`] must be `None`. Applies to frames pulled after
    /// the call.
    fn set_reconstruct(&mut self, reconstruct: bool);

    /// Submit a packet. `None` signals the end of input, after which buffered frames are drained.
    fn send_packet(&mut self, packet: Option<&D::Packet>) -> Result<()>;

    /// Pull the next decoded frame.
    fn receive_frame(&mut self) -> Result<Pulled<DecodedFrame>>;
}

/// State of a [`FrameDecoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    /// Configured, no input submitted yet.
    Idle,
    /// Input submitted, no frame ready.
    AwaitingInput,
    /// A frame has been produced and is being handed out.
    FrameReady,
    /// Input is exhausted, buffered frames are being drained.
    Flushing,
    /// Unrecoverable error. Terminal.
    Error,
    /// All frames have been produced, or the decoder was closed.
    Closed,
}

/// Events that drive [`DecoderState`] transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderEvent {
    /// A packet was submitted to the codec.
    PacketFed,
    /// The codec produced a frame.
    FramePulled,
    /// The produced frame was handed to the caller.
    FrameConsumed,
    /// The source has no more packets.
    InputExhausted,
    /// The codec has no more frames.
    Drained,
    /// Reading, feeding or pulling failed.
    Failed,
    /// The decoder is shut down.
    Close,
}

impl DecoderState {
    /// Compute the state after `event`.
    pub fn on(self, event: DecoderEvent) -> Self {
        use DecoderEvent::*;
        use DecoderState::*;

        match (self, event) {
            (_, Close) => Closed,
            (Error, _) => Error,
            (_, Failed) => Error,
            (Closed, _) => Closed,
            (_, Drained) => Closed,
            // Frames drained after the end of input keep the decoder flushing.
            (Flushing, _) => Flushing,
            (_, InputExhausted) => Flushing,
            (_, PacketFed) => AwaitingInput,
            (_, FramePulled) => FrameReady,
            (FrameReady, FrameConsumed) => AwaitingInput,
            (state, FrameConsumed) => state,
        }
    }

    /// Whether more frames may still be produced.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Error | Self::Closed)
    }

    /// Move to the state after `event` in place, returning the new state.
    pub fn apply(&mut self, event: DecoderEvent) -> Self {
        let next = self.on(event);

        if next != *self {
            trace!("Decoder {:?} -> {:?} ({:?})", self, next, event);
        }

        *self = next;
        next
    }
}

/// Decoding loop around a [`CodecDecoder`].
pub struct FrameDecoder<C> {
    codec: Option<C>,
    state: DecoderState,
}

impl<C> FrameDecoder<C> {
    pub fn state(&self) -> DecoderState {
        self.state
    }

    fn transition(&mut self, event: DecoderEvent) {
        // No way back out of these, so let go of the codec right away.
        if !self.state.apply(event).is_live() {
            self.codec = None;
        }
    }

    /// Shut the decoder down, releasing the codec.
    pub fn close(&mut self) {
        self.transition(DecoderEvent::Close);
    }

    /// Configure a decoder for the source's stream.
    pub fn new<D: Demuxer>(demuxer: &D, config: &CaptureConfig) -> Result<Self>
    where
        C: CodecDecoder<D>,
    {
        let codec = C::configure(demuxer.params(), config)?;

        Ok(Self {
            codec: Some(codec),
            state: DecoderState::Idle,
        })
    }

    /// Decode the next frame.
    ///
    /// Packets are read from `source` and fed into the codec until it emits a frame. Once the
    /// source is exhausted, the codec is flushed and its buffered frames are returned one by one.
    ///
    /// Returns `Ok(None)` once every frame has been produced. An error moves the decoder into the
    /// terminal [`DecoderState::Error`] state, and every later call fails as well.
    ///
    /// # Arguments
    ///
    /// * `source` - packet source the codec was configured for.
    /// * `reconstruct` - whether to reconstruct pixels of the frame.
    pub fn decode_next<D: Demuxer>(
        &mut self,
        source: &mut SourceReader<D>,
        reconstruct: bool,
    ) -> Result<Option<DecodedFrame>>
    where
        C: CodecDecoder<D>,
    {
        self.transition(DecoderEvent::FrameConsumed);

        match self.pull(source, reconstruct) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                debug!("Decoding failed in {:?}: {}", self.state, e);
                self.transition(DecoderEvent::Failed);
                Err(e)
            }
        }
    }

    fn pull<D: Demuxer>(
        &mut self,
        source: &mut SourceReader<D>,
        reconstruct: bool,
    ) -> Result<Option<DecodedFrame>>
    where
        C: CodecDecoder<D>,
    {
        match self.state {
            DecoderState::Error => return Err(anyhow!("Decoder is in a failed state")),
            DecoderState::Closed => return Ok(None),
            _ => {}
        }

        let codec = self
            .codec
            .as_mut()
            .ok_or_else(|| anyhow!("Decoder has no codec"))?;

        codec.set_reconstruct(reconstruct);

        loop {
            match codec.receive_frame()? {
                Pulled::Frame(frame) => {
                    self.transition(DecoderEvent::FramePulled);
                    return Ok(Some(frame));
                }
                Pulled::Drained => {
                    debug!("Decoder drained");
                    self.transition(DecoderEvent::Drained);
                    return Ok(None);
                }
                // A codec that keeps asking for input after the flush has nothing left.
                Pulled::NeedsMoreInput if self.state == DecoderState::Flushing => {
                    debug!("Decoder exhausted during flush");
                    self.transition(DecoderEvent::Drained);
                    return Ok(None);
                }
                Pulled::NeedsMoreInput => match source.read_next_packet()? {
                    Some(packet) => {
                        codec.send_packet(Some(&packet))?;
                        self.state.apply(DecoderEvent::PacketFed);
                    }
                    None => {
                        debug!("End of input, flushing decoder");
                        codec.send_packet(None)?;
                        self.state.apply(DecoderEvent::InputExhausted);
                    }
                },
            }
        }
    }
}
