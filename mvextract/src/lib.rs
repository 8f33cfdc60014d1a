//! # Compressed domain motion vector extraction
//!
//! This library reads encoded video and hands out the motion vectors the codec used to predict
//! each frame, together with the frame's coding type and, optionally, its reconstructed pixels.
//! Motion vectors are a by-product of parsing the bitstream, so they can be had much more cheaply
//! than a full decode. Turning off frame decoding (see [`VideoCap::set_decode_frames`]) skips the
//! reconstruction work that is only needed for pixel output.
//!
//! The library itself does not depend on any particular video library. Containers and codecs are
//! plugged in through the [`Demuxer`] and [`CodecDecoder`] traits. The `mvextract-av` crate
//! implements them on top of FFmpeg.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use mvextract::prelude::v1::*;
//! ```

pub mod capture;
pub mod config;
pub mod decoder;
pub mod frame;
pub mod motion;
pub mod source;

#[cfg(test)]
mod mock;

pub use capture::{DecodedUnit, VideoCap};
pub use decoder::CodecDecoder;
pub use source::Demuxer;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            capture::{DecodedUnit, VideoCap},
            config::CaptureConfig,
            decoder::{CodecDecoder, DecodedFrame, Pulled},
            frame::{FrameType, PixelFrame},
            motion::{MotionVector, MotionVectorTable, RawMotionVector},
            source::{Demuxer, StreamInfo},
        };
        pub use anyhow::{anyhow, Context, Error, Result};
    }
}
