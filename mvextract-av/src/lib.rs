//! # Motion vector capture through FFmpeg's libav
//!
//! Provides [`AvDemuxer`] and [`AvCodec`], the libavformat and libavcodec backed collaborators
//! of [`VideoCap`]. Motion vectors are requested from the decoder through `+export_mvs`, and
//! read back from each frame's side data.
//!
//! ```no_run
//! use mvextract_av::AvVideoCap;
//!
//! let mut cap = AvVideoCap::new();
//! assert!(cap.open("vid_h264.mp4"));
//!
//! while let (true, frame, motion_vectors, frame_type) = cap.read().into_parts() {
//!     println!("{frame_type}: {} vectors, frame: {}", motion_vectors.len(), frame.is_some());
//! }
//!
//! cap.release();
//! ```

use ffmpeg_sys_next::{av_log_set_level, AV_LOG_QUIET, AV_LOG_WARNING};
use mvextract::prelude::v1::*;

pub mod codec;
pub mod demuxer;
pub mod utils;

pub use codec::AvCodec;
pub use demuxer::{AvDemuxer, AvPacket, AvStreamParams};
pub use mvextract::VideoCap;

/// Capture session reading through libav.
pub type AvVideoCap = VideoCap<AvDemuxer, AvCodec>;

pub(crate) fn set_log_level(config: &CaptureConfig) {
    let level = if config.quiet {
        AV_LOG_QUIET
    } else {
        AV_LOG_WARNING
    };

    unsafe { av_log_set_level(level as _) };
}
