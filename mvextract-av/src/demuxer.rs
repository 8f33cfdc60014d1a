//! # libavformat demuxer

use crate::utils::*;
use c_str_macro::c_str;
use ffmpeg_sys_next::*;
use libc::c_int;
use log::*;
use mvextract::prelude::v1::*;
use std::ffi::CString;
use std::ops::{Deref, DerefMut};
use std::ptr;

struct FormatContext(&'static mut AVFormatContext);

impl Drop for FormatContext {
    fn drop(&mut self) {
        let mut ctx: *mut AVFormatContext = &mut *self.0;
        unsafe { avformat_close_input(&mut ctx) };
    }
}

impl Deref for FormatContext {
    type Target = AVFormatContext;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for FormatContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

/// Owned compressed packet.
pub struct AvPacket(&'static mut AVPacket);

impl AvPacket {
    fn try_new() -> Result<Self> {
        unsafe { av_packet_alloc().as_mut() }
            .map(Self)
            .ok_or_else(|| anyhow!("Failed to allocate packet"))
    }
}

impl Drop for AvPacket {
    fn drop(&mut self) {
        let mut packet: *mut AVPacket = &mut *self.0;
        unsafe { av_packet_free(&mut packet) };
    }
}

impl Deref for AvPacket {
    type Target = AVPacket;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for AvPacket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

/// Codec parameters of the selected stream.
///
/// Points into the demuxer's format context, and is only valid while the demuxer is alive.
pub struct AvStreamParams {
    pub(crate) codecpar: *const AVCodecParameters,
    pub(crate) time_base: AVRational,
}

/// Demuxer of any container libavformat can read.
pub struct AvDemuxer {
    fmt_ctx: FormatContext,
    stream_idx: c_int,
    params: AvStreamParams,
    info: StreamInfo,
}

impl Demuxer for AvDemuxer {
    type Packet = AvPacket;
    type Params = AvStreamParams;

    fn open(path: &str, config: &CaptureConfig) -> Result<Self> {
        crate::set_log_level(config);

        let c_path = CString::new(path)?;

        let mut opts = Dictionary::default();

        if CaptureConfig::is_rtsp(path) {
            if let Some(transport) = &config.rtsp_transport {
                opts.set(c_str!("rtsp_transport"), transport)?;
            }
        }

        let mut fmt_ctx: Option<&'static mut AVFormatContext> = None;

        match unsafe {
            avformat_open_input(
                fmt_ctx.as_mut_ptr(),
                c_path.as_ptr(),
                ptr::null_mut(),
                opts.as_mut_ptr(),
            )
        } {
            e if e < 0 => return Err(anyhow!("Unable to open input: {}", av_err(e))),
            _ => {}
        }

        let mut fmt_ctx =
            FormatContext(fmt_ctx.ok_or_else(|| anyhow!("Format context not allocated"))?);

        match unsafe { avformat_find_stream_info(&mut *fmt_ctx, ptr::null_mut()) } {
            e if e < 0 => return Err(anyhow!("Failed to read stream info: {}", av_err(e))),
            _ => {}
        }

        let stream_idx = match unsafe {
            av_find_best_stream(
                &mut *fmt_ctx,
                AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                ptr::null_mut(),
                0,
            )
        } {
            e if e < 0 => return Err(anyhow!("Failed to find a video stream: {}", av_err(e))),
            i => i,
        };

        let stream = unsafe { (*fmt_ctx.streams.offset(stream_idx as _)).as_ref() }
            .ok_or_else(|| anyhow!("Stream info null"))?;

        let codecpar =
            unsafe { stream.codecpar.as_ref() }.ok_or_else(|| anyhow!("Codec parameters null"))?;

        let framerate = [stream.avg_frame_rate, stream.r_frame_rate]
            .into_iter()
            .find(|r| r.num != 0 && r.den != 0)
            .map(|r| r.num as f64 / r.den as f64);

        let info = StreamInfo {
            width: codecpar.width.max(0) as usize,
            height: codecpar.height.max(0) as usize,
            framerate,
            codec: codec_name(codecpar.codec_id),
            frame_count: (stream.nb_frames > 0).then(|| stream.nb_frames as u64),
        };

        debug!("Selected video stream {}: {:?}", stream_idx, info);

        let params = AvStreamParams {
            codecpar,
            time_base: stream.time_base,
        };

        Ok(Self {
            fmt_ctx,
            stream_idx,
            params,
            info,
        })
    }

    fn next_packet(&mut self) -> Result<Option<AvPacket>> {
        loop {
            let mut packet = AvPacket::try_new()?;

            match unsafe { av_read_frame(&mut *self.fmt_ctx, &mut *packet) } {
                e if e == AVERROR_EOF => return Ok(None),
                e if e < 0 => return Err(anyhow!("Failed to read packet: {}", av_err(e))),
                _ => {}
            }

            trace!("Read packet: {} {}", packet.stream_index, packet.size);

            if packet.stream_index == self.stream_idx {
                return Ok(Some(packet));
            }
        }
    }

    fn params(&self) -> &AvStreamParams {
        &self.params
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }
}
