//! # libavcodec decoder with motion vector export

use crate::demuxer::{AvDemuxer, AvPacket, AvStreamParams};
use crate::utils::*;
use c_str_macro::c_str;
use ffmpeg_sys_next::*;
use libc::{c_int, EAGAIN};
use log::*;
use mvextract::prelude::v1::*;
use std::ops::{Deref, DerefMut};
use std::{ptr, slice};

struct CodecContext(&'static mut AVCodecContext);

impl Drop for CodecContext {
    fn drop(&mut self) {
        let mut ctx: *mut AVCodecContext = &mut *self.0;
        unsafe { avcodec_free_context(&mut ctx) };
    }
}

impl Deref for CodecContext {
    type Target = AVCodecContext;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for CodecContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

struct Frame(&'static mut AVFrame);

impl Drop for Frame {
    fn drop(&mut self) {
        let mut frame: *mut AVFrame = &mut *self.0;
        unsafe { av_frame_free(&mut frame) };
    }
}

/// Frame received from the codec. Its buffers are released on drop.
struct RefFrame<'a> {
    frame: &'a mut AVFrame,
}

impl<'a> Drop for RefFrame<'a> {
    fn drop(&mut self) {
        unsafe { av_frame_unref(self.frame) };
    }
}

impl<'a> Deref for RefFrame<'a> {
    type Target = AVFrame;

    fn deref(&self) -> &Self::Target {
        self.frame
    }
}

/// Converts decoded frames to packed BGR.
struct Scaler {
    ctx: *mut SwsContext,
    /// Output size, fixed by the stream parameters or the first converted frame.
    out_size: Option<(c_int, c_int)>,
}

impl Drop for Scaler {
    fn drop(&mut self) {
        if !self.ctx.is_null() {
            unsafe { sws_freeContext(self.ctx) };
        }
    }
}

/// Pixel format of a decoded frame, as stored in `AVFrame::format`.
///
/// Fails for formats swscale can not read from.
fn frame_format(format: c_int) -> Result<AVPixelFormat> {
    if format < 0 || format >= AVPixelFormat::AV_PIX_FMT_NB as c_int {
        return Err(anyhow!("Invalid pixel format {}", format));
    }

    // SAFETY: in range of the enum's discriminants, which are contiguous.
    let format = unsafe { std::mem::transmute::<c_int, AVPixelFormat>(format) };

    match unsafe { sws_isSupportedInput(format) } {
        0 => Err(anyhow!("Unsupported pixel format {:?}", format)),
        _ => Ok(format),
    }
}

impl Scaler {
    fn convert(&mut self, frame: &AVFrame) -> Result<PixelFrame> {
        let src_fmt = frame_format(frame.format)?;

        let (w, h) = *self.out_size.get_or_insert((frame.width, frame.height));

        if w <= 0 || h <= 0 || frame.width <= 0 || frame.height <= 0 {
            return Err(anyhow!("Invalid frame size {}x{}", frame.width, frame.height));
        }

        // Frames of a different size are rescaled so the output shape stays fixed.
        self.ctx = unsafe {
            sws_getCachedContext(
                self.ctx,
                frame.width,
                frame.height,
                src_fmt,
                w,
                h,
                AVPixelFormat::AV_PIX_FMT_BGR24,
                SWS_BILINEAR as c_int,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null(),
            )
        };

        if self.ctx.is_null() {
            return Err(anyhow!("Unable to convert from {:?}", src_fmt));
        }

        let mut out = PixelFrame::new(w as usize, h as usize);

        let dst = [
            out.as_mut_slice().as_mut_ptr(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
        ];
        let dst_stride: [c_int; 4] = [w * 3, 0, 0, 0];

        match unsafe {
            sws_scale(
                self.ctx,
                frame.data.as_ptr() as *const *const u8,
                frame.linesize.as_ptr(),
                0,
                frame.height,
                dst.as_ptr(),
                dst_stride.as_ptr(),
            )
        } {
            e if e <= 0 => Err(anyhow!("Failed to convert frame ({})", e)),
            _ => Ok(out),
        }
    }
}

/// libavcodec decoder exporting motion vectors.
pub struct AvCodec {
    codec_ctx: CodecContext,
    frame: Frame,
    scaler: Scaler,
    time_base: AVRational,
    reconstruct: bool,
}

impl CodecDecoder<AvDemuxer> for AvCodec {
    fn configure(params: &AvStreamParams, config: &CaptureConfig) -> Result<Self> {
        let codecpar =
            unsafe { params.codecpar.as_ref() }.ok_or_else(|| anyhow!("Codec parameters null"))?;

        let decoder = unsafe { avcodec_find_decoder(codecpar.codec_id).as_ref() }
            .ok_or_else(|| anyhow!("No decoder for {}", codec_name(codecpar.codec_id)))?;

        let mut codec_ctx = CodecContext(
            unsafe { avcodec_alloc_context3(decoder).as_mut() }
                .ok_or_else(|| anyhow!("Failed to allocate codec context"))?,
        );

        match unsafe { avcodec_parameters_to_context(&mut *codec_ctx, codecpar) } {
            e if e < 0 => return Err(anyhow!("Failed to get codec parameters: {}", av_err(e))),
            _ => {}
        }

        let mut opts = Dictionary::default();
        opts.set(c_str!("flags2"), "+export_mvs")?;
        opts.set(
            c_str!("threads"),
            &match config.decoder_threads {
                0 => "auto".to_string(),
                n => n.to_string(),
            },
        )?;

        match unsafe { avcodec_open2(&mut *codec_ctx, decoder, opts.as_mut_ptr()) } {
            e if e < 0 => return Err(anyhow!("Failed to open codec: {}", av_err(e))),
            _ => {}
        }

        let frame = Frame(
            unsafe { av_frame_alloc().as_mut() }
                .ok_or_else(|| anyhow!("Unable to allocate frame"))?,
        );

        let out_size = Some((codecpar.width, codecpar.height)).filter(|&(w, h)| w > 0 && h > 0);

        debug!(
            "Configured {} decoder, output size {:?}",
            codec_name(codecpar.codec_id),
            out_size
        );

        Ok(Self {
            codec_ctx,
            frame,
            scaler: Scaler {
                ctx: ptr::null_mut(),
                out_size,
            },
            time_base: params.time_base,
            reconstruct: true,
        })
    }

    fn set_reconstruct(&mut self, reconstruct: bool) {
        if reconstruct != self.reconstruct {
            debug!("Frame reconstruction {}", if reconstruct { "on" } else { "off" });
        }

        self.reconstruct = reconstruct;

        // Deblocking only touches pixels, motion vectors come out of the parsing stage. Reference
        // pictures are always deblocked, so later frames predict from the same pixels either way.
        self.codec_ctx.skip_loop_filter = if reconstruct {
            AVDiscard::AVDISCARD_DEFAULT
        } else {
            AVDiscard::AVDISCARD_NONREF
        };
    }

    fn send_packet(&mut self, packet: Option<&AvPacket>) -> Result<()> {
        let packet = packet.map_or(ptr::null(), |p| &**p as *const AVPacket);

        match unsafe { avcodec_send_packet(&mut *self.codec_ctx, packet) } {
            // Already flushing.
            e if e == AVERROR_EOF => Ok(()),
            e if e < 0 => Err(anyhow!("Failed to send packet: {}", av_err(e))),
            _ => Ok(()),
        }
    }

    fn receive_frame(&mut self) -> Result<Pulled<DecodedFrame>> {
        let ret = unsafe { avcodec_receive_frame(&mut *self.codec_ctx, &mut *self.frame.0) };

        let frame = match ret {
            e if e == AVERROR(EAGAIN) => return Ok(Pulled::NeedsMoreInput),
            e if e == AVERROR_EOF => return Ok(Pulled::Drained),
            e if e < 0 => return Err(anyhow!("Failed to receive frame: {}", av_err(e))),
            _ => RefFrame {
                frame: &mut *self.frame.0,
            },
        };

        let tag = unsafe { av_get_picture_type_char(frame.pict_type) } as u8 as char;
        let frame_type = FrameType::from_tag(tag);

        let motion_side_data = unsafe {
            av_frame_get_side_data(
                &*frame,
                AVFrameSideDataType::AV_FRAME_DATA_MOTION_VECTORS,
            )
            .as_ref()
        }
        .filter(|sd| !sd.data.is_null() && sd.size > 0)
        .map(|sd| unsafe { slice::from_raw_parts(sd.data, sd.size as usize) }.to_vec())
        .into_iter()
        .collect::<Vec<_>>();

        trace!(
            "Frame {} with {} bytes of motion vectors",
            tag,
            motion_side_data.iter().map(Vec::len).sum::<usize>()
        );

        // i64::MIN is libav's "no timestamp" value.
        let timestamp = Some(frame.best_effort_timestamp)
            .filter(|&ts| ts != i64::MIN && self.time_base.den != 0)
            .map(|ts| ts as f64 * self.time_base.num as f64 / self.time_base.den as f64);

        let pixels = if self.reconstruct {
            Some(self.scaler.convert(&frame)?)
        } else {
            None
        };

        Ok(Pulled::Frame(DecodedFrame {
            frame_type,
            pixels,
            motion_side_data,
            timestamp,
        }))
    }
}
