//! Scripted collaborators for tests.
//!
//! A mock source is described by its path: `mock://<types>?delay=<n>&fail=<packet>&codec=none`.
//! `types` lists the coding types of the frames in decode order. The codec holds back `delay`
//! frames before emitting any, errors out when fed packet number `fail`, and refuses to be
//! configured when `codec=none` is given.

use crate::decoder::{CodecDecoder, DecodedFrame, Pulled};
use crate::motion::RawMotionVector;
use crate::prelude::v1::*;
use crate::source::{Demuxer, StreamInfo};
use std::cell::Cell;
use std::collections::VecDeque;

pub const WIDTH: usize = 32;
pub const HEIGHT: usize = 16;

thread_local! {
    static OPEN_HANDLES: Cell<usize> = Cell::new(0);
    static LIVE_CODECS: Cell<usize> = Cell::new(0);
}

/// Number of mock sources currently open on this thread.
pub fn open_handles() -> usize {
    OPEN_HANDLES.with(Cell::get)
}

/// Number of mock codecs currently alive on this thread.
pub fn live_codecs() -> usize {
    LIVE_CODECS.with(Cell::get)
}

pub fn mock_path(types: &str, delay: usize) -> String {
    format!("mock://{types}?delay={delay}")
}

pub fn mock_path_failing(types: &str, delay: usize, fail: usize) -> String {
    format!("mock://{types}?delay={delay}&fail={fail}")
}

/// Motion vectors the mock codec exports for the frame at `index`.
///
/// Intra frames have none, inter frames get `index + 1` vectors laid out in raster order.
pub fn mock_vectors(index: usize, frame_type: FrameType) -> Vec<RawMotionVector> {
    if !frame_type.is_inter() {
        return vec![];
    }

    let source = if frame_type == FrameType::Bidirectional {
        1
    } else {
        -1
    };

    (0..=index)
        .map(|i| {
            let dst_x = (8 + 16 * (i % 2)) as i16;
            let dst_y = (8 + 16 * (i / 2)) as i16;
            RawMotionVector {
                source,
                w: 16,
                h: 16,
                src_x: dst_x + index as i16,
                src_y: dst_y,
                dst_x,
                dst_y,
                motion_x: 4 * index as i32,
                motion_y: 0,
                motion_scale: 4,
                ..Default::default()
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct MockPacket {
    pub index: usize,
    pub frame_type: FrameType,
}

#[derive(Clone, Debug, Default)]
pub struct MockParams {
    delay: usize,
    fail: Option<usize>,
    no_codec: bool,
}

pub struct MockDemuxer {
    packets: VecDeque<MockPacket>,
    params: MockParams,
    info: StreamInfo,
}

impl Drop for MockDemuxer {
    fn drop(&mut self) {
        OPEN_HANDLES.with(|h| h.set(h.get() - 1));
    }
}

impl Demuxer for MockDemuxer {
    type Packet = MockPacket;
    type Params = MockParams;

    fn open(path: &str, _: &CaptureConfig) -> Result<Self> {
        let spec = path
            .strip_prefix("mock://")
            .ok_or_else(|| anyhow!("No such file"))?;

        let (types, query) = spec.split_once('?').unwrap_or((spec, ""));

        let mut params = MockParams::default();

        for (key, value) in query.split('&').filter_map(|kv| kv.split_once('=')) {
            match key {
                "delay" => params.delay = value.parse()?,
                "fail" => params.fail = Some(value.parse()?),
                "codec" => params.no_codec = value == "none",
                _ => return Err(anyhow!("Unknown option {key}")),
            }
        }

        if types.is_empty() {
            return Err(anyhow!("No video stream"));
        }

        let packets = types
            .chars()
            .map(FrameType::from_tag)
            .enumerate()
            .map(|(index, frame_type)| MockPacket { index, frame_type })
            .collect::<VecDeque<_>>();

        OPEN_HANDLES.with(|h| h.set(h.get() + 1));

        Ok(Self {
            info: StreamInfo {
                width: WIDTH,
                height: HEIGHT,
                framerate: Some(25.0),
                codec: "mock".into(),
                frame_count: Some(packets.len() as u64),
            },
            packets,
            params,
        })
    }

    fn next_packet(&mut self) -> Result<Option<MockPacket>> {
        Ok(self.packets.pop_front())
    }

    fn params(&self) -> &MockParams {
        &self.params
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }
}

pub struct MockCodec {
    params: MockParams,
    queue: VecDeque<MockPacket>,
    flushing: bool,
    reconstruct: bool,
}

impl Drop for MockCodec {
    fn drop(&mut self) {
        LIVE_CODECS.with(|h| h.set(h.get() - 1));
    }
}

impl CodecDecoder<MockDemuxer> for MockCodec {
    fn configure(params: &MockParams, _: &CaptureConfig) -> Result<Self> {
        if params.no_codec {
            return Err(anyhow!("Unsupported codec"));
        }

        LIVE_CODECS.with(|h| h.set(h.get() + 1));

        Ok(Self {
            params: params.clone(),
            queue: Default::default(),
            flushing: false,
            reconstruct: true,
        })
    }

    fn set_reconstruct(&mut self, reconstruct: bool) {
        self.reconstruct = reconstruct;
    }

    fn send_packet(&mut self, packet: Option<&MockPacket>) -> Result<()> {
        match packet {
            Some(p) if Some(p.index) == self.params.fail => {
                Err(anyhow!("Invalid data in packet {}", p.index))
            }
            Some(p) => {
                self.queue.push_back(p.clone());
                Ok(())
            }
            None => {
                self.flushing = true;
                Ok(())
            }
        }
    }

    fn receive_frame(&mut self) -> Result<Pulled<DecodedFrame>> {
        if self.queue.len() <= self.params.delay && !(self.flushing && !self.queue.is_empty()) {
            return Ok(if self.flushing {
                Pulled::Drained
            } else {
                Pulled::NeedsMoreInput
            });
        }

        let packet = self
            .queue
            .pop_front()
            .ok_or_else(|| anyhow!("Empty queue"))?;

        let pixels = if self.reconstruct {
            let mut frame = PixelFrame::new(WIDTH, HEIGHT);
            frame.as_mut_slice().fill(packet.index as u8);
            Some(frame)
        } else {
            None
        };

        let vectors = mock_vectors(packet.index, packet.frame_type);

        let motion_side_data = if vectors.is_empty() {
            vec![]
        } else {
            vec![bytemuck::cast_slice(&vectors).to_vec()]
        };

        Ok(Pulled::Frame(DecodedFrame {
            frame_type: packet.frame_type,
            pixels,
            motion_side_data,
            timestamp: Some(packet.index as f64 / 25.0),
        }))
    }
}
