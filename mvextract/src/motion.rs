//! # Motion vector collection
//!
//! Decoders export block motion as a side channel of each decoded frame. This module turns that
//! side channel into a [`MotionVectorTable`], a fixed-width table of `i32` records that keeps the
//! decoder's units and emission order.

use crate::decoder::DecodedFrame;
use bytemuck::{Pod, Zeroable};
use log::*;
use nalgebra as na;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of columns in a [`MotionVectorTable`].
pub const COLUMNS: usize = 10;

/// Raw motion vector entry as exported by the decoder.
///
/// The layout matches libav's `AVMotionVector` byte for byte (40 bytes, 8 byte aligned), with the
/// compiler inserted padding spelled out so that the type is plain old data.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RawMotionVector {
    /// Where the block's reference frame lies relative to this one (negative is past).
    pub source: i32,
    pub w: u8,
    pub h: u8,
    pub src_x: i16,
    pub src_y: i16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub _pad0: u16,
    pub flags: u64,
    pub motion_x: i32,
    pub motion_y: i32,
    pub motion_scale: u16,
    pub _pad1: u16,
    pub _pad2: u32,
}

/// Size of a single [`RawMotionVector`] within the side data buffer.
pub const RAW_ENTRY_SIZE: usize = std::mem::size_of::<RawMotionVector>();

/// Normalised motion vector record.
///
/// All fields are in the decoder's native units: positions and block sizes in pixels, motion in
/// `1 / motion_scale` pixel units.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionVector {
    /// Frame offset of the reference, e.g. `-1` for the previous frame.
    pub source: i32,
    /// Block width.
    pub w: i32,
    /// Block height.
    pub h: i32,
    /// Block centre in the reference frame.
    pub src_x: i32,
    pub src_y: i32,
    /// Block centre in the current frame.
    pub dst_x: i32,
    pub dst_y: i32,
    pub motion_x: i32,
    pub motion_y: i32,
    /// Fixed point precision of `motion_x` and `motion_y`.
    pub motion_scale: i32,
}

impl From<RawMotionVector> for MotionVector {
    fn from(raw: RawMotionVector) -> Self {
        Self {
            source: raw.source,
            w: raw.w.into(),
            h: raw.h.into(),
            src_x: raw.src_x.into(),
            src_y: raw.src_y.into(),
            dst_x: raw.dst_x.into(),
            dst_y: raw.dst_y.into(),
            motion_x: raw.motion_x,
            motion_y: raw.motion_y,
            motion_scale: raw.motion_scale.into(),
        }
    }
}

impl From<[i32; COLUMNS]> for MotionVector {
    fn from(row: [i32; COLUMNS]) -> Self {
        bytemuck::cast(row)
    }
}

impl MotionVector {
    /// Fields as an array in column order.
    pub fn to_array(self) -> [i32; COLUMNS] {
        bytemuck::cast(self)
    }

    /// Motion of the block between its reference and the current frame, in pixels per frame.
    ///
    /// The decoder's vector points from the current block to its reference. This flips it into the
    /// direction of time and divides it by the distance to the reference, so that past and future
    /// references produce comparable values. Returns `None` if `source` or `motion_scale` is 0.
    pub fn displacement(&self) -> Option<na::Vector2<f32>> {
        if self.source == 0 || self.motion_scale == 0 {
            return None;
        }

        let div = (self.motion_scale * self.source) as f32;

        Some(na::Vector2::new(
            self.motion_x as f32 / div,
            self.motion_y as f32 / div,
        ))
    }
}

/// Motion vectors of a single frame.
///
/// This is a `rows x 10` table of `i32` values, see [`MotionVector`] for column order. The table
/// is always present, an intra frame simply has zero rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MotionVectorTable {
    rows: Vec<MotionVector>,
}

impl MotionVectorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(rows: usize) -> Self {
        Self {
            rows: Vec::with_capacity(rows),
        }
    }

    pub fn push(&mut self, mv: MotionVector) {
        self.rows.push(mv)
    }

    /// Append another table, e.g. motion vectors of another partition of the same frame.
    pub fn extend_from(&mut self, other: &Self) {
        self.rows.extend_from_slice(&other.rows)
    }

    /// Shape of the table as `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), COLUMNS)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[MotionVector] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MotionVector> {
        self.rows.iter()
    }

    /// Get a single row.
    pub fn row(&self, idx: usize) -> Option<[i32; COLUMNS]> {
        self.rows.get(idx).map(|mv| mv.to_array())
    }

    /// Contiguous row-major view of the table.
    ///
    /// The slice has `rows * 10` elements.
    pub fn as_slice(&self) -> &[i32] {
        bytemuck::cast_slice(&self.rows)
    }

    /// Convert the table into position and motion pairs in normalised frame coordinates.
    ///
    /// Positions are block centres in the current frame, and motion is the per frame
    /// displacement (see [`MotionVector::displacement`]), both divided by the frame dimensions.
    /// Records that carry no usable motion are skipped.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the frame the vectors belong to.
    /// * `height` - height of the frame the vectors belong to.
    pub fn to_motion_entries(
        &self,
        width: usize,
        height: usize,
    ) -> Vec<(na::Point2<f32>, na::Vector2<f32>)> {
        if width == 0 || height == 0 {
            return vec![];
        }

        let frame_norm = na::Vector2::new(1f32 / width as f32, 1f32 / height as f32);

        self.rows
            .iter()
            .filter_map(|mv| {
                let motion = mv.displacement()?.component_mul(&frame_norm);
                let pos = na::Vector2::new(mv.dst_x as f32, mv.dst_y as f32)
                    .component_mul(&frame_norm)
                    .into();
                Some((pos, motion))
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a MotionVectorTable {
    type Item = &'a MotionVector;
    type IntoIter = std::slice::Iter<'a, MotionVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl FromIterator<MotionVector> for MotionVectorTable {
    fn from_iter<I: IntoIterator<Item = MotionVector>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Parse raw motion side data into a table.
///
/// The buffer is read entry by entry without alignment requirements. Any trailing bytes that do
/// not form a whole entry are dropped.
pub fn parse_side_data(side_data: &[u8]) -> MotionVectorTable {
    let chunks = side_data.chunks_exact(RAW_ENTRY_SIZE);

    if !chunks.remainder().is_empty() {
        warn!(
            "Motion side data has {} trailing bytes, ignoring them",
            chunks.remainder().len()
        );
    }

    chunks
        .map(bytemuck::pod_read_unaligned::<RawMotionVector>)
        .map(MotionVector::from)
        .collect()
}

/// Collect motion vectors of a decoded frame.
///
/// Every side data block attached to the frame is parsed and appended in the order the decoder
/// emitted them. A frame without motion side data (such as an intra frame) yields an empty table.
pub fn collect(frame: &DecodedFrame) -> MotionVectorTable {
    let mut table = MotionVectorTable::with_capacity(
        frame
            .motion_side_data
            .iter()
            .map(|b| b.len() / RAW_ENTRY_SIZE)
            .sum(),
    );

    for block in &frame.motion_side_data {
        table.extend_from(&parse_side_data(block));
    }

    trace!("Collected {} motion vectors", table.len());

    table
}
