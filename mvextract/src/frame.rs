//! # Decoded frame types

use std::fmt;

/// Coding type of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Intra coded frame (`I`).
    Intra,
    /// Predicted frame (`P`).
    Predicted,
    /// Bidirectionally predicted frame (`B`).
    Bidirectional,
    /// No frame available (`?`).
    Unknown,
}

impl Default for FrameType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl FrameType {
    /// Classify a decoder picture type character.
    ///
    /// Besides the plain `I`/`P`/`B` tags, codecs report switching and sprite pictures with their
    /// own letters. These are folded into the closest of the three main types:
    ///
    /// * `i` (switching intra) is intra coded.
    /// * `p` (switching predicted) and `S` (global motion compensated) are predicted.
    /// * `b` (BI) is bidirectional.
    ///
    /// Anything else is `Unknown`.
    pub fn from_tag(tag: char) -> Self {
        match tag {
            'I' | 'i' => Self::Intra,
            'P' | 'p' | 'S' => Self::Predicted,
            'B' | 'b' => Self::Bidirectional,
            _ => Self::Unknown,
        }
    }

    /// Single character tag of the frame type.
    pub fn as_char(self) -> char {
        match self {
            Self::Intra => 'I',
            Self::Predicted => 'P',
            Self::Bidirectional => 'B',
            Self::Unknown => '?',
        }
    }

    /// Whether the frame references other frames.
    pub fn is_inter(self) -> bool {
        matches!(self, Self::Predicted | Self::Bidirectional)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Number of channels in a [`PixelFrame`].
pub const CHANNELS: usize = 3;

/// Reconstructed 8-bit BGR image.
///
/// Pixels are stored row-major and tightly packed, i.e. the buffer has the shape
/// `(height, width, 3)` with blue, green and red bytes for each pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelFrame {
    /// Create a black frame.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * CHANNELS],
        }
    }

    /// Wrap an existing BGR buffer.
    ///
    /// Returns `None` if the buffer length does not match `width * height * 3`.
    pub fn from_bgr(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() == width * height * CHANNELS {
            Some(Self {
                width,
                height,
                data,
            })
        } else {
            None
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Shape of the frame as `(height, width, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, CHANNELS)
    }

    /// Raw BGR bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw BGR bytes.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Get the `[b, g, r]` triple at given coordinates.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; CHANNELS]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let off = (y * self.width + x) * CHANNELS;
        let px = &self.data[off..off + CHANNELS];
        Some([px[0], px[1], px[2]])
    }

    /// Iterate over rows of packed BGR bytes.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks_exact panics on zero, an empty frame has no rows anyway.
        self.data.chunks_exact((self.width * CHANNELS).max(1))
    }
}
