//! Dense per-pixel stage buffers.
//!
//! Every pipeline stage writes one [`Texture`] of typed records. Sampling
//! follows `CLAMP_TO_EDGE` + `NEAREST` semantics: coordinates outside the
//! grid read the closest edge texel, so walks that leave the frame never
//! fail, they just keep re-reading the border.
//!
//! [`TexelCodec`] is the explicit boundary between the typed records and
//! the packed 4-float texel layout used for debug dumps and for exchanging
//! buffers with GPU implementations of the same stages.

use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::error::TextureError;

/// Packed 4-channel texel (`r`, `g`, `b`, `a`).
pub type Texel = [f32; 4];

/// The all-zero texel. It always means "no data / invalid".
pub const ZERO_TEXEL: Texel = [0.0; 4];

/// Size of the full-resolution frame a buffer belongs to.
///
/// Normalized texture coordinates are always expressed relative to the
/// full-resolution frame, also for the downsampled buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: usize,
    pub height: usize,
}

impl FrameSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Normalized coordinate of the center of pixel `p`.
    #[inline]
    pub fn pixel_to_tex(&self, p: Point2<i32>) -> [f32; 2] {
        [
            (p.x as f32 + 0.5) / self.width as f32,
            (p.y as f32 + 0.5) / self.height as f32,
        ]
    }

    /// Pixel containing the normalized coordinate `t`.
    #[inline]
    pub fn tex_to_pixel(&self, t: [f32; 2]) -> Point2<i32> {
        Point2::new(
            (t[0] * self.width as f32).floor() as i32,
            (t[1] * self.height as f32).floor() as i32,
        )
    }

    /// Pixel length in normalized units along x and y.
    #[inline]
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }
}

/// Conversion between a typed stage record and its packed texel.
///
/// Implementations must never encode a valid record to [`ZERO_TEXEL`]:
/// the blanket `Option<T>` impl relies on that to map `None` to zero.
pub trait TexelCodec: Sized {
    fn encode(&self, frame: FrameSize) -> Texel;
    fn decode(texel: Texel, frame: FrameSize) -> Self;
}

impl<T: TexelCodec> TexelCodec for Option<T> {
    fn encode(&self, frame: FrameSize) -> Texel {
        match self {
            Some(record) => record.encode(frame),
            None => ZERO_TEXEL,
        }
    }

    fn decode(texel: Texel, frame: FrameSize) -> Self {
        if texel == ZERO_TEXEL {
            None
        } else {
            Some(T::decode(texel, frame))
        }
    }
}

/// Camera-space position packed as `(x, y, z, 1)`.
impl TexelCodec for Point3<f32> {
    fn encode(&self, _frame: FrameSize) -> Texel {
        [self.x, self.y, self.z, 1.0]
    }

    fn decode(texel: Texel, _frame: FrameSize) -> Self {
        Point3::new(texel[0], texel[1], texel[2])
    }
}

/// Row-major 2D grid of records.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Texture<T> {
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::Empty);
        }
        if data.len() != width * height {
            return Err(TextureError::BufferSize {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a texture by evaluating `f(x, y)` for every texel in row-major order.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major storage, e.g. for filling rows in parallel.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// In-range access.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            self.data.get(y * self.width + x)
        } else {
            None
        }
    }

    /// Clamp-to-edge access.
    #[inline]
    pub fn clamped(&self, x: i32, y: i32) -> &T {
        let cx = x.clamp(0, self.width as i32 - 1) as usize;
        let cy = y.clamp(0, self.height as i32 - 1) as usize;
        &self.data[cy * self.width + cx]
    }

    #[inline]
    pub fn at(&self, p: Point2<i32>) -> &T {
        self.clamped(p.x, p.y)
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.width)
    }

    /// Iterate `(x, y, record)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| (i % w, i / w, v))
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Texture<U> {
        Texture {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(&mut f).collect(),
        }
    }
}

impl<T: Clone> Texture<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Overwrite a single texel. Out-of-range writes are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }
}

impl<T: TexelCodec> Texture<T> {
    /// Pack every record into its texel.
    pub fn encode(&self, frame: FrameSize) -> Texture<Texel> {
        self.map(|r| r.encode(frame))
    }
}

impl Texture<Texel> {
    /// Unpack every texel into a typed record.
    pub fn decode<T: TexelCodec>(&self, frame: FrameSize) -> Texture<T> {
        self.map(|t| T::decode(*t, frame))
    }
}
