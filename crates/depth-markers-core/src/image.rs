//! Input frames: 8-bit RGB color and raw 16-bit depth.

use crate::error::TextureError;

#[derive(Clone, Copy, Debug)]
pub struct RgbImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h*3
}

#[derive(Clone, Debug)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl<'a> RgbImageView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, TextureError> {
        check_len(width, height, 3, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Channels of pixel `(x, y)` scaled to `[0, 1]`, clamped to the image edge.
    #[inline]
    pub fn rgb_clamped(&self, x: i32, y: i32) -> [f32; 3] {
        let cx = x.clamp(0, self.width as i32 - 1) as usize;
        let cy = y.clamp(0, self.height as i32 - 1) as usize;
        let i = 3 * (cy * self.width + cx);
        [
            self.data[i] as f32 / 255.0,
            self.data[i + 1] as f32 / 255.0,
            self.data[i + 2] as f32 / 255.0,
        ]
    }
}

impl RgbImage {
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn as_view(&self) -> RgbImageView<'_> {
        RgbImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    pub fn fill_rect(&mut self, x0: usize, y0: usize, w: usize, h: usize, rgb: [u8; 3]) {
        for y in y0..(y0 + h).min(self.height) {
            for x in x0..(x0 + w).min(self.width) {
                let i = 3 * (y * self.width + x);
                self.data[i..i + 3].copy_from_slice(&rgb);
            }
        }
    }
}

/// Raw depth units as delivered by the sensor; 0 means "no reading".
#[derive(Clone, Copy, Debug)]
pub struct DepthImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u16],
}

#[derive(Clone, Debug)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl<'a> DepthImageView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u16]) -> Result<Self, TextureError> {
        check_len(width, height, 1, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.width + x]
    }
}

impl DepthImage {
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u16) -> Self {
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

    pub fn as_view(&self) -> DepthImageView<'_> {
        DepthImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

fn check_len(width: usize, height: usize, channels: usize, len: usize) -> Result<(), TextureError> {
    if width == 0 || height == 0 {
        return Err(TextureError::Empty);
    }
    if len != width * height * channels {
        return Err(TextureError::BufferSize { width, height, len });
    }
    Ok(())
}
