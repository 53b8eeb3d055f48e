//! Core types shared by every stage of the depth-markers pipeline.
//!
//! The crate knows nothing about markers. It provides the typed texture
//! grid the stages read and write, the packed-texel codec boundary, input
//! image views and the circular angle helpers used by the edge walkers.

mod angle;
mod error;
mod image;
mod logger;
mod texture;

pub use angle::{circular_diff, circular_mean, circular_mean4};
pub use error::TextureError;
pub use image::{DepthImage, DepthImageView, RgbImage, RgbImageView};
pub use texture::{FrameSize, Texel, TexelCodec, Texture, ZERO_TEXEL};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
