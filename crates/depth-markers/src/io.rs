//! Frame loading and saving through the `image` crate.

use depth_markers_core::{DepthImage, RgbImage};
use image::{DynamicImage, ImageBuffer, Luma, Rgb};
use std::path::Path;

use crate::error::IoError;

/// Load any supported image as 8-bit RGB.
pub fn load_color(path: impl AsRef<Path>) -> Result<RgbImage, IoError> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    Ok(RgbImage {
        width: width as usize,
        height: height as usize,
        data: img.into_raw(),
    })
}

/// Load a 16-bit single channel image holding raw depth units.
pub fn load_depth(path: impl AsRef<Path>) -> Result<DepthImage, IoError> {
    match image::open(path)? {
        DynamicImage::ImageLuma16(img) => {
            let (width, height) = img.dimensions();
            Ok(DepthImage {
                width: width as usize,
                height: height as usize,
                data: img.into_raw(),
            })
        }
        other => Err(IoError::DepthFormat {
            format: format!("{:?}", other.color()),
        }),
    }
}

pub fn save_color(path: impl AsRef<Path>, image: &RgbImage) -> Result<(), IoError> {
    let buf = ImageBuffer::<Rgb<u8>, _>::from_raw(
        image.width as u32,
        image.height as u32,
        image.data.clone(),
    )
    .ok_or(IoError::Shape {
        width: image.width,
        height: image.height,
    })?;
    buf.save(path)?;
    Ok(())
}

/// Save raw depth units as a 16-bit grayscale image (PNG keeps them exact).
pub fn save_depth(path: impl AsRef<Path>, depth: &DepthImage) -> Result<(), IoError> {
    let buf = ImageBuffer::<Luma<u16>, _>::from_raw(
        depth.width as u32,
        depth.height as u32,
        depth.data.clone(),
    )
    .ok_or(IoError::Shape {
        width: depth.width,
        height: depth.height,
    })?;
    buf.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_survive_png() {
        let dir = tempfile::tempdir().unwrap();
        let color = RgbImage::from_fn(8, 6, |x, y| [x as u8 * 30, y as u8 * 40, 7]);
        let depth = DepthImage::from_fn(8, 6, |x, y| (x * 1000 + y) as u16);

        let color_path = dir.path().join("color.png");
        let depth_path = dir.path().join("depth.png");
        save_color(&color_path, &color).unwrap();
        save_depth(&depth_path, &depth).unwrap();

        assert_eq!(load_color(&color_path).unwrap().data, color.data);
        let back = load_depth(&depth_path).unwrap();
        assert_eq!((back.width, back.height), (8, 6));
        assert_eq!(back.data, depth.data);
    }

    #[test]
    fn color_png_is_not_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color.png");
        save_color(&path, &RgbImage::from_fn(4, 4, |_, _| [1, 2, 3])).unwrap();
        assert!(matches!(
            load_depth(&path),
            Err(IoError::DepthFormat { .. })
        ));
    }

    #[test]
    fn short_buffers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let broken = DepthImage {
            width: 4,
            height: 4,
            data: vec![0; 3],
        };
        assert!(matches!(
            save_depth(dir.path().join("d.png"), &broken),
            Err(IoError::Shape {
                width: 4,
                height: 4
            })
        ));
    }
}
