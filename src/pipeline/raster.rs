//! Rasterisation: decode a source into an opaque RGB pixel buffer.
//!
//! JPEG has no alpha channel and PDF image XObjects are embedded here as
//! DCT (JPEG) streams, so both output paths need transparency resolved up
//! front. Every pixel is composited over opaque white; a fully transparent
//! pixel becomes white rather than whatever colour its RGB bits held.

use crate::error::ItemError;
use crate::item::Source;
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// A flattened, alpha-free image.
#[derive(Debug, Clone)]
pub struct Raster {
    pub pixels: RgbImage,
}

impl Raster {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Decode `source` and flatten it onto white.
///
/// CPU-bound; callers on an async runtime run it inside `spawn_blocking`.
pub fn rasterize(source: &Source) -> Result<Raster, ItemError> {
    let decoded = image::load_from_memory(source.data()).map_err(|e| ItemError::Decode {
        name: source.name().to_string(),
        detail: e.to_string(),
    })?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ItemError::Decode {
            name: source.name().to_string(),
            detail: "image has zero width or height".into(),
        });
    }

    let pixels = flatten_on_white(&decoded);
    debug!(
        "Rasterised '{}' → {}x{} px",
        source.name(),
        pixels.width(),
        pixels.height()
    );
    Ok(Raster { pixels })
}

/// Composite every pixel over opaque white.
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        image::Rgb([blend(r, a), blend(g, a), blend(b, a)])
    })
}

fn blend(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (u32::from(channel), u32::from(alpha));
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_source(name: &str, img: RgbaImage) -> Source {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        Source::new(name, buf)
    }

    #[test]
    fn transparent_pixels_become_white() {
        let src = png_source("clear.png", RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 0])));
        let raster = rasterize(&src).expect("rasterise");
        assert_eq!((raster.width(), raster.height()), (4, 2));
        assert!(raster.pixels.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn opaque_pixels_unchanged() {
        let src = png_source("red.png", RgbaImage::from_pixel(3, 3, Rgba([200, 10, 30, 255])));
        let raster = rasterize(&src).expect("rasterise");
        assert!(raster.pixels.pixels().all(|p| p.0 == [200, 10, 30]));
    }

    #[test]
    fn half_alpha_blends_towards_white() {
        let src = png_source("half.png", RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128])));
        let raster = rasterize(&src).expect("rasterise");
        let [r, g, b] = raster.pixels.get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!((126..=128).contains(&r), "got {r}");
    }

    #[test]
    fn garbage_is_decode_error() {
        let src = Source::new("notes.png", b"definitely not an image".to_vec());
        let err = rasterize(&src).unwrap_err();
        assert!(matches!(err, ItemError::Decode { ref name, .. } if name == "notes.png"));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let src = png_source("x.png", RgbaImage::from_fn(5, 5, |x, y| Rgba([x as u8 * 40, y as u8 * 40, 7, 90])));
        let a = rasterize(&src).unwrap();
        let b = rasterize(&src).unwrap();
        assert_eq!(a.pixels, b.pixels);
    }
}
