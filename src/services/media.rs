/// Image decoding for the picture view
use crate::config::ImageBounds;
use image::error::{ParameterError, ParameterErrorKind};
use image::{DynamicImage, GrayImage, ImageError, ImageFormat, Luma};
use std::fmt;
use std::io::Cursor;

/// Side length of the broken-image placeholder.
const PLACEHOLDER_SIZE: u32 = 24;

/// A decoded picture, one 8-bit luminance byte per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    fn from_gray(img: GrayImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.into_raw(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Encode for transport to the display.
    pub fn to_png(&self) -> Result<Vec<u8>, ImageError> {
        let img = GrayImage::from_raw(self.width, self.height, self.pixels().to_vec()).ok_or_else(
            || {
                ImageError::Parameter(ParameterError::from_kind(
                    ParameterErrorKind::DimensionMismatch,
                ))
            },
        )?;

        let mut out = Vec::new();
        DynamicImage::ImageLuma8(img).write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }
}

/// Decode fetched bytes, shrinking to fit `bounds` and dropping to 8-bit
/// luminance. Smaller images are never enlarged.
pub fn decode_scaled(bytes: &[u8], bounds: ImageBounds) -> Result<Bitmap, ImageError> {
    let img = image::load_from_memory(bytes)?;

    let img = if img.width() > bounds.max_width || img.height() > bounds.max_height {
        img.thumbnail(bounds.max_width, bounds.max_height)
    } else {
        img
    };

    Ok(Bitmap::from_gray(img.into_luma8()))
}

/// Fixed "broken image" graphic: a framed square with one diagonal.
pub fn placeholder() -> Bitmap {
    let last = PLACEHOLDER_SIZE - 1;
    let img = GrayImage::from_fn(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, |x, y| {
        let on_frame = x == 0 || y == 0 || x == last || y == last;
        if on_frame || x == y {
            Luma([0x40])
        } else {
            Luma([0xff])
        }
    });
    Bitmap::from_gray(img)
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 60]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
