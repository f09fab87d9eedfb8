// File: bitmap.rs
// Location: /src/bitmap.rs

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

use crate::error::CompositeError;

pub const DARK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const LIGHT: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const PLACEHOLDER_BACKGROUND: Rgba<u8> = Rgba([0xf0, 0xf0, 0xf0, 255]);
pub const PLACEHOLDER_GLYPH: Rgba<u8> = Rgba([0x66, 0x66, 0x66, 255]);

pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    pub(crate) fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn placeholder(size: u32) -> Self {
        let size = size.max(1);
        let mut image = RgbaImage::from_pixel(size, size, PLACEHOLDER_BACKGROUND);

        let half = size / 6;
        let thickness = (size / 48).max(1);
        let center = (size / 2) as i64;
        for offset in -(half as i64)..=(half as i64) {
            for t in 0..thickness as i64 {
                let x = center + offset;
                for y in [center + offset + t, center - offset + t] {
                    if (0..size as i64).contains(&x) && (0..size as i64).contains(&y) {
                        image.put_pixel(x as u32, y as u32, PLACEHOLDER_GLYPH);
                    }
                }
            }
        }

        Self { image }
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, CompositeError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    pub fn to_data_uri(&self) -> Result<String, CompositeError> {
        let png = self.to_png_bytes()?;
        Ok(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(png)))
    }
}
