// File: compositor.rs
// Location: /src/compositor.rs

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use log::{debug, warn};

use crate::bitmap::{Bitmap, DARK, LIGHT};
use crate::error::CompositeError;
use crate::logo::LogoSource;
use crate::matrix::{ModuleMatrix, MAX_SIZE};

pub const DISC_PADDING: f32 = 5.0;

#[derive(Debug)]
pub enum Surface<'a> {
    Matrix(&'a ModuleMatrix),
    Painted(Bitmap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoBounds {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

pub fn logo_bounds(size: u32, logo_size_fraction: f32) -> LogoBounds {
    let side = ((size as f32 * logo_size_fraction).floor() as u32).min(size);
    let offset = (size - side) / 2;
    LogoBounds {
        x: offset,
        y: offset,
        side,
    }
}

/// Scales `matrix` to `size x size`. Every pixel takes exactly one module.
pub fn rasterize(matrix: &ModuleMatrix, size: u32) -> Result<RgbaImage, CompositeError> {
    if size == 0 || size > MAX_SIZE {
        return Err(CompositeError::InvalidSize(size));
    }
    if matrix.is_empty() {
        return Err(CompositeError::EmptyMatrix);
    }

    let n = matrix.width() as u64;
    let module_of = |p: u32| (u64::from(p) * n / u64::from(size)) as usize;

    Ok(RgbaImage::from_fn(size, size, |x, y| {
        if matrix.get(module_of(y), module_of(x)) {
            DARK
        } else {
            LIGHT
        }
    }))
}

fn fill_disc(surface: &mut RgbaImage, radius: f32) {
    let (width, height) = surface.dimensions();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let r2 = radius * radius;

    for (x, y, pixel) in surface.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - cx;
        let dy = y as f32 + 0.5 - cy;
        if dx * dx + dy * dy <= r2 {
            *pixel = LIGHT;
        }
    }
}

pub fn overlay_logo(surface: &mut RgbaImage, logo_size_fraction: f32, logo: &DynamicImage) {
    let size = surface.width();
    let bounds = logo_bounds(size, logo_size_fraction);
    if bounds.side == 0 {
        debug!("Logo box is empty at {}px, skipping overlay", size);
        return;
    }

    let logo_size = size as f32 * logo_size_fraction;
    fill_disc(surface, logo_size / 2.0 + DISC_PADDING);

    let scaled = imageops::resize(&logo.to_rgba8(), bounds.side, bounds.side, FilterType::Triangle);
    imageops::overlay(surface, &scaled, i64::from(bounds.x), i64::from(bounds.y));
}

/// Best-effort logo overlay. A logo that fails to load leaves `bitmap` untouched.
async fn apply_logo(bitmap: Bitmap, logo_size_fraction: f32, logo: &dyn LogoSource) -> Bitmap {
    match logo.load().await {
        Ok(image) => {
            let mut surface = bitmap.into_image();
            overlay_logo(&mut surface, logo_size_fraction, &image);
            Bitmap::from_image(surface)
        }
        Err(e) => {
            warn!("Could not load logo: {}", e);
            bitmap
        }
    }
}

pub async fn composite(
    source: Surface<'_>,
    size: u32,
    logo_size_fraction: f32,
    logo: &dyn LogoSource,
) -> Result<Bitmap, CompositeError> {
    let bitmap = match source {
        Surface::Matrix(matrix) => Bitmap::from_image(rasterize(matrix, size)?),
        Surface::Painted(bitmap) if bitmap.dimensions() == (size, size) => bitmap,
        Surface::Painted(_) => return Err(CompositeError::InvalidSize(size)),
    };

    Ok(apply_logo(bitmap, logo_size_fraction, logo).await)
}
