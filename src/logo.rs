// File: logo.rs
// Location: /src/logo.rs

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use std::path::PathBuf;

use crate::error::LogoLoadError;

pub const BUILTIN_ACCENT: Rgba<u8> = Rgba([0x20, 0x4a, 0x87, 255]);
const BUILTIN_SIDE: u32 = 128;

#[async_trait]
pub trait LogoSource: Send + Sync {
    async fn load(&self) -> Result<DynamicImage, LogoLoadError>;
}

/// Round badge drawn in code, so generation works without any asset on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLogo;

impl BuiltinLogo {
    pub fn render(side: u32) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
        let c = side as f32 / 2.0;

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let dx = x as f32 + 0.5 - c;
            let dy = y as f32 + 0.5 - c;
            let r = (dx * dx + dy * dy).sqrt() / side as f32;
            // outer ring plus a solid center dot
            if (0.30..0.48).contains(&r) || r < 0.18 {
                *pixel = BUILTIN_ACCENT;
            }
        }

        img
    }
}

#[async_trait]
impl LogoSource for BuiltinLogo {
    async fn load(&self) -> Result<DynamicImage, LogoLoadError> {
        Ok(DynamicImage::ImageRgba8(Self::render(BUILTIN_SIDE)))
    }
}

#[derive(Debug, Clone)]
pub struct FileLogo {
    path: PathBuf,
}

impl FileLogo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogoSource for FileLogo {
    async fn load(&self) -> Result<DynamicImage, LogoLoadError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(image::load_from_memory(&bytes)?)
    }
}

#[derive(Debug, Clone)]
pub struct BytesLogo {
    bytes: Vec<u8>,
}

impl BytesLogo {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

#[async_trait]
impl LogoSource for BytesLogo {
    async fn load(&self) -> Result<DynamicImage, LogoLoadError> {
        Ok(image::load_from_memory(&self.bytes)?)
    }
}

/// Always fails; disables the overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogo;

#[async_trait]
impl LogoSource for NoLogo {
    async fn load(&self) -> Result<DynamicImage, LogoLoadError> {
        Err(LogoLoadError::Unavailable("no logo configured".to_string()))
    }
}
