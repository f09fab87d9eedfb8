// File: matrix.rs
// Location: /src/matrix.rs

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

pub const DEFAULT_SIZE: u32 = 256;
pub const DEFAULT_LOGO_SIZE_FRACTION: f32 = 0.2;
pub const MAX_SIZE: u32 = 4096;
pub const MAX_TEXT_LEN: usize = 4096;

/// Square grid of dark (`true`) and light (`false`) modules, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct ModuleMatrix {
    width: usize,
    modules: Vec<bool>,
}

#[derive(Deserialize)]
struct RawMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl TryFrom<RawMatrix> for ModuleMatrix {
    type Error = String;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        let RawMatrix { width, modules } = raw;
        let len = modules.len();
        Self::from_modules(width, modules)
            .ok_or_else(|| format!("{} modules do not fill a {}x{} matrix", len, width, width))
    }
}

impl ModuleMatrix {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            modules: vec![false; width * width],
        }
    }

    /// Builds a matrix from row-major modules. Returns `None` unless
    /// `modules.len() == width * width`.
    pub fn from_modules(width: usize, modules: Vec<bool>) -> Option<Self> {
        if modules.len() != width * width {
            return None;
        }
        Some(Self { width, modules })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.width
            && col < self.width
            && self.modules.get(row * self.width + col).copied().unwrap_or(false)
    }

    pub fn set(&mut self, row: usize, col: usize, dark: bool) {
        if row < self.width && col < self.width {
            self.modules[row * self.width + col] = dark;
        }
    }

    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|&&m| m).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    text: String,
    size: u32,
    logo_size_fraction: f32,
}

impl GenerationRequest {
    pub fn new(
        text: impl Into<String>,
        size: u32,
        logo_size_fraction: f32,
    ) -> Result<Self, RequestError> {
        let text = text.into();
        if text.is_empty() {
            return Err(RequestError::EmptyText);
        }
        if text.chars().count() > MAX_TEXT_LEN {
            return Err(RequestError::TextTooLong { max: MAX_TEXT_LEN });
        }
        if size == 0 || size > MAX_SIZE {
            return Err(RequestError::InvalidSize { got: size, max: MAX_SIZE });
        }
        if !(logo_size_fraction > 0.0 && logo_size_fraction < 1.0) {
            return Err(RequestError::InvalidLogoFraction(logo_size_fraction));
        }

        Ok(Self {
            text,
            size,
            logo_size_fraction,
        })
    }

    pub fn with_defaults(text: impl Into<String>) -> Result<Self, RequestError> {
        Self::new(text, DEFAULT_SIZE, DEFAULT_LOGO_SIZE_FRACTION)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn logo_size_fraction(&self) -> f32 {
        self.logo_size_fraction
    }
}
