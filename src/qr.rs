// File: qr.rs
// Location: /src/qr.rs

use qrcode::{Color, EcLevel, QrCode};

use crate::matrix::ModuleMatrix;

/// Turns text into a module matrix. Runs on the worker thread, so it may block.
pub trait MatrixEncoder: Send + Sync {
    fn encode(&self, text: &str) -> Result<ModuleMatrix, String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder;

impl MatrixEncoder for QrCodeEncoder {
    fn encode(&self, text: &str) -> Result<ModuleMatrix, String> {
        let code = QrCode::with_error_correction_level(text, EcLevel::M)
            .map_err(|e| format!("Failed to encode QR code: {}", e))?;
        let width = code.width();

        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();

        ModuleMatrix::from_modules(width, modules)
            .ok_or_else(|| format!("Encoder returned a malformed {}x{} symbol", width, width))
    }
}
