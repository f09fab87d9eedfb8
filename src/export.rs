// File: export.rs
// Location: /src/export.rs
//
// Helpers for the save and copy collaborators: file naming, PNG output and
// turning a data URI back into PNG bytes.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::info;
use std::path::Path;

use crate::bitmap::{Bitmap, DATA_URI_PREFIX};

/// `qrcode_<title>.png` with every non-alphanumeric ASCII character replaced
/// by `_` and the result lowercased.
pub fn suggested_filename(title: &str) -> String {
    let title = title.trim();
    let title = if title.is_empty() { "qrcode" } else { title };
    let sanitized: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("qrcode_{}.png", sanitized)
}

pub fn save_png(bitmap: &Bitmap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let bytes = bitmap.to_png_bytes()?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved QR code to {}", path.display());
    Ok(())
}

pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let encoded = uri
        .strip_prefix(DATA_URI_PREFIX)
        .with_context(|| format!("Not a PNG data URI: {:.32}", uri))?;
    STANDARD.decode(encoded).context("Invalid base64 payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_filename() {
        assert_eq!(suggested_filename("Example Domain"), "qrcode_example_domain.png");
        assert_eq!(suggested_filename("Ünïcode & Co."), "qrcode__n_code___co_.png");
        assert_eq!(suggested_filename("   "), "qrcode_qrcode.png");
    }

    #[test]
    fn test_save_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/qr.png");
        save_png(&Bitmap::placeholder(64), &path).unwrap();
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (64, 64));
    }

    #[test]
    fn test_decode_data_uri() {
        let bitmap = Bitmap::placeholder(8);
        let bytes = decode_data_uri(&bitmap.to_data_uri().unwrap()).unwrap();
        assert_eq!(bytes, bitmap.to_png_bytes().unwrap());
        assert!(decode_data_uri("data:text/plain,hello").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
    }
}
