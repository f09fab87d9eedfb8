// File: config.rs
// Location: /src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RequestError;
use crate::matrix::{GenerationRequest, DEFAULT_LOGO_SIZE_FRACTION, DEFAULT_SIZE, MAX_SIZE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_logo_size_fraction")]
    pub logo_size_fraction: f32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            size: default_size(),
            logo_size_fraction: default_logo_size_fraction(),
        }
    }
}

fn default_size() -> u32 {
    DEFAULT_SIZE
}

fn default_logo_size_fraction() -> f32 {
    DEFAULT_LOGO_SIZE_FRACTION
}

impl GeneratorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || self.size > MAX_SIZE {
            anyhow::bail!("Size must be 1-{} pixels", MAX_SIZE);
        }

        if !(self.logo_size_fraction > 0.0 && self.logo_size_fraction < 1.0) {
            anyhow::bail!("Logo size fraction must be between 0 and 1");
        }

        Ok(())
    }

    pub fn request(&self, text: impl Into<String>) -> Result<GenerationRequest, RequestError> {
        GenerationRequest::new(text, self.size, self.logo_size_fraction)
    }
}

pub fn load_settings(path: &std::path::Path) -> Result<GeneratorSettings> {
    let content = std::fs::read_to_string(path)?;
    let settings: GeneratorSettings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &std::path::Path, settings: &GeneratorSettings) -> Result<()> {
    settings.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;

    Ok(())
}

pub fn settings_path() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".config/qrlogo/settings.json"))
        .unwrap_or_else(|_| PathBuf::from("/tmp/qrlogo-settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GeneratorSettings::default();
        assert_eq!(settings.size, 256);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_size() {
        let settings = GeneratorSettings {
            size: 0,
            logo_size_fraction: 0.2,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_logo_fraction() {
        let settings = GeneratorSettings {
            size: 256,
            logo_size_fraction: 1.5,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: GeneratorSettings = serde_json::from_str(r#"{"size": 512}"#).unwrap();
        assert_eq!(settings.size, 512);
        assert_eq!(settings.logo_size_fraction, DEFAULT_LOGO_SIZE_FRACTION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let settings = GeneratorSettings {
            size: 300,
            logo_size_fraction: 0.25,
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"size": 0}"#).unwrap();
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn test_request_from_settings() {
        let request = GeneratorSettings::default().request("https://example.com").unwrap();
        assert_eq!(request.size(), 256);
        assert!(GeneratorSettings::default().request("").is_err());
    }
}
