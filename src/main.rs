// File: main.rs
// Location: /src/main.rs

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use qrlogo::config::{self, GeneratorSettings};
use qrlogo::export;
use qrlogo::logo::FileLogo;
use qrlogo::QrGenerator;

/// Generate a QR code with a centered logo.
#[derive(Debug, Parser)]
#[command(name = "qrlogo", version)]
struct Cli {
    /// Text to encode, usually a URL
    text: String,

    /// Output size in pixels
    #[arg(long)]
    size: Option<u32>,

    /// Logo size as a fraction of the output size
    #[arg(long)]
    logo_fraction: Option<f32>,

    /// PNG logo to draw instead of the built-in badge
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Write a PNG file here instead of printing a data URI
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Page title used to name the file when --output is a directory
    #[arg(long)]
    title: Option<String>,
}

fn log_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".local/share/qrlogo"))
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn write_start_banner(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let log_file_path = dir.join("qrlogo.log");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    let now = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    writeln!(file, "\n[{}] [INFO] ========== qrlogo Started ==========", now)?;
    writeln!(file, "[{}] [DEBUG] Log file: {:?}", now, log_file_path)?;
    Ok(log_file_path)
}

fn setup_logging() {
    env_logger::Builder::from_default_env()
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .ok();

    if let Err(e) = write_start_banner(&log_dir()) {
        log::debug!("Could not write log banner: {}", e);
    }
}

fn resolve_settings(cli: &Cli) -> Result<GeneratorSettings> {
    let path = config::settings_path();
    let mut settings = if path.exists() {
        config::load_settings(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?
    } else {
        GeneratorSettings::default()
    };

    if let Some(size) = cli.size {
        settings.size = size;
    }
    if let Some(fraction) = cli.logo_fraction {
        settings.logo_size_fraction = fraction;
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    let mut generator = QrGenerator::new().with_settings(settings.clone());
    if let Some(logo) = &cli.logo {
        generator = generator.with_logo(Arc::new(FileLogo::new(logo)));
    }

    let request = settings.request(cli.text.as_str())?;
    let bitmap = generator.generate(&request).await;
    generator.cleanup().await;

    match &cli.output {
        Some(output) => {
            let path = if output.is_dir() {
                output.join(export::suggested_filename(cli.title.as_deref().unwrap_or("")))
            } else {
                output.clone()
            };
            export::save_png(&bitmap, &path)?;
            println!("{}", path.display());
        }
        None => println!("{}", bitmap.to_data_uri()?),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_banner_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_start_banner(&dir.path().join("logs")).unwrap();
        write_start_banner(&dir.path().join("logs")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("qrlogo Started").count(), 2);
        assert!(contents.contains("Log file:"));
    }
}
