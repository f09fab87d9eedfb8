// File: lib.rs
// Location: /src/lib.rs

pub mod bitmap;
pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod fallback;
pub mod generator;
pub mod loader;
pub mod logo;
pub mod matrix;
pub mod protocol;
pub mod qr;
pub mod worker;

pub use bitmap::Bitmap;
pub use generator::{GenerationOutcome, QrGenerator};
pub use matrix::{GenerationRequest, ModuleMatrix};
