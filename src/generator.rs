// File: generator.rs
// Location: /src/generator.rs

use log::{error, info, warn};
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::compositor::{self, Surface};
use crate::config::GeneratorSettings;
use crate::error::{CompositeError, EncodeError, GenerationFailure, RequestError};
use crate::fallback;
use crate::loader::{BundledEncoderSource, EncoderLoader, EncoderSource};
use crate::logo::{BuiltinLogo, LogoSource};
use crate::matrix::GenerationRequest;
use crate::worker::WorkerManager;

#[derive(Debug)]
pub enum GenerationOutcome {
    Success(Bitmap),
    Failure(GenerationFailure),
}

#[derive(Debug, thiserror::Error)]
pub enum DataUriError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
}

pub struct QrGenerator {
    loader: EncoderLoader,
    workers: WorkerManager,
    logo: Arc<dyn LogoSource>,
    settings: GeneratorSettings,
}

impl Default for QrGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl QrGenerator {
    pub fn new() -> Self {
        Self::with_parts(
            EncoderLoader::new(Arc::new(BundledEncoderSource)),
            WorkerManager::new(),
            Arc::new(BuiltinLogo),
        )
    }

    pub fn with_source(source: Arc<dyn EncoderSource>) -> Self {
        Self::with_parts(EncoderLoader::new(source), WorkerManager::new(), Arc::new(BuiltinLogo))
    }

    pub fn with_parts(
        loader: EncoderLoader,
        workers: WorkerManager,
        logo: Arc<dyn LogoSource>,
    ) -> Self {
        Self {
            loader,
            workers,
            logo,
            settings: GeneratorSettings::default(),
        }
    }

    pub fn with_logo(mut self, logo: Arc<dyn LogoSource>) -> Self {
        self.logo = logo;
        self
    }

    pub fn with_settings(mut self, settings: GeneratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn workers(&self) -> &WorkerManager {
        &self.workers
    }

    pub fn loader(&self) -> &EncoderLoader {
        &self.loader
    }

    /// Real encoding only: loader, worker, compositor. Reports why it failed.
    pub async fn try_generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let encoder = match self.loader.ensure_loaded().await {
            Ok(encoder) => encoder,
            Err(e) => return GenerationOutcome::Failure(e.into()),
        };

        let handle = match self.workers.get_or_create_worker(encoder).await {
            Ok(handle) => handle,
            Err(e) => return GenerationOutcome::Failure(e.into()),
        };

        let matrix = match handle.encode(request.text()).await {
            Ok(matrix) => matrix,
            Err(e) => {
                // a reported encode error still came from a live worker
                if matches!(e, EncodeError::Timeout(_) | EncodeError::Disconnected) {
                    self.workers.discard(&handle).await;
                }
                return GenerationOutcome::Failure(e.into());
            }
        };

        match compositor::composite(
            Surface::Matrix(&matrix),
            request.size(),
            request.logo_size_fraction(),
            self.logo.as_ref(),
        )
        .await
        {
            Ok(bitmap) => GenerationOutcome::Success(bitmap),
            Err(e) => GenerationOutcome::Failure(e.into()),
        }
    }

    /// Always returns a bitmap of `request.size()` pixels. Degrades to the
    /// fallback pattern, then to a placeholder.
    pub async fn generate(&self, request: &GenerationRequest) -> Bitmap {
        info!("Starting QR code generation ({}px)", request.size());

        match self.try_generate(request).await {
            GenerationOutcome::Success(bitmap) => bitmap,
            GenerationOutcome::Failure(reason) => {
                warn!("QR encoding unavailable, drawing fallback pattern: {}", reason);
                self.generate_fallback(request).await
            }
        }
    }

    async fn generate_fallback(&self, request: &GenerationRequest) -> Bitmap {
        let composited = match fallback::paint(request.text(), request.size()) {
            Ok(bitmap) => {
                compositor::composite(
                    Surface::Painted(bitmap),
                    request.size(),
                    request.logo_size_fraction(),
                    self.logo.as_ref(),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match composited {
            Ok(bitmap) => bitmap,
            Err(e) => {
                error!("Error generating QR code: {}", e);
                Bitmap::placeholder(request.size())
            }
        }
    }

    pub async fn generate_data_uri(&self, text: &str) -> Result<String, DataUriError> {
        let request = self.settings.request(text)?;
        let bitmap = self.generate(&request).await;
        match bitmap.to_data_uri() {
            Ok(uri) => Ok(uri),
            Err(e) => {
                error!("Failed to encode QR code image: {}", e);
                Ok(Bitmap::placeholder(request.size()).to_data_uri()?)
            }
        }
    }

    pub async fn cleanup(&self) {
        self.workers.terminate().await;
    }
}
