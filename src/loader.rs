// File: loader.rs
// Location: /src/loader.rs

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::LoadError;
use crate::qr::{MatrixEncoder, QrCodeEncoder};

pub const LOAD_TIMEOUT: Duration = Duration::from_secs(5);
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Where the encoding capability comes from. `load` resolves once the
/// capability reports itself ready.
#[async_trait]
pub trait EncoderSource: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn MatrixEncoder>, LoadError>;
}

/// The `qrcode` backed encoder compiled into this crate. Readiness is a
/// self-test encode on a blocking thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledEncoderSource;

#[async_trait]
impl EncoderSource for BundledEncoderSource {
    async fn load(&self) -> Result<Arc<dyn MatrixEncoder>, LoadError> {
        let encoder = QrCodeEncoder;
        tokio::task::spawn_blocking(move || encoder.encode("ready").map(|_| encoder))
            .await
            .map_err(|e| LoadError::Failed(format!("self-test task failed: {}", e)))?
            .map_err(LoadError::Failed)
            .map(|encoder| Arc::new(encoder) as Arc<dyn MatrixEncoder>)
    }
}

/// Loads the encoder once and hands out the cached instance afterwards.
/// Failed loads are not cached, so a later call tries again.
pub struct EncoderLoader {
    source: Arc<dyn EncoderSource>,
    cached: Mutex<Option<Arc<dyn MatrixEncoder>>>,
    attempts: AtomicUsize,
    load_timeout: Duration,
    settle_delay: Duration,
}

impl EncoderLoader {
    pub fn new(source: Arc<dyn EncoderSource>) -> Self {
        Self::with_timing(source, LOAD_TIMEOUT, SETTLE_DELAY)
    }

    pub fn with_timing(
        source: Arc<dyn EncoderSource>,
        load_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            attempts: AtomicUsize::new(0),
            load_timeout,
            settle_delay,
        }
    }

    pub async fn ensure_loaded(&self) -> Result<Arc<dyn MatrixEncoder>, LoadError> {
        let mut cached = self.cached.lock().await;
        if let Some(encoder) = cached.as_ref() {
            debug!("Encoder capability already loaded");
            return Ok(encoder.clone());
        }

        info!("Loading encoder capability...");
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let encoder = match tokio::time::timeout(self.load_timeout, self.source.load()).await {
            Ok(Ok(encoder)) => encoder,
            Ok(Err(e)) => {
                warn!("Failed to load encoder capability: {}", e);
                return Err(e);
            }
            Err(_) => {
                warn!("Encoder capability load timed out after {:?}", self.load_timeout);
                return Err(LoadError::TimedOut(self.load_timeout));
            }
        };

        // give late initialization a moment to finish
        tokio::time::sleep(self.settle_delay).await;

        info!("Encoder capability loaded successfully");
        *cached = Some(encoder.clone());
        Ok(encoder)
    }

    pub async fn is_loaded(&self) -> bool {
        self.cached.lock().await.is_some()
    }

    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Default for EncoderLoader {
    fn default() -> Self {
        Self::new(Arc::new(BundledEncoderSource))
    }
}
