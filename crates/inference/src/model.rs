use crate::backend::{BackendOptions, InferenceBackend};
use crate::errors::DetectorError;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Owns the detector and loads it on first use.
///
/// The load runs at most once per handle; later calls hand back the same
/// backend. A failed load is not cached, so the next call tries again.
pub struct ModelHandle<B: InferenceBackend> {
    path: PathBuf,
    options: BackendOptions,
    backend: Option<B>,
}

impl<B: InferenceBackend> ModelHandle<B> {
    pub fn new(path: impl Into<PathBuf>, options: BackendOptions) -> Self {
        Self {
            path: path.into(),
            options,
            backend: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.backend.is_some()
    }

    pub fn get(&mut self) -> Result<&mut B, DetectorError> {
        let backend = match self.backend.take() {
            Some(backend) => backend,
            None => self.load()?,
        };
        Ok(self.backend.insert(backend))
    }

    fn load(&self) -> Result<B, DetectorError> {
        if !self.path.exists() {
            tracing::error!(path = %self.path.display(), "Model artifact missing");
            return Err(DetectorError::ModelNotFound(self.path.clone()));
        }

        tracing::info!(
            path = %self.path.display(),
            provider = ?self.options.execution_provider,
            "Loading inference model"
        );
        let start = Instant::now();

        let backend = B::load_model(&self.path, &self.options).map_err(DetectorError::Inference)?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded successfully"
        );
        Ok(backend)
    }
}
