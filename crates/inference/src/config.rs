use crate::backend::{BackendOptions, ExecutionProvider};
use std::env;
use std::path::{Path, PathBuf};

pub use common::Environment;
pub use preprocess::DEFAULT_INPUT_SIZE;

/// Scores below this never leave the post-processor.
pub const CONFIDENCE_THRESHOLD: f32 = 0.20;

/// Largest accepted `INPUT_WIDTH` / `INPUT_HEIGHT`.
pub const MAX_INPUT_SIDE: u32 = 4096;

/// File name looked up next to the executable when `MODEL_PATH` is unset.
pub const DEFAULT_MODEL_FILE: &str = "best.onnx";

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    pub model_path: PathBuf,
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub intra_threads: usize,
    pub execution_provider: ExecutionProvider,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let environment = Environment::from_env();

        let model_path = env::var_os("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_model_path);

        let input_width = env::var("INPUT_WIDTH")
            .ok()
            .and_then(|s| parse_input_side(&s))
            .unwrap_or(DEFAULT_INPUT_SIZE.0);

        let input_height = env::var("INPUT_HEIGHT")
            .ok()
            .and_then(|s| parse_input_side(&s))
            .unwrap_or(DEFAULT_INPUT_SIZE.1);

        let iou_threshold = env::var("IOU_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.7);

        let max_detections = env::var("MAX_DETECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let intra_threads = env::var("INTRA_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        let execution_provider = env::var("EXECUTION_PROVIDER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(ExecutionProvider::Cpu);

        Self {
            environment,
            model_path,
            input_size: (input_width, input_height),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            iou_threshold,
            max_detections,
            intra_threads,
            execution_provider,
        }
    }

    pub fn with_model_path(mut self, model_path: impl Into<PathBuf>) -> Self {
        self.model_path = model_path.into();
        self
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            execution_provider: self.execution_provider,
            intra_threads: self.intra_threads,
        }
    }

    /// Create default configuration for testing
    pub fn test_default(model_path: &Path) -> Self {
        Self {
            environment: Environment::Development,
            model_path: model_path.to_path_buf(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            iou_threshold: 0.7,
            max_detections: 300,
            intra_threads: 1,
            execution_provider: ExecutionProvider::Cpu,
        }
    }
}

/// Zero and oversized sides fall back to the default.
fn parse_input_side(value: &str) -> Option<u32> {
    value
        .trim()
        .parse()
        .ok()
        .filter(|side| (1..=MAX_INPUT_SIDE).contains(side))
}

/// `best.onnx` beside the running binary, or in the working directory if the
/// binary location cannot be resolved.
fn default_model_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_MODEL_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_FILE))
}
