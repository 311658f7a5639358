pub mod backend;
pub mod cli;
pub mod config;
pub mod errors;
pub mod input;
pub mod logging;
pub mod model;
pub mod postprocessing;
pub mod results;
pub mod serialization;
pub mod service;
pub mod taxonomy;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::InferenceConfig;
pub use errors::DetectorError;
pub use model::ModelHandle;
pub use results::DetectionResult;
pub use service::InferenceService;
