// Shared infrastructure: error taxonomy and run configuration

pub mod config;
pub mod errors;

pub use config::{OnFailure, OrchestratorConfig, OrchestratorConfigBuilder, ParentResolution};
pub use errors::{GraphValidationError, NodeExecutionError, OrchestratorError, Result};
