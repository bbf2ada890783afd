//! Error handling module for hostbridge
//!
//! Provides centralized error handling with proper error types using thiserror.
//! The variants follow the failure classes of an automation run: configuration
//! problems are caught before the host is touched, host bring-up failures are
//! fatal, and script or render failures carry the detail the host or the render
//! tool reported.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::readiness::ReadinessStage;

/// Main error type for hostbridge
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Missing or invalid project file, settings or unresolvable paths
    #[error("Configuration error for '{field}': {detail}")]
    Config { field: String, detail: String },

    /// Host executable could not be found
    #[error("Host application not found: {}", path.display())]
    HostNotFound { path: PathBuf },

    /// Host launched but never reached the Ready stage
    #[error("Host application is not responding (waited {:.1}s, stuck before {stage})", waited.as_secs_f64())]
    HostNotResponsive {
        waited: Duration,
        stage: ReadinessStage,
    },

    /// A generated script failed inside the host (or was never picked up)
    #[error("Script execution failed: {script} -- {detail}")]
    ScriptExecution { script: String, detail: String },

    /// Render tool exited with a non-zero status
    #[error("Render failed for composition '{comp}' in project '{}': {detail}", project.display())]
    Render {
        project: PathBuf,
        comp: String,
        detail: String,
    },

    /// Invalid readiness state machine transition
    #[error("Readiness transition error: {0}")]
    ReadinessTransition(String),

    /// IO errors (queue directory, cache files, project copy)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for hostbridge operations
pub type Result<T> = std::result::Result<T, AutomationError>;

// Convenient error constructors
impl AutomationError {
    /// Create a configuration error for a named field
    pub fn config(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Create a script execution error
    pub fn script(script: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ScriptExecution {
            script: script.into(),
            detail: detail.into(),
        }
    }

    /// Create a render error
    pub fn render(
        project: impl Into<PathBuf>,
        comp: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Render {
            project: project.into(),
            comp: comp.into(),
            detail: detail.into(),
        }
    }

    /// Process exit code used by the binary for this error class
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Json(_) => 2,
            Self::HostNotFound { .. } => 3,
            Self::HostNotResponsive { .. } | Self::ReadinessTransition(_) => 4,
            Self::ScriptExecution { .. } => 5,
            Self::Render { .. } => 6,
            Self::Io(_) => 1,
        }
    }
}
