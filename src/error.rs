use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PssError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// External process could not be started or exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ToolInvocation {
        tool: String,
        reason: String,
        output: String,
    },

    #[error("{tool} reported success but did not produce {}", .path.display())]
    MissingOutput { tool: String, path: PathBuf },

    /// A binary start code the stream is required to carry is absent.
    #[error("{marker} not found in {}", .path.display())]
    MarkerNotFound { marker: &'static str, path: PathBuf },

    #[error("Filesystem error on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PssError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Text captured from an external tool, if this error came from one.
    pub fn captured_output(&self) -> &str {
        match self {
            Self::ToolInvocation { output, .. } => output,
            _ => "",
        }
    }
}

pub type Result<T> = std::result::Result<T, PssError>;
