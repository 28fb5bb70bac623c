use std::path::PathBuf;

use thiserror::Error;

/// Handled failures of one invocation. Each maps to exit code 1 and none
/// leaves anything behind in the log directory.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("File '{}' not found.", path.display())]
    NotFound { path: PathBuf },
    #[error("{message}")]
    ProviderFailure { message: String },
    #[error("{detail}")]
    MalformedResponse { detail: String },
    #[error("{var} is not set; export an OpenAI access token to use the openai provider.")]
    MissingCredential { var: String },
}

impl RunError {
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::NotFound { .. } => "not_found",
            RunError::ProviderFailure { .. } => "provider_failure",
            RunError::MalformedResponse { .. } => "malformed_response",
            RunError::MissingCredential { .. } => "missing_credential",
        }
    }
}

impl From<promptlog_contracts::prompts::MalformedResponse> for RunError {
    fn from(err: promptlog_contracts::prompts::MalformedResponse) -> Self {
        RunError::MalformedResponse { detail: err.detail }
    }
}
