use console_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Non-retryable upstream response (4xx other than 429, or a
    /// retryable status left on the final attempt).
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Retry budget spent on timeouts/connection failures.
    #[error("upstream request failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Upstream answered 2xx but the payload is not the expected shape.
    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account name already in use: {0}")]
    DuplicateAccountName(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Upstream { status, body } => {
                AppError::UpstreamError(anyhow::anyhow!("status {}: {}", status, body))
            }
            ServiceError::RetriesExhausted { attempts } => {
                AppError::UpstreamError(anyhow::anyhow!("retries exhausted after {}", attempts))
            }
            ServiceError::MalformedPayload(msg) => {
                AppError::UpstreamError(anyhow::anyhow!("malformed payload: {}", msg))
            }
            ServiceError::Transport(e) => AppError::UpstreamError(anyhow::Error::new(e)),
            ServiceError::AccountNotFound(name) => {
                AppError::NotFound(anyhow::anyhow!("account not found: {}", name))
            }
            ServiceError::DuplicateAccountName(name) => {
                AppError::BadRequest(anyhow::anyhow!("account name already in use: {}", name))
            }
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
