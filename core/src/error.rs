use thiserror::Error;

/// Business-condition errors surfaced at the RPC and sidecar HTTP boundaries.
///
/// Internal plumbing mostly propagates `anyhow::Error` (see the rest of this
/// crate); this enum exists so handlers can map a failure to the right
/// `{success, message}` shape or HTTP status without string-matching.
#[derive(Debug, Error)]
pub enum WaystationError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    ClientError(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WaystationError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn client(what: impl Into<String>) -> Self {
        Self::ClientError(what.into())
    }

    pub fn message(&self) -> String {
        match self {
            Self::NotFound(m) | Self::Conflict(m) | Self::ClientError(m) => m.clone(),
            Self::Internal(e) => e.to_string(),
        }
    }
}
