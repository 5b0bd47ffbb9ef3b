//! Error taxonomy for the migration pipeline.
//!
//! Errors fall into three classes (transport, missing-correspondence,
//! content). Only transport and IO failures surface as [`MigrateError`];
//! missing-correspondence and content problems are handled where they occur
//! as warn-and-skip, so one bad entity never aborts a batch.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// The HTTP client failed before a status line was available
    /// (connect failure, TLS failure, malformed response).
    #[error("http transport error: {0}")]
    Http(#[from] Box<ureq::Error>),

    /// The remote answered with a non-success status on a call that has no
    /// benign failure mode (inventory listing, reviewer conditions).
    #[error("unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ureq::Error> for MigrateError {
    fn from(e: ureq::Error) -> Self {
        Self::Http(Box::new(e))
    }
}

/// Outcome of one create-or-update call against the cloud side.
///
/// An idempotent-skip ("the target already holds the desired state") is a
/// first-class outcome, not an error swallowed in logging: callers count it
/// as success-equivalent and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The entity was created or the setting was applied.
    Created,
    /// The entity already existed; desired state was already in place.
    AlreadyExists,
    /// The call failed for a reason other than prior existence.
    Failed(String),
}

impl ApplyOutcome {
    /// True for both `Created` and `AlreadyExists`.
    pub fn is_success(&self) -> bool {
        !matches!(self, ApplyOutcome::Failed(_))
    }
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyOutcome::Created => write!(f, "created"),
            ApplyOutcome::AlreadyExists => write!(f, "already exists"),
            ApplyOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
