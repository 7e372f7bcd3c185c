use serde_json::json;

/// Error type shared by the domain modules. Every variant maps onto one
/// envelope error code; handlers never build codes by hand for these cases.
#[derive(Debug, thiserror::Error)]
pub enum LmsError {
    #[error("{0}")]
    BadParams(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(String),

    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("insufficient funds: balance {balance_cents}, requested {requested_cents}")]
    InsufficientFunds {
        balance_cents: i64,
        requested_cents: i64,
    },

    #[error("course not completed: progress {progress_percentage}")]
    NotCompleted { progress_percentage: f64 },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("settings error: {0}")]
    Settings(#[from] anyhow::Error),
}

pub type LmsResult<T> = Result<T, LmsError>;

impl LmsError {
    pub fn code(&self) -> &'static str {
        match self {
            LmsError::BadParams(_) => "bad_params",
            LmsError::NotFound(_) => "not_found",
            LmsError::Unauthorized(_) => "unauthorized",
            LmsError::Forbidden(_) => "forbidden",
            LmsError::InvalidState(_) => "invalid_state",
            LmsError::InsufficientFunds { .. } => "insufficient_funds",
            LmsError::NotCompleted { .. } => "not_completed",
            LmsError::Db(_) => "db_query_failed",
            LmsError::Settings(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            LmsError::InsufficientFunds {
                balance_cents,
                requested_cents,
            } => Some(json!({
                "balanceCents": balance_cents,
                "requestedCents": requested_cents,
            })),
            LmsError::NotCompleted {
                progress_percentage,
            } => Some(json!({ "progressPercentage": progress_percentage })),
            LmsError::Forbidden(permission) => Some(json!({ "permission": permission })),
            _ => None,
        }
    }

    /// Client-facing message. Storage failures are logged in full and
    /// surfaced with a generic text so driver internals never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            LmsError::Db(_) | LmsError::Settings(_) => "storage operation failed".to_string(),
            other => other.to_string(),
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        LmsError::BadParams(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        LmsError::InvalidState(message.into())
    }
}
