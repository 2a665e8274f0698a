//! Error taxonomy for the policy report pipeline.
//!
//! Every variant is fatal: the aggregation is all-or-nothing and no partial
//! report is produced.

use thiserror::Error;

/// Errors produced while resolving, fetching, joining or rendering policies.
#[derive(Debug, Error)]
pub enum PolicyReportError {
    /// The remote API answered with an error code or a non-soft error message.
    #[error("remote request {request} failed: {}", describe_remote(.error_code, .error_message))]
    Remote {
        request: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },

    /// The request never produced a response body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A token returned by one vitals listing is missing from a map built by another.
    #[error("lookup inconsistency: project token {token} not found in {map}")]
    LookupInconsistency { map: &'static str, token: String },

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Project parallelism level outside 1..=20.
    #[error("invalid projectParallelismLevel <{0}>: must be between 1 and 20")]
    InvalidParallelism(i64),

    /// A worker task panicked or was cancelled.
    #[error("task join error: {0}")]
    TaskJoin(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Workbook could not be built or saved.
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl PolicyReportError {
    /// Short category label used in the final diagnostic line.
    pub fn category(&self) -> &'static str {
        match self {
            PolicyReportError::Remote { .. }
            | PolicyReportError::Transport(_)
            | PolicyReportError::Protocol(_) => "transport/protocol failure",
            PolicyReportError::LookupInconsistency { .. } => "lookup inconsistency",
            PolicyReportError::Config(_) | PolicyReportError::InvalidParallelism(_) => {
                "configuration failure"
            }
            PolicyReportError::TaskJoin(_) => "worker failure",
            PolicyReportError::Io(_) | PolicyReportError::Json(_) | PolicyReportError::Xlsx(_) => {
                "report output failure"
            }
        }
    }
}

impl From<reqwest::Error> for PolicyReportError {
    fn from(err: reqwest::Error) -> Self {
        PolicyReportError::Transport(err.to_string())
    }
}

fn describe_remote(code: &Option<String>, message: &Option<String>) -> String {
    match (code, message) {
        (Some(c), Some(m)) => format!("error code {c}: {m}"),
        (Some(c), None) => format!("error code {c}"),
        (None, Some(m)) => m.clone(),
        (None, None) => "unknown error".to_string(),
    }
}

/// Result type for policy report operations.
pub type Result<T> = std::result::Result<T, PolicyReportError>;
