use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the revenue pipeline.
///
/// Per-source variants are recovered at the project collector; only the
/// per-project variants reach the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RevenueError {
    // -- Per source ---------------------------------------------------------
    #[error("source {source_id} unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("source {source_id} has no usable data ({raw_points} raw points, none passed filtering)")]
    NoUsableData { source_id: String, raw_points: usize },

    #[error("source {source_id} revenue exceeds the representable range")]
    RevenueOverflow { source_id: String },

    // -- Per project --------------------------------------------------------
    #[error("no valid revenue data for {project}: all {attempted} sources failed")]
    AllSourcesFailed { project: String, attempted: usize },

    #[error("combined revenue for {project} exceeds the representable range")]
    AggregateOverflow { project: String },
}

impl RevenueError {
    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::SourceUnavailable { source_id, .. }
            | Self::NoUsableData { source_id, .. }
            | Self::RevenueOverflow { source_id } => Some(source_id),
            Self::AllSourcesFailed { .. } | Self::AggregateOverflow { .. } => None,
        }
    }
}

/// A failed request to a remote revenue source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl FetchError {
    /// Transport failures, throttling and server errors are worth another attempt;
    /// auth failures, bad queries and schema mismatches are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_decode(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::GraphQl(_) | Self::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let status = |code: u16| FetchError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!FetchError::GraphQl("Type `Query` has no field `poolManagers`".into()).is_retryable());
    }

    #[test]
    fn test_source_id_accessor() {
        let err = RevenueError::NoUsableData {
            source_id: "aave-v3-polygon".into(),
            raw_points: 12,
        };
        assert_eq!(err.source_id(), Some("aave-v3-polygon"));
        assert!(err.to_string().contains("12 raw points"));
    }
}
