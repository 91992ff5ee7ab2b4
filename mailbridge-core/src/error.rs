//! Error types for the mailbridge workspace.

use thiserror::Error;

/// Errors that can occur in bridge operations.
///
/// Malformed traffic on the shared channel is deliberately not represented
/// here: the codec returns `Option` and callers drop such messages silently.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid calendar reference: {0}")]
    InvalidReference(String),

    #[error("Calendar not found: {0}")]
    NotFound(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("unknown action")]
    UnknownAction(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("{0}")]
    Remote(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    /// HTTP-equivalent status for surfacing a failure to an HTTP-shaped caller.
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::Unauthenticated => 401,
            BridgeError::InvalidReference(_) => 400,
            BridgeError::NotFound(_) => 404,
            BridgeError::UnknownAction(_) => 400,
            BridgeError::Timeout(_) => 504,
            BridgeError::StoreFailure(_)
            | BridgeError::ChannelClosed
            | BridgeError::Remote(_)
            | BridgeError::Serialization(_) => 500,
        }
    }
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_http_table() {
        assert_eq!(BridgeError::Unauthenticated.status_code(), 401);
        assert_eq!(BridgeError::InvalidReference("a/b".into()).status_code(), 400);
        assert_eq!(BridgeError::NotFound("work".into()).status_code(), 404);
        assert_eq!(BridgeError::StoreFailure("disk".into()).status_code(), 500);
        assert_eq!(BridgeError::Timeout(50).status_code(), 504);
    }
}
