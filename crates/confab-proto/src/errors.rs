//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding protocol objects.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An outbound object could not be serialized.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// What was being encoded (for diagnostics).
        what: &'static str,
        /// Underlying serializer error.
        source: serde_json::Error,
    },

    /// An inbound object could not be parsed.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// What was being decoded (for diagnostics).
        what: &'static str,
        /// Underlying parser error.
        source: serde_json::Error,
    },
}
