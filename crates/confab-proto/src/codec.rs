//! Encode/decode helpers and the incremental response buffer.

use crate::auth::{AuthRequest, AuthResponse};
use crate::command::ClientCommand;
use crate::errors::{ProtocolError, Result};
use crate::event::ServerEvent;

/// Serialize an outbound session command to one text frame.
pub fn encode_command(command: &ClientCommand) -> Result<String> {
    serde_json::to_string(command).map_err(|source| ProtocolError::Encode { what: "command", source })
}

/// Parse one inbound text frame into a session event.
///
/// Unknown event kinds fail here; the transport logs and skips them so a
/// protocol extension on the server side never crashes the event loop.
pub fn decode_event(text: &str) -> Result<ServerEvent> {
    serde_json::from_str(text).map_err(|source| ProtocolError::Decode { what: "event", source })
}

/// Serialize a credential request.
pub fn encode_request(request: &AuthRequest) -> Result<String> {
    serde_json::to_string(request).map_err(|source| ProtocolError::Encode { what: "request", source })
}

/// Incremental buffer for the credential exchange response.
///
/// The credential protocol has no length framing: the client accumulates
/// received bytes and re-attempts a full parse after every chunk. Partial or
/// garbled intermediate states are swallowed; the first successful parse
/// wins.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    buf: Vec<u8>,
}

impl ResponseBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and attempt a parse of everything received so far.
    pub fn extend(&mut self, chunk: &[u8]) -> Option<AuthResponse> {
        self.buf.extend_from_slice(chunk);
        serde_json::from_slice(&self.buf).ok()
    }

    /// True if no bytes have been received.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
