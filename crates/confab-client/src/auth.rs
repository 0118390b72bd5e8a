//! One-shot credential exchange client.
//!
//! Each call opens a fresh TCP connection, writes one serialized request
//! object, and reads until a complete response object parses — the protocol
//! has no length framing, so bytes are accumulated in a
//! [`ResponseBuffer`] and a parse is re-attempted after every chunk.
//!
//! A hard wall-clock deadline (default 10 seconds) starts at connect; on
//! expiry the socket is dropped and the call fails with `RequestTimeout`.
//! The exchange never mutates session state: callers apply the returned
//! grant themselves.

use std::time::Duration;

use confab_core::error::ChatError;
use confab_proto::auth::{AuthGrant, AuthRequest, AuthResponse};
use confab_proto::codec::{self, ResponseBuffer};
use confab_proto::model::User;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default wall-clock deadline for one exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the one-shot credential protocol.
#[derive(Debug, Clone)]
pub struct AuthClient {
    addr: String,
    timeout: Duration,
}

impl AuthClient {
    /// Create a client for the credential service at `addr` (host:port),
    /// with the default deadline.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), timeout: DEFAULT_TIMEOUT }
    }

    /// Override the per-exchange deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authenticate an existing account.
    ///
    /// # Errors
    ///
    /// `RequestTimeout`, `RemoteRejected`, `ConnectionClosedEarly`, or
    /// `ConnectionLost` for transport failures.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthGrant, ChatError> {
        let data = self
            .exchange(&AuthRequest::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        grant_from(data)
    }

    /// Create an account; on success the account is also logged in.
    ///
    /// # Errors
    ///
    /// As for [`AuthClient::login`]; a "user exists" conflict surfaces as
    /// `RemoteRejected` and is not retried here.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, ChatError> {
        let data = self
            .exchange(&AuthRequest::Register {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;
        grant_from(data)
    }

    /// Check whether a stored token is still valid; returns its user.
    ///
    /// # Errors
    ///
    /// `RemoteRejected` for expired or unknown tokens, plus the transport
    /// failures of [`AuthClient::login`].
    pub async fn validate_session(&self, token: &str) -> Result<User, ChatError> {
        let data = self.exchange(&AuthRequest::ValidateSession { token: token.to_string() }).await?;
        serde_json::from_value(data)
            .map_err(|e| ChatError::ServerError(format!("malformed success payload: {e}")))
    }

    /// Invalidate a token.
    ///
    /// # Errors
    ///
    /// As for [`AuthClient::login`].
    pub async fn logout(&self, token: &str) -> Result<(), ChatError> {
        self.exchange(&AuthRequest::Logout { token: token.to_string() }).await?;
        Ok(())
    }

    /// Run one request/response exchange on a fresh connection.
    async fn exchange(&self, request: &AuthRequest) -> Result<serde_json::Value, ChatError> {
        match tokio::time::timeout(self.timeout, self.exchange_inner(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(addr = %self.addr, "credential exchange timed out");
                Err(ChatError::RequestTimeout)
            },
        }
    }

    async fn exchange_inner(&self, request: &AuthRequest) -> Result<serde_json::Value, ChatError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ChatError::ConnectionLost(e.to_string()))?;

        let body = codec::encode_request(request)
            .map_err(|e| ChatError::ValidationFailed(e.to_string()))?;
        stream
            .write_all(body.as_bytes())
            .await
            .map_err(|e| ChatError::ConnectionLost(e.to_string()))?;

        let mut buffer = ResponseBuffer::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| ChatError::ConnectionLost(e.to_string()))?;
            if n == 0 {
                return Err(ChatError::ConnectionClosedEarly);
            }

            // Partial or garbled intermediate states are swallowed; the
            // first successful parse resolves the exchange.
            if let Some(response) = buffer.extend(&chunk[..n]) {
                return match response {
                    AuthResponse::Success { data } => Ok(data),
                    AuthResponse::Error { message } => Err(ChatError::RemoteRejected(message)),
                };
            }
        }
    }
}

fn grant_from(data: serde_json::Value) -> Result<AuthGrant, ChatError> {
    serde_json::from_value(data)
        .map_err(|e| ChatError::ServerError(format!("malformed success payload: {e}")))
}
