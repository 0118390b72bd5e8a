//! Credential protocol: one-shot requests and responses.
//!
//! # Protocol Flow
//!
//! Each exchange opens a fresh TCP connection, writes exactly one request
//! object, and reads exactly one response object. There is no framing beyond
//! the JSON object itself; the reader accumulates bytes until a complete
//! object parses (see [`crate::codec::ResponseBuffer`]).

use serde::{Deserialize, Serialize};

use crate::model::User;

/// Requests accepted by the credential service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthRequest {
    /// Create an account.
    Register {
        /// Desired display name.
        username: String,
        /// Contact address.
        email: String,
        /// Plaintext password; hashed server-side.
        password: String,
    },

    /// Authenticate an existing account.
    Login {
        /// Display name.
        username: String,
        /// Plaintext password.
        password: String,
    },

    /// Check whether a stored token is still valid.
    ValidateSession {
        /// Token from a previous login.
        token: String,
    },

    /// Invalidate a token.
    Logout {
        /// Token to invalidate.
        token: String,
    },
}

/// Responses from the credential service, tagged by `status`.
///
/// The `data` payload varies by request kind, so it stays untyped here;
/// callers project it with [`AuthGrant`] or [`User`] as appropriate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "status")]
pub enum AuthResponse {
    /// The request succeeded.
    Success {
        /// Request-specific payload.
        data: serde_json::Value,
    },

    /// The request was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Payload of a successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    /// Opaque session token; the sole re-authentication capability.
    pub token: String,
    /// The authenticated user.
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_wire_shape() {
        let req =
            AuthRequest::Login { username: "ada".to_string(), password: "hunter22".to_string() };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"type":"Login","username":"ada","password":"hunter22"}"#
        );
    }

    #[test]
    fn failure_response_parses() {
        let resp: AuthResponse =
            serde_json::from_str(r#"{"status":"Error","message":"Invalid credentials"}"#).unwrap();
        assert!(matches!(resp, AuthResponse::Error { message } if message == "Invalid credentials"));
    }

    #[test]
    fn grant_projects_from_success_data() {
        let resp: AuthResponse = serde_json::from_str(
            r#"{
                "status": "Success",
                "data": {
                    "token": "tok-1",
                    "user": {
                        "id": "u1",
                        "username": "ada",
                        "presence": {"type": "Online"},
                        "status": null
                    }
                }
            }"#,
        )
        .unwrap();

        let AuthResponse::Success { data } = resp else {
            unreachable!("expected success");
        };
        let grant: AuthGrant = serde_json::from_value(data).unwrap();
        assert_eq!(grant.token, "tok-1");
        assert_eq!(grant.user.username, "ada");
    }
}
