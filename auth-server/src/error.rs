// auth-server/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use identity_common::{AuthResponse, ConfigurationError};
use thiserror::Error;

pub const INVALID_CHAIN_MESSAGE: &str = "Invalid chain ID.";
pub const INVALID_SIGNATURE_MESSAGE: &str = "Invalid signature.";
pub const VERIFICATION_FAILED_MESSAGE: &str = "Verification failed";

/// Everything the auth endpoints can fail with.
///
/// The `String` payloads are for logs only and never reach the client.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("chain id {actual} does not match configured chain {expected}")]
    InvalidChain { expected: u64, actual: u64 },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("malformed SIWE message: {0}")]
    MalformedMessage(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AuthError {
    /// JSON body sent to the client
    pub fn body(&self) -> AuthResponse {
        match self {
            Self::Configuration(e) => AuthResponse::configuration_error(e.to_string()),
            Self::InvalidChain { .. } => AuthResponse::failure(INVALID_CHAIN_MESSAGE),
            Self::InvalidSignature(_) => AuthResponse::failure(INVALID_SIGNATURE_MESSAGE),
            Self::MalformedMessage(_) | Self::VerificationFailed(_) => {
                AuthResponse::failure(VERIFICATION_FAILED_MESSAGE)
            }
            Self::Unexpected(_) => AuthResponse::opaque_failure(),
        }
    }

    /// Validation failures are the user's to fix; the rest are ours
    pub fn is_user_recoverable(&self) -> bool {
        matches!(self, Self::InvalidChain { .. } | Self::InvalidSignature(_))
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidChain { .. } | Self::InvalidSignature(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

/// Failure to seal or open the session cookie
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookie could not be decrypted")]
    Unreadable,

    #[error("session record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("session cookie could not be sealed")]
    Seal,

    #[error("session record expired at {0}")]
    Expired(chrono::DateTime<chrono::Utc>),
}
