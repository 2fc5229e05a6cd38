// onboarding/src/error.rs
use thiserror::Error;

/// Failure of an identity read (auth session or session key lookup)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Network or timeout problem; worth retrying
    #[error("identity lookup temporarily unavailable: {0}")]
    Transient(String),

    #[error("identity lookup failed: {0}")]
    Unexpected(String),
}

impl IdentityError {
    pub fn is_transient(&self) -> bool {
        matches!(self, IdentityError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no onboarding coordinator is registered")]
    NotRegistered,

    #[error("onboarding coordinator unavailable: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error("onboarding request was dropped without an outcome")]
    Abandoned,
}
