// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client-held SIWE session record.
///
/// `is_authenticated` is only ever set together with `address` and `chain_id`,
/// which is why the fields are private and only mutated through methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_authenticated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authenticated_until: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn expiration_time(&self) -> Option<&str> {
        self.expiration_time.as_deref()
    }

    /// Server-assigned id of an authenticated session, used for revocation
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn authenticated_until(&self) -> Option<DateTime<Utc>> {
        self.authenticated_until
    }

    /// Replace the outstanding nonce. A session never holds more than one.
    pub fn issue_nonce(&mut self, nonce: String) {
        self.nonce = Some(nonce);
    }

    /// Remove and return the outstanding nonce
    pub fn take_nonce(&mut self) -> Option<String> {
        self.nonce.take()
    }

    /// Upgrade session to authenticated status.
    ///
    /// `authenticated_until` caps the session even when the SIWE message
    /// carried no `Expiration Time`.
    pub fn authenticate(&mut self, grant: SessionGrant) {
        self.is_authenticated = Some(true);
        self.address = Some(grant.address);
        self.chain_id = Some(grant.chain_id);
        self.expiration_time = grant.expiration_time;
        self.session_id = Some(grant.session_id);
        self.authenticated_until = Some(grant.authenticated_until);
    }

    /// Whether the session is authenticated, within its maximum age and not
    /// past the message's expiration time
    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_authenticated != Some(true) || self.address.is_none() || self.chain_id.is_none() {
            return false;
        }

        match self.authenticated_until {
            Some(until) if until > now => {}
            _ => return false,
        }

        match self.expiration_time.as_deref() {
            None => true,
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(expires) => expires.with_timezone(&Utc) > now,
                // An unreadable expiration never extends a session
                Err(_) => false,
            },
        }
    }

    /// Drop every field, as on logout
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn user_at(&self, now: DateTime<Utc>) -> SessionUser {
        if self.is_authenticated_at(now) {
            SessionUser {
                is_authenticated: true,
                address: self.address.clone(),
                chain_id: self.chain_id,
                expiration_time: self.expiration_time.clone(),
            }
        } else {
            SessionUser::default()
        }
    }
}

/// What a successful verification grants a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub address: String,
    pub chain_id: u64,
    pub expiration_time: Option<String>,
    pub session_id: String,
    pub authenticated_until: DateTime<Utc>,
}

/// Public view of a session. Never carries the nonce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
}

/// Body of every `/auth/*` JSON response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_configuration_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthResponse {
    pub fn success() -> Self {
        Self { ok: true, is_configuration_error: None, message: None }
    }

    /// `{ok:false}` with nothing else, for errors that must not leak detail
    pub fn opaque_failure() -> Self {
        Self { ok: false, is_configuration_error: None, message: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { ok: false, is_configuration_error: None, message: Some(message.into()) }
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self { ok: false, is_configuration_error: Some(true), message: Some(message.into()) }
    }
}

/// Response of `GET /auth/user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUserResponse {
    pub ok: bool,
    pub user: SessionUser,
}
