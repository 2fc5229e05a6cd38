// onboarding/src/identity.rs
use async_trait::async_trait;
use identity_common::AuthUserResponse;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::IdentityError;

/// Wallet connection status as reported by the wallet provider
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WalletConnection {
    #[default]
    Disconnected,
    Connecting,
    Reconnecting,
    Connected { address: String },
}

impl WalletConnection {
    pub fn is_connected(&self) -> bool {
        matches!(self, WalletConnection::Connected { .. })
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, WalletConnection::Connecting | WalletConnection::Reconnecting)
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            WalletConnection::Connected { address } => Some(address),
            _ => None,
        }
    }
}

/// Result of an identity lookup: last known data, whether a read is in
/// flight, and the last error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<IdentityError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

impl<T> QueryState<T> {
    pub fn ready(data: T) -> Self {
        Self {
            data: Some(data),
            is_loading: false,
            error: None,
        }
    }

    pub fn failed(error: IdentityError) -> Self {
        Self {
            data: None,
            is_loading: false,
            error: Some(error),
        }
    }

    /// Neither data nor error yet
    pub fn is_unresolved(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }

    /// Mark a read as started, keeping previous data
    pub fn begin_fetch(&mut self) {
        self.is_loading = true;
    }

    /// Apply a finished read. Errors keep the previous data.
    pub fn settle(&mut self, result: Result<T, IdentityError>) {
        self.is_loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(e) => self.error = Some(e),
        }
    }
}

/// Snapshot of everything the evaluator looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    pub wallet: WalletConnection,
    pub auth: QueryState<AuthUserResponse>,
    pub session_key: QueryState<bool>,
}

impl IdentityState {
    pub fn wallet_connected(&self) -> bool {
        self.wallet.is_connected()
    }

    pub fn wallet_connecting(&self) -> bool {
        self.wallet.is_connecting()
    }

    pub fn authenticated(&self) -> bool {
        self.auth
            .data
            .as_ref()
            .map(|resp| resp.ok && resp.user.is_authenticated)
            .unwrap_or(false)
    }

    pub fn has_session_key(&self) -> bool {
        self.session_key.data.unwrap_or(false)
    }

    /// Drop everything learned for the previous wallet
    pub fn reset_queries(&mut self) {
        self.auth = QueryState::default();
        self.session_key = QueryState::default();
    }
}

/// Reads the authenticated session for the current client
#[async_trait]
pub trait AuthSessionQuery: Send + Sync {
    async fn fetch(&self) -> Result<AuthUserResponse, IdentityError>;
}

/// Reports whether a usable session key exists for a wallet
#[async_trait]
pub trait SessionKeyQuery: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<bool, IdentityError>;
}

/// [`AuthSessionQuery`] backed by the auth server's `GET /auth/user`
pub struct HttpAuthSessionQuery {
    client: reqwest::Client,
    user_url: String,
}

impl HttpAuthSessionQuery {
    /// Client with its own cookie store and a 10 second timeout
    pub fn new(base_url: &str) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| IdentityError::Unexpected(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse a client that already carries the session cookie
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            user_url: format!("{}/auth/user", base_url.trim_end_matches('/')),
        }
    }
}

fn classify_transport(e: reqwest::Error) -> IdentityError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        IdentityError::Transient(e.to_string())
    } else {
        IdentityError::Unexpected(e.to_string())
    }
}

fn classify_status(status: StatusCode) -> IdentityError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        IdentityError::Transient(format!("auth server answered {}", status))
    } else {
        IdentityError::Unexpected(format!("auth server answered {}", status))
    }
}

#[async_trait]
impl AuthSessionQuery for HttpAuthSessionQuery {
    async fn fetch(&self) -> Result<AuthUserResponse, IdentityError> {
        let response = self
            .client
            .get(&self.user_url)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        response
            .json::<AuthUserResponse>()
            .await
            .map_err(|e| IdentityError::Unexpected(format!("malformed session body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity_common::SessionUser;

    #[test]
    fn test_settle_keeps_data_on_error() {
        let mut query = QueryState::ready(true);
        query.begin_fetch();
        assert!(query.is_loading);
        assert_eq!(query.data, Some(true));

        query.settle(Err(IdentityError::Transient("timeout".into())));
        assert!(!query.is_loading);
        assert_eq!(query.data, Some(true));
        assert!(query.error.is_some());

        query.settle(Ok(false));
        assert_eq!(query.data, Some(false));
        assert!(query.error.is_none());
    }

    #[test]
    fn test_authenticated_requires_ok_body() {
        let mut identity = IdentityState::default();
        assert!(!identity.authenticated());

        let user = SessionUser {
            is_authenticated: true,
            ..SessionUser::default()
        };
        identity.auth = QueryState::ready(AuthUserResponse { ok: false, user: user.clone() });
        assert!(!identity.authenticated());

        identity.auth = QueryState::ready(AuthUserResponse { ok: true, user });
        assert!(identity.authenticated());
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!classify_status(StatusCode::NOT_FOUND).is_transient());
    }

    #[test]
    fn test_user_url() {
        let query = HttpAuthSessionQuery::with_client(reqwest::Client::new(), "http://localhost:8081/");
        assert_eq!(query.user_url, "http://localhost:8081/auth/user");
    }
}
