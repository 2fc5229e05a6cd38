// auth-server/src/state.rs
use actix::Addr;
use identity_common::{network_name, AuthConfig, ConfigurationError};
use std::sync::Arc;

use crate::auth::contract_wallet::{ContractWalletVerifier, DisabledContractWallets, RpcContractWalletVerifier};
use crate::auth::{AuthSessionManager, SignatureVerifier};
use crate::error::AuthError;
use crate::nonce_registry::NonceRegistryActor;
use crate::session_store::{CookieSessionStore, SessionStore};

/// Everything the auth endpoints need once configuration is valid
pub struct AuthService {
    pub manager: AuthSessionManager,
    pub store: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn from_config(auth: &AuthConfig, nonces: Addr<NonceRegistryActor>) -> Result<Self, ConfigurationError> {
        let validated = auth.validate()?;

        let contract_wallets: Arc<dyn ContractWalletVerifier> = match &validated.rpc_url {
            Some(url) => {
                let verifier = RpcContractWalletVerifier::new(url)
                    .map_err(|e| ConfigurationError::InvalidRpcUrl(e.to_string()))?;
                Arc::new(verifier)
            }
            None => {
                tracing::warn!(
                    "No RPC url for chain {}; contract wallet signatures will be rejected",
                    validated.chain_id
                );
                Arc::new(DisabledContractWallets)
            }
        };

        Self::with_contract_wallets(auth, nonces, contract_wallets)
    }

    /// Same as [`AuthService::from_config`] with an explicit contract-wallet verifier
    pub fn with_contract_wallets(
        auth: &AuthConfig,
        nonces: Addr<NonceRegistryActor>,
        contract_wallets: Arc<dyn ContractWalletVerifier>,
    ) -> Result<Self, ConfigurationError> {
        let validated = auth.validate()?;

        let store = CookieSessionStore::new(
            &validated.session_secret,
            validated.cookie_name.clone(),
            validated.session_max_age_secs,
        );

        let manager = AuthSessionManager::new(validated, nonces, SignatureVerifier::new(contract_wallets));

        Ok(Self { manager, store: Arc::new(store) })
    }

    /// `Cache-Control` value for nonce responses. Never shared between clients.
    pub fn nonce_cache_control(&self) -> String {
        match self.manager.config().nonce_cache_max_age_secs {
            0 => "no-store".to_string(),
            max_age => format!("private, max-age={}", max_age),
        }
    }
}

/// Auth endpoints' view of the deployment: ready, or broken in a known way
pub struct AuthState {
    service: Result<AuthService, ConfigurationError>,
}

impl AuthState {
    pub fn new(service: Result<AuthService, ConfigurationError>) -> Self {
        match &service {
            Ok(service) => {
                let config = service.manager.config();
                tracing::info!(
                    "SIWE auth ready for domain {} on {} ({})",
                    config.domain,
                    network_name(config.chain_id),
                    config.chain_id
                );
            }
            Err(e) => tracing::error!("SIWE auth is misconfigured, requests will fail: {}", e),
        }
        Self { service }
    }

    pub fn from_config(auth: &AuthConfig, nonces: Addr<NonceRegistryActor>) -> Self {
        Self::new(AuthService::from_config(auth, nonces))
    }

    pub fn service(&self) -> Result<&AuthService, AuthError> {
        self.service
            .as_ref()
            .map_err(|e| AuthError::Configuration(e.clone()))
    }
}
