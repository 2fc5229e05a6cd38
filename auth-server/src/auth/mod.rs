// auth-server/src/auth/mod.rs
pub mod contract_wallet;
pub mod message;
pub mod signature;

use actix::Addr;
use chrono::{DateTime, Duration, Utc};
use identity_common::{network_name, Session, SessionGrant, SessionUser, ValidatedAuthConfig};
use std::sync::Arc;

use crate::error::AuthError;
use crate::nonce_registry::{ConsumeNonce, IsSessionRevoked, NonceRegistryActor, NonceStatus, RecordNonce, RevokeSession};
use crate::utils::token::{generate_nonce, generate_secure_token};
use contract_wallet::ContractWalletVerifier;
use message::SiweMessage;
use signature::{decode_signature, eip191_hash, recover_address, Address};

/// Checks a wallet signature over a SIWE message.
///
/// Plain key recovery first; if the recovered signer is not the claimed
/// address, the address is asked on-chain whether it accepts the signature.
pub struct SignatureVerifier {
    contract_wallets: Arc<dyn ContractWalletVerifier>,
}

impl SignatureVerifier {
    pub fn new(contract_wallets: Arc<dyn ContractWalletVerifier>) -> Self {
        Self { contract_wallets }
    }

    pub async fn verify(&self, address: &Address, message: &str, signature: &str) -> Result<bool, AuthError> {
        let bytes = match decode_signature(signature) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Ok(false),
            Err(e) => {
                tracing::debug!("Rejecting signature: {}", e);
                return Ok(false);
            }
        };

        let hash = eip191_hash(message);

        if bytes.len() == 65 {
            match recover_address(&hash, &bytes) {
                Ok(recovered) if &recovered == address => return Ok(true),
                Ok(_) => tracing::debug!("Recovered signer differs, trying contract wallet"),
                Err(e) => tracing::debug!("Key recovery failed ({}), trying contract wallet", e),
            }
        }

        self.contract_wallets
            .is_valid_signature(*address, hash, &bytes)
            .await
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))
    }
}

const SESSION_ID_LENGTH: usize = 32;

/// Identity established by a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub address: String,
    pub chain_id: u64,
    pub expiration_time: Option<String>,
}

/// Issues nonces and verifies signed SIWE responses against a session
pub struct AuthSessionManager {
    config: ValidatedAuthConfig,
    nonces: Addr<NonceRegistryActor>,
    verifier: SignatureVerifier,
}

impl AuthSessionManager {
    pub fn new(config: ValidatedAuthConfig, nonces: Addr<NonceRegistryActor>, verifier: SignatureVerifier) -> Self {
        Self { config, nonces, verifier }
    }

    pub fn config(&self) -> &ValidatedAuthConfig {
        &self.config
    }

    /// Assign a fresh nonce to the session and record it in the ledger
    pub async fn generate_challenge(&self, session: &mut Session) -> Result<String, AuthError> {
        let nonce = generate_nonce();

        self.nonces
            .send(RecordNonce { nonce: nonce.clone() })
            .await
            .map_err(|e| AuthError::Unexpected(format!("nonce ledger unavailable: {}", e)))?;

        session.issue_nonce(nonce.clone());
        tracing::debug!("Issued SIWE nonce");

        Ok(nonce)
    }

    /// Verify a signed challenge and authenticate the session on success.
    ///
    /// The session's outstanding nonce is consumed before anything else, so
    /// every attempt burns it whatever the outcome. The caller must persist
    /// the session afterwards in both cases.
    pub async fn verify_response(
        &self,
        session: &mut Session,
        message: &str,
        signature: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        self.verify_response_at(session, message, signature, Utc::now()).await
    }

    pub async fn verify_response_at(
        &self,
        session: &mut Session,
        message: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, AuthError> {
        let outstanding = session.take_nonce();
        let nonce_status = match &outstanding {
            Some(nonce) => self
                .nonces
                .send(ConsumeNonce { nonce: nonce.clone() })
                .await
                .map_err(|e| AuthError::VerificationFailed(format!("nonce ledger unavailable: {}", e)))?,
            None => NonceStatus::Unknown,
        };

        let message = SiweMessage::parse(message)?;

        // Cheap rejection before any cryptographic work
        if message.chain_id() != self.config.chain_id {
            return Err(AuthError::InvalidChain {
                expected: self.config.chain_id,
                actual: message.chain_id(),
            });
        }

        if outstanding.as_deref() != Some(message.nonce()) {
            return Err(AuthError::InvalidSignature("nonce does not match session".to_string()));
        }
        if nonce_status != NonceStatus::Live {
            return Err(AuthError::InvalidSignature(format!("nonce is {:?}", nonce_status)));
        }

        if !message.matches_domain(&self.config.domain) {
            return Err(AuthError::InvalidSignature(format!("unexpected domain {}", message.domain())));
        }

        if !message.is_valid_at(now) {
            return Err(AuthError::InvalidSignature("message outside its validity window".to_string()));
        }

        let address = message.address();
        if !self.verifier.verify(&address, message.raw(), signature).await? {
            return Err(AuthError::InvalidSignature("signature does not match address".to_string()));
        }

        let identity = VerifiedIdentity {
            address: siwe::eip55(&address),
            chain_id: message.chain_id(),
            expiration_time: message.expiration_time(),
        };

        session.authenticate(SessionGrant {
            address: identity.address.clone(),
            chain_id: identity.chain_id,
            expiration_time: identity.expiration_time.clone(),
            session_id: generate_secure_token(SESSION_ID_LENGTH),
            authenticated_until: now + Duration::seconds(self.config.session_max_age_secs),
        });

        tracing::info!(
            "Authenticated {} on {}",
            identity.address,
            network_name(identity.chain_id)
        );

        Ok(identity)
    }

    /// Public view of the session, unauthenticated once it was logged out
    pub async fn current_user(&self, session: &Session, now: DateTime<Utc>) -> Result<SessionUser, AuthError> {
        let user = session.user_at(now);
        if !user.is_authenticated {
            return Ok(user);
        }

        let Some(session_id) = session.session_id() else {
            return Ok(SessionUser::default());
        };

        let revoked = self
            .nonces
            .send(IsSessionRevoked { session_id: session_id.to_string() })
            .await
            .map_err(|e| AuthError::Unexpected(format!("session ledger unavailable: {}", e)))?;

        Ok(if revoked { SessionUser::default() } else { user })
    }

    /// Log the session out: its id is refused from now on, and every field is dropped
    pub async fn end_session(&self, session: &mut Session) -> Result<(), AuthError> {
        if let (Some(session_id), Some(until)) = (session.session_id(), session.authenticated_until()) {
            self.nonces
                .send(RevokeSession { session_id: session_id.to_string(), until })
                .await
                .map_err(|e| AuthError::Unexpected(format!("session ledger unavailable: {}", e)))?;
        }

        session.clear();
        Ok(())
    }
}
