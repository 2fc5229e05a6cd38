// auth-server/tests/support/mod.rs
#![allow(dead_code)]

use actix::Actor;
use actix_web::cookie::Cookie;
use actix_web::web;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use identity_common::AuthConfig;
use k256::ecdsa::SigningKey;
use siwe_auth_server::auth::contract_wallet::{ContractWalletError, ContractWalletVerifier};
use siwe_auth_server::auth::message::SiweMessageBuilder;
use siwe_auth_server::auth::signature::{address_from_verifying_key, eip191_hash, Address};
use siwe_auth_server::nonce_registry::NonceRegistryActor;
use siwe_auth_server::{AuthService, AuthState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const DOMAIN: &str = "localhost:3000";
pub const CHAIN_ID: u64 = 2741;
pub const COOKIE_NAME: &str = "siwe_session";
pub const WALLET_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OTHER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Contract-wallet verifier that answers a fixed value and counts calls
pub struct StubWallets {
    accept: bool,
    calls: AtomicUsize,
}

impl StubWallets {
    pub fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self { accept, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractWalletVerifier for StubWallets {
    async fn is_valid_signature(
        &self,
        _wallet: Address,
        _hash: [u8; 32],
        _signature: &[u8],
    ) -> Result<bool, ContractWalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept)
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        session_secret: Some(SECRET.to_string()),
        chain_id: Some(CHAIN_ID),
        domain: Some(DOMAIN.to_string()),
        ..AuthConfig::default()
    }
}

pub fn auth_state(config: &AuthConfig, wallets: Arc<dyn ContractWalletVerifier>) -> web::Data<AuthState> {
    let nonces = NonceRegistryActor::new().start();
    web::Data::new(AuthState::new(AuthService::with_contract_wallets(config, nonces, wallets)))
}

pub fn key(hex_key: &str) -> SigningKey {
    SigningKey::from_slice(&hex::decode(hex_key).unwrap()).unwrap()
}

pub fn address_of(key: &SigningKey) -> String {
    siwe::eip55(&address_from_verifying_key(key.verifying_key()))
}

pub fn sign(key: &SigningKey, message: &str) -> String {
    let (sig, recid) = key.sign_prehash_recoverable(&eip191_hash(message)).unwrap();
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recid.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

pub fn challenge(address: &str, nonce: &str) -> SiweMessageBuilder {
    SiweMessageBuilder {
        domain: DOMAIN.to_string(),
        address: address.to_string(),
        statement: Some("Sign in to the app.".to_string()),
        uri: format!("http://{}", DOMAIN),
        chain_id: CHAIN_ID,
        nonce: nonce.to_string(),
        issued_at: Utc::now().to_rfc3339(),
        expiration_time: Some((Utc::now() + Duration::hours(1)).to_rfc3339()),
        not_before: None,
    }
}

pub fn session_cookie<B>(resp: &actix_web::dev::ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.into_owned())
        .expect("response should carry the session cookie")
}

macro_rules! init_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .configure(siwe_auth_server::api::configure),
        )
        .await
    };
}

macro_rules! get_nonce {
    ($app:expr) => {{
        let req = actix_web::test::TestRequest::get().uri("/auth/nonce").to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        let cookie = $crate::support::session_cookie(&resp);
        let body = actix_web::test::read_body(resp).await;
        (String::from_utf8(body.to_vec()).unwrap(), cookie)
    }};
}

macro_rules! post_verify {
    ($app:expr, $cookie:expr, $message:expr, $signature:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/auth/verify")
            .cookie($cookie.clone())
            .set_json(serde_json::json!({ "message": $message, "signature": $signature }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        let status = resp.status();
        let cookie = $crate::support::session_cookie(&resp);
        let body: identity_common::AuthResponse = actix_web::test::read_body_json(resp).await;
        (status, body, cookie)
    }};
}

macro_rules! get_user {
    ($app:expr, $cookie:expr) => {{
        let req = actix_web::test::TestRequest::get().uri("/auth/user").cookie($cookie.clone()).to_request();
        let body: identity_common::AuthUserResponse = actix_web::test::call_and_read_body_json(&$app, req).await;
        body.user
    }};
}

