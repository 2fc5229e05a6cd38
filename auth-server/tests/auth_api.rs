// auth-server/tests/auth_api.rs
#[macro_use]
mod support;

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::http::{header, StatusCode};
use actix_web::test;
use chrono::{Duration, Utc};
use identity_common::{AuthConfig, AuthResponse};
use serde_json::json;
use support::*;

#[actix_web::test]
async fn test_nonce_response_is_private_plain_text() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/nonce").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert!(resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().starts_with("text/plain"));

    let cookie = session_cookie(&resp);
    assert!(cookie.http_only().unwrap_or(false));

    let nonce = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(nonce.len() >= 8 && nonce.chars().all(|c| c.is_ascii_alphanumeric()));

    // Each request gets its own nonce
    let (second, _) = get_nonce!(app);
    assert_ne!(nonce, second);
}

#[actix_web::test]
async fn test_signed_challenge_authenticates_once() {
    let wallets = StubWallets::new(false);
    let state = auth_state(&auth_config(), wallets.clone());
    let app = init_app!(state);

    let wallet = key(WALLET_KEY);
    let address = address_of(&wallet);

    let (nonce, nonce_cookie) = get_nonce!(app);
    let message = challenge(&address, &nonce).build();
    let signature = sign(&wallet, &message);

    let (status, body, session) = post_verify!(app, nonce_cookie, message, signature);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, AuthResponse::success());
    // Plain recovery succeeded, no on-chain call needed
    assert_eq!(wallets.calls(), 0);

    let user = get_user!(app, session);
    assert!(user.is_authenticated);
    assert_eq!(user.address.as_deref(), Some(address.as_str()));
    assert_eq!(user.chain_id, Some(CHAIN_ID));
    assert!(user.expiration_time.is_some());

    // Replaying the pre-verification cookie brings the nonce back client-side,
    // but the ledger has already spent it
    let (status, body, replayed) = post_verify!(app, nonce_cookie, message, signature);
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, AuthResponse::failure("Invalid signature."));
    assert!(!get_user!(app, replayed).is_authenticated);

    // And the authenticated cookie no longer holds any nonce
    let (status, _, _) = post_verify!(app, session, message, signature);
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_wrong_chain_is_rejected_before_signature_checks() {
    let wallets = StubWallets::new(true);
    let state = auth_state(&auth_config(), wallets.clone());
    let app = init_app!(state);

    let wallet = key(WALLET_KEY);
    let (nonce, cookie) = get_nonce!(app);
    let mut builder = challenge(&address_of(&wallet), &nonce);
    builder.chain_id = 1;
    let message = builder.build();

    let (status, body, session) = post_verify!(app, cookie, message, sign(&wallet, &message));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, AuthResponse::failure("Invalid chain ID."));
    assert_eq!(wallets.calls(), 0);
    assert!(!get_user!(app, session).is_authenticated);
}

#[actix_web::test]
async fn test_unparsable_message_fails_verification() {
    let state = auth_state(&auth_config(), StubWallets::new(true));
    let app = init_app!(state);

    let (_, cookie) = get_nonce!(app);
    let (status, body, session) = post_verify!(app, cookie, "not a siwe message", "0x00");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, AuthResponse::failure("Verification failed"));
    assert!(!get_user!(app, session).is_authenticated);
}

#[actix_web::test]
async fn test_signature_from_another_key_is_rejected() {
    let wallets = StubWallets::new(false);
    let state = auth_state(&auth_config(), wallets.clone());
    let app = init_app!(state);

    let (nonce, cookie) = get_nonce!(app);
    let message = challenge(&address_of(&key(WALLET_KEY)), &nonce).build();
    let signature = sign(&key(OTHER_KEY), &message);

    let (status, body, _) = post_verify!(app, cookie, message, signature);
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, AuthResponse::failure("Invalid signature."));
    // The claimed address was given the chance to act as a contract wallet
    assert_eq!(wallets.calls(), 1);
}

#[actix_web::test]
async fn test_contract_wallet_signature_is_accepted() {
    let wallets = StubWallets::new(true);
    let state = auth_state(&auth_config(), wallets.clone());
    let app = init_app!(state);

    let contract_address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    let (nonce, cookie) = get_nonce!(app);
    let message = challenge(contract_address, &nonce).build();
    // Contract wallets may return signatures of any length
    let signature = format!("0x{}", "ab".repeat(100));

    let (status, body, session) = post_verify!(app, cookie, message, signature);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, AuthResponse::success());
    assert_eq!(wallets.calls(), 1);
    assert_eq!(get_user!(app, session).address.as_deref(), Some(contract_address));
}

#[actix_web::test]
async fn test_no_magic_signature_bypass() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);

    let (nonce, cookie) = get_nonce!(app);
    let message = challenge(&address_of(&key(WALLET_KEY)), &nonce).build();

    let (status, body, session) = post_verify!(app, cookie, message, "0xadmin");
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, AuthResponse::failure("Invalid signature."));
    assert!(!get_user!(app, session).is_authenticated);
}

#[actix_web::test]
async fn test_domain_and_expiry_are_enforced() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);
    let wallet = key(WALLET_KEY);

    let (nonce, cookie) = get_nonce!(app);
    let mut foreign = challenge(&address_of(&wallet), &nonce);
    foreign.domain = "phishing.example".to_string();
    let message = foreign.build();
    let (status, _, _) = post_verify!(app, cookie, message, sign(&wallet, &message));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (nonce, cookie) = get_nonce!(app);
    let mut stale = challenge(&address_of(&wallet), &nonce);
    stale.expiration_time = Some((Utc::now() - Duration::minutes(1)).to_rfc3339());
    let message = stale.build();
    let (status, body, _) = post_verify!(app, cookie, message, sign(&wallet, &message));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, AuthResponse::failure("Invalid signature."));
}

#[actix_web::test]
async fn test_nonce_from_another_session_is_rejected() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);
    let wallet = key(WALLET_KEY);

    let (foreign_nonce, _) = get_nonce!(app);
    let (_, own_cookie) = get_nonce!(app);
    let message = challenge(&address_of(&wallet), &foreign_nonce).build();

    let (status, _, session) = post_verify!(app, own_cookie, message, sign(&wallet, &message));
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!get_user!(app, session).is_authenticated);
}

#[actix_web::test]
async fn test_misconfiguration_is_flagged() {
    let mut config = auth_config();
    config.session_secret = None;
    let state = auth_state(&config, StubWallets::new(false));
    let app = init_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/nonce").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: AuthResponse = test::read_body_json(resp).await;
    assert!(!body.ok);
    assert_eq!(body.is_configuration_error, Some(true));
    assert!(body.message.is_some());

    let req = test::TestRequest::post()
        .uri("/auth/verify")
        .set_json(json!({ "message": "x", "signature": "0x" }))
        .to_request();
    let body: AuthResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.is_configuration_error, Some(true));
}

#[actix_web::test]
async fn test_unreadable_body_is_opaque_failure() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/auth/verify")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"message\": 42")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: AuthResponse = test::read_body_json(resp).await;
    assert_eq!(body, AuthResponse::opaque_failure());
}

#[actix_web::test]
async fn test_logout_clears_session() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);

    let wallet = key(WALLET_KEY);
    let (nonce, cookie) = get_nonce!(app);
    let message = challenge(&address_of(&wallet), &nonce).build();
    let (status, _, session) = post_verify!(app, cookie, message, sign(&wallet, &message));
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::post().uri("/auth/logout").cookie(session.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cleared = session_cookie(&resp);
    assert_eq!(cleared.value(), "");
    assert_eq!(cleared.max_age(), Some(CookieDuration::ZERO));

    assert!(!get_user!(app, cleared).is_authenticated);
}

#[actix_web::test]
async fn test_replayed_cookie_after_logout_is_not_authenticated() {
    let state = auth_state(&auth_config(), StubWallets::new(false));
    let app = init_app!(state);

    let wallet = key(WALLET_KEY);
    let (nonce, cookie) = get_nonce!(app);
    // No Expiration Time: only the server-side age cap bounds this session
    let mut builder = challenge(&address_of(&wallet), &nonce);
    builder.expiration_time = None;
    let message = builder.build();
    let (status, _, session) = post_verify!(app, cookie, message, sign(&wallet, &message));
    assert_eq!(status, StatusCode::OK);
    assert!(get_user!(app, session).is_authenticated);

    let req = test::TestRequest::post().uri("/auth/logout").cookie(session.clone()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    // A client that kept the sealed cookie does not get the session back
    let user = get_user!(app, session);
    assert!(!user.is_authenticated);
    assert_eq!(user.address, None);
}

#[actix_web::test]
async fn test_cached_nonce_is_private_and_varies_on_cookie() {
    let config = AuthConfig { nonce_cache_max_age_secs: 120, ..auth_config() };
    let state = auth_state(&config, StubWallets::new(false));
    let app = init_app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/nonce").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cache_control = resp.headers().get(header::CACHE_CONTROL).unwrap().to_str().unwrap();
    assert_eq!(cache_control, "private, max-age=120");
    assert!(!cache_control.contains("public"));
    assert_eq!(resp.headers().get(header::VARY).unwrap(), "Cookie");
}
