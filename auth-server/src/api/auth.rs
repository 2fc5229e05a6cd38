// auth-server/src/api/auth.rs
use actix_web::http::header::{self, ContentType};
use actix_web::{get, post, web, HttpRequest, HttpResponse, ResponseError};
use chrono::Utc;
use identity_common::{AuthResponse, AuthUserResponse};
use serde::Deserialize;

use crate::error::AuthError;
use crate::state::AuthState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String,
}

fn failure(err: AuthError) -> HttpResponse {
    if err.is_user_recoverable() {
        tracing::warn!("Verification rejected: {}", err);
    } else {
        tracing::error!("Auth request failed: {}", err);
    }
    err.error_response()
}

// Issue a fresh SIWE nonce bound to the caller's session
#[get("/nonce")]
pub async fn nonce(req: HttpRequest, state: web::Data<AuthState>) -> HttpResponse {
    let service = match state.service() {
        Ok(service) => service,
        Err(e) => return failure(e),
    };

    let mut session = service.store.load(&req);

    let nonce = match service.manager.generate_challenge(&mut session).await {
        Ok(nonce) => nonce,
        Err(e) => return failure(e),
    };

    let cookie = match service.store.persist(&session) {
        Ok(cookie) => cookie,
        Err(e) => return failure(AuthError::Unexpected(e.to_string())),
    };

    HttpResponse::Ok()
        .cookie(cookie)
        .content_type(ContentType::plaintext())
        .insert_header((header::CACHE_CONTROL, service.nonce_cache_control()))
        .insert_header((header::VARY, "Cookie"))
        .body(nonce)
}

// Verify a signed SIWE message and authenticate the session
#[post("/verify")]
pub async fn verify(
    req: HttpRequest,
    body: web::Json<VerifyRequest>,
    state: web::Data<AuthState>,
) -> HttpResponse {
    let service = match state.service() {
        Ok(service) => service,
        Err(e) => return failure(e),
    };

    let mut session = service.store.load(&req);
    let result = service
        .manager
        .verify_response(&mut session, &body.message, &body.signature)
        .await;

    // Persist on both paths: the nonce is spent either way
    let cookie = match service.store.persist(&session) {
        Ok(cookie) => cookie,
        Err(e) => return failure(AuthError::VerificationFailed(e.to_string())),
    };

    let mut response = match result {
        Ok(_) => HttpResponse::Ok().json(AuthResponse::success()),
        Err(e) => failure(e),
    };

    if let Err(e) = response.add_cookie(&cookie) {
        return failure(AuthError::VerificationFailed(e.to_string()));
    }

    response
}

// Current authentication state of the caller's session
#[get("/user")]
pub async fn user(req: HttpRequest, state: web::Data<AuthState>) -> HttpResponse {
    let service = match state.service() {
        Ok(service) => service,
        Err(e) => return failure(e),
    };

    let session = service.store.load(&req);
    let user = match service.manager.current_user(&session, Utc::now()).await {
        Ok(user) => user,
        Err(e) => return failure(e),
    };

    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(AuthUserResponse { ok: true, user })
}

// Drop the caller's session. Replaying the old cookie afterwards does not log back in.
#[post("/logout")]
pub async fn logout(req: HttpRequest, state: web::Data<AuthState>) -> HttpResponse {
    let service = match state.service() {
        Ok(service) => service,
        Err(e) => return failure(e),
    };

    let mut session = service.store.load(&req);
    if let Err(e) = service.manager.end_session(&mut session).await {
        return failure(e);
    }

    tracing::info!("Session logged out");

    HttpResponse::Ok()
        .cookie(service.store.destroy())
        .json(AuthResponse::success())
}
