// auth-server/src/api/mod.rs
pub mod auth;

use actix_web::{error::InternalError, web, HttpResponse, ResponseError};

use crate::error::AuthError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .app_data(json_config())
            .service(auth::nonce)
            .service(auth::verify)
            .service(auth::user)
            .service(auth::logout),
    );
}

// Unreadable request bodies get the same opaque 500 as any unexpected failure
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err, _req| {
            tracing::debug!("Rejecting auth request body: {}", err);
            let response: HttpResponse = AuthError::Unexpected(err.to_string()).error_response();
            InternalError::from_response(err, response).into()
        })
}
