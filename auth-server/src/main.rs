// auth-server/src/main.rs
use actix::Actor;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use identity_common::{setup_tracing, Config};
use siwe_auth_server::api;
use siwe_auth_server::middleware::rate_limiter::RateLimiter;
use siwe_auth_server::nonce_registry::NonceRegistryActor;
use siwe_auth_server::AuthState;

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("SIWE Auth Server")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    setup_tracing();

    let config = Config::from_env();

    // Save address before moving config into closures
    let server_addr = config.web_server_addr.clone();

    let nonces = NonceRegistryActor::new()
        .with_ttl(config.auth.nonce_ttl_secs)
        .with_cleanup_interval(config.auth.nonce_cleanup_interval_secs)
        .start();

    // A misconfigured deployment still starts and reports the problem per request
    let auth_state = web::Data::new(AuthState::from_config(&config.auth, nonces));
    let rate_limiter = RateLimiter::new(&config.rate_limit);

    tracing::info!("Starting SIWE Auth Server on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(rate_limiter.clone())
            .app_data(auth_state.clone())
            .service(index)
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
