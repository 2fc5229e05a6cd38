pub mod api;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod nonce_registry;
pub mod session_store;
pub mod state;
pub mod utils;

pub use error::{AuthError, SessionError};
pub use state::{AuthService, AuthState};
