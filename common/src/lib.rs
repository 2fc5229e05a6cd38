pub mod config;
pub mod models;
pub mod network;
pub mod utils;

pub use config::*;
pub use models::onboarding::{OnboardingStep, OnboardingSteps};
pub use models::session::{AuthResponse, AuthUserResponse, Session, SessionGrant, SessionUser};
pub use network::*;
pub use utils::*;
