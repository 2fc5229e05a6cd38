// onboarding/src/lib.rs
pub mod actors;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod identity;
pub mod registry;
pub mod retry;

pub use actors::coordinator::{
    CompletionCallback, GatePhase, GateView, OnboardingCoordinator, OnboardingOutcome, RequestView,
};
pub use error::{GateError, IdentityError};
pub use evaluator::{evaluate, Evaluation};
pub use gate::OnboardingGate;
pub use identity::{
    AuthSessionQuery, HttpAuthSessionQuery, IdentityState, QueryState, SessionKeyQuery, WalletConnection,
};
pub use registry::CoordinatorRegistry;
pub use retry::RetryPolicy;
