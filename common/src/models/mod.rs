pub mod onboarding;
pub mod session;
