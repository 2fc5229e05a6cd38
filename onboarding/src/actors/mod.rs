// onboarding/src/actors/mod.rs
pub mod coordinator;
