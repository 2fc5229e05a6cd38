// onboarding/src/registry.rs
use actix::Addr;
use identity_common::OnboardingSteps;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use crate::actors::coordinator::{CompletionCallback, OnboardingCoordinator, RequireOnboarding};
use crate::error::GateError;

/// Explicit handle to the process-wide coordinator.
///
/// Cloned into whatever needs to gate actions; the owner registers the
/// coordinator on startup and unregisters it on shutdown.
#[derive(Clone, Default)]
pub struct CoordinatorRegistry {
    inner: Arc<RwLock<Option<Addr<OnboardingCoordinator>>>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinator, returning the one it replaces
    pub fn register(&self, addr: Addr<OnboardingCoordinator>) -> Option<Addr<OnboardingCoordinator>> {
        let previous = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(addr);
        tracing::info!("Onboarding coordinator registered");
        previous
    }

    pub fn unregister(&self) -> Option<Addr<OnboardingCoordinator>> {
        let previous = self.inner.write().unwrap_or_else(PoisonError::into_inner).take();
        if previous.is_some() {
            tracing::info!("Onboarding coordinator unregistered");
        }
        previous
    }

    pub fn is_registered(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn coordinator(&self) -> Result<Addr<OnboardingCoordinator>, GateError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GateError::NotRegistered)
    }

    /// Gate entry point usable from anywhere holding the registry
    pub async fn require_onboarding(
        &self,
        steps: OnboardingSteps,
        on_complete: CompletionCallback,
    ) -> Result<Option<Uuid>, GateError> {
        let coordinator = self.coordinator().map_err(|e| {
            tracing::warn!("requireOnboarding called with no coordinator registered");
            e
        })?;
        Ok(coordinator.send(RequireOnboarding { steps, on_complete }).await?)
    }
}
