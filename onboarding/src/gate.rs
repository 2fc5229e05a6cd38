// onboarding/src/gate.rs
use identity_common::OnboardingSteps;

use crate::actors::coordinator::{AwaitOnboarding, Evaluate, OnboardingOutcome, Require};
use crate::error::GateError;
use crate::evaluator::Evaluation;
use crate::registry::CoordinatorRegistry;

/// A step set bound to the registered coordinator, for gating actions
///
/// ```ignore
/// let gate = OnboardingGate::new(registry.clone(), OnboardingSteps::all());
/// if !gate.require().await? {
///     return Ok(());
/// }
/// do_protected_action();
/// ```
#[derive(Clone)]
pub struct OnboardingGate {
    registry: CoordinatorRegistry,
    steps: OnboardingSteps,
}

impl OnboardingGate {
    pub fn new(registry: CoordinatorRegistry, steps: OnboardingSteps) -> Self {
        Self { registry, steps }
    }

    pub fn steps(&self) -> OnboardingSteps {
        self.steps
    }

    /// Current readiness, loading and error for this step set
    pub async fn status(&self) -> Result<Evaluation, GateError> {
        let coordinator = self.registry.coordinator()?;
        Ok(coordinator.send(Evaluate { steps: self.steps }).await?)
    }

    /// True when ready. Otherwise opens the gate and returns false; the
    /// caller is not resumed, use [`OnboardingGate::run`] for that.
    pub async fn require(&self) -> Result<bool, GateError> {
        let coordinator = self.registry.coordinator()?;
        Ok(coordinator.send(Require { steps: self.steps }).await?)
    }

    /// Open the gate for this step set with nothing to run afterwards
    pub async fn show_dialog(&self) -> Result<(), GateError> {
        self.registry
            .require_onboarding(self.steps, Box::new(|| {}))
            .await
            .map(|_| ())
    }

    /// Resolves once the request opened for this step set ends
    pub async fn wait(&self) -> Result<OnboardingOutcome, GateError> {
        let coordinator = self.registry.coordinator()?;
        let outcome = coordinator.send(AwaitOnboarding { steps: self.steps }).await?;
        outcome.await.map_err(|_| GateError::Abandoned)
    }

    /// Run `action` once onboarded: right away if ready, after completion
    /// otherwise, never if the request is dismissed or replaced.
    pub async fn run<F, T>(&self, action: F) -> Result<Option<T>, GateError>
    where
        F: FnOnce() -> T,
    {
        match self.wait().await? {
            OnboardingOutcome::Completed => Ok(Some(action())),
            outcome => {
                tracing::debug!("Gated action skipped: {:?}", outcome);
                Ok(None)
            }
        }
    }
}
