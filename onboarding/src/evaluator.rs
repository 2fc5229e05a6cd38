// onboarding/src/evaluator.rs
use identity_common::{OnboardingStep, OnboardingSteps};

use crate::error::IdentityError;
use crate::identity::IdentityState;

/// Readiness of a step set against one identity snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub ready: bool,
    pub loading: bool,
    pub error: Option<IdentityError>,
}

impl Evaluation {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Whether a single step is satisfied. Every step sits behind a connected wallet.
pub fn step_satisfied(step: OnboardingStep, identity: &IdentityState) -> bool {
    let connected = identity.wallet_connected();
    match step {
        OnboardingStep::ConnectWallet => connected,
        OnboardingStep::SignWithEthereum => connected && identity.authenticated(),
        OnboardingStep::CreateSessionKey => connected && identity.has_session_key(),
    }
}

/// Evaluate `steps` against `identity`.
///
/// Auth and session key lookups only count as loading once the wallet is
/// connected; a disconnected wallet is simply not ready. A wallet that is
/// connecting or reconnecting keeps any non-empty step set loading.
pub fn evaluate(steps: &OnboardingSteps, identity: &IdentityState) -> Evaluation {
    let ready = steps.requested().all(|step| step_satisfied(step, identity));

    let connected = identity.wallet_connected();
    let needs_auth = steps.contains(OnboardingStep::SignWithEthereum);
    let needs_key = steps.contains(OnboardingStep::CreateSessionKey);

    let missing_auth = needs_auth && connected && identity.auth.is_unresolved();
    let missing_key = needs_key && connected && identity.session_key.is_unresolved();
    let loading = (!steps.is_empty() && identity.wallet_connecting()) || missing_auth || missing_key;

    let error = [
        (needs_auth, &identity.auth.error),
        (needs_key, &identity.session_key.error),
    ]
    .into_iter()
    .find_map(|(requested, error)| if requested { error.clone() } else { None });

    Evaluation { ready, loading, error }
}
