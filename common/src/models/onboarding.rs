// common/src/models/onboarding.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single identity prerequisite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnboardingStep {
    ConnectWallet,
    SignWithEthereum,
    CreateSessionKey,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 3] = [
        OnboardingStep::ConnectWallet,
        OnboardingStep::SignWithEthereum,
        OnboardingStep::CreateSessionKey,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::ConnectWallet => "Connect wallet",
            Self::SignWithEthereum => "Sign in with Ethereum",
            Self::CreateSessionKey => "Create session key",
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The set of steps an action requires. Unset steps are not required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnboardingSteps {
    pub connect_wallet: bool,
    pub sign_with_ethereum: bool,
    pub create_session_key: bool,
}

impl OnboardingSteps {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self { connect_wallet: true, sign_with_ethereum: true, create_session_key: true }
    }

    pub fn with(mut self, step: OnboardingStep) -> Self {
        match step {
            OnboardingStep::ConnectWallet => self.connect_wallet = true,
            OnboardingStep::SignWithEthereum => self.sign_with_ethereum = true,
            OnboardingStep::CreateSessionKey => self.create_session_key = true,
        }
        self
    }

    pub fn contains(&self, step: OnboardingStep) -> bool {
        match step {
            OnboardingStep::ConnectWallet => self.connect_wallet,
            OnboardingStep::SignWithEthereum => self.sign_with_ethereum,
            OnboardingStep::CreateSessionKey => self.create_session_key,
        }
    }

    /// Requested steps in the order the dialog walks through them
    pub fn requested(&self) -> impl Iterator<Item = OnboardingStep> + '_ {
        OnboardingStep::ALL.into_iter().filter(move |s| self.contains(*s))
    }

    pub fn is_empty(&self) -> bool {
        self.requested().next().is_none()
    }
}

impl FromIterator<OnboardingStep> for OnboardingSteps {
    fn from_iter<I: IntoIterator<Item = OnboardingStep>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

impl fmt::Display for OnboardingSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.requested().map(|s| s.title()).collect();
        if names.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}
