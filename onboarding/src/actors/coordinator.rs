// onboarding/src/actors/coordinator.rs
use actix::{
    Actor, ActorContext, ActorFutureExt, Addr, AsyncContext, Context, Handler, Message,
    MessageResult, SpawnHandle, WrapFuture,
};
use identity_common::{AuthUserResponse, OnboardingConfig, OnboardingSteps};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use crate::error::{GateError, IdentityError};
use crate::evaluator::{evaluate, Evaluation};
use crate::identity::{AuthSessionQuery, IdentityState, SessionKeyQuery, WalletConnection};
use crate::registry::CoordinatorRegistry;
use crate::retry::RetryPolicy;

/// Invoked once when an onboarding request completes
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GatePhase {
    /// No active request
    Idle,
    /// Request active, gate visible
    Open,
    /// Satisfied, waiting out the settle delay
    Completing,
}

/// How an onboarding request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OnboardingOutcome {
    Completed,
    Dismissed,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: Uuid,
    pub steps: OnboardingSteps,
}

/// Read-only view for UI subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateView {
    pub phase: GatePhase,
    pub current_request: Option<RequestView>,
    pub is_open: bool,
}

impl GateView {
    fn idle() -> Self {
        Self {
            phase: GatePhase::Idle,
            current_request: None,
            is_open: false,
        }
    }
}

struct ActiveRequest {
    id: Uuid,
    steps: OnboardingSteps,
    on_complete: Option<CompletionCallback>,
    waiters: Vec<oneshot::Sender<OnboardingOutcome>>,
}

impl ActiveRequest {
    fn new(steps: OnboardingSteps) -> Self {
        Self {
            id: Uuid::new_v4(),
            steps,
            on_complete: None,
            waiters: Vec::new(),
        }
    }

    fn resolve(self, outcome: OnboardingOutcome) {
        if outcome == OnboardingOutcome::Completed {
            if let Some(callback) = self.on_complete {
                callback();
            }
        }
        for waiter in self.waiters {
            // Receiver may have gone away; nothing to do then
            let _ = waiter.send(outcome);
        }
    }
}

// Gate operations

/// Returns true when already ready; otherwise opens the gate with a no-op completion
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Require {
    pub steps: OnboardingSteps,
}

/// Runs `on_complete` now if ready, else once the opened request completes.
/// Returns the id of the opened request, if any.
#[derive(Message)]
#[rtype(result = "Option<Uuid>")]
pub struct RequireOnboarding {
    pub steps: OnboardingSteps,
    pub on_complete: CompletionCallback,
}

/// Like [`RequireOnboarding`] with the outcome delivered over a channel
#[derive(Message)]
#[rtype(result = "oneshot::Receiver<OnboardingOutcome>")]
pub struct AwaitOnboarding {
    pub steps: OnboardingSteps,
}

/// Complete the active request now. Ignored unless it is satisfied.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Complete;

/// Dismiss the active request without completing it
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Close;

// Identity notifications

/// Replace the whole identity snapshot. Supersedes outstanding reads.
#[derive(Message)]
#[rtype(result = "()")]
pub struct IdentityUpdated(pub IdentityState);

#[derive(Message)]
#[rtype(result = "()")]
pub struct WalletStatusChanged(pub WalletConnection);

/// Re-read auth session and session key for the current wallet
#[derive(Message)]
#[rtype(result = "()")]
pub struct RefreshIdentity;

// Queries

#[derive(Message)]
#[rtype(result = "GateView")]
pub struct GetGateView;

#[derive(Message)]
#[rtype(result = "IdentityState")]
pub struct GetIdentity;

#[derive(Message)]
#[rtype(result = "Evaluation")]
pub struct Evaluate {
    pub steps: OnboardingSteps,
}

#[derive(Message)]
#[rtype(result = "watch::Receiver<GateView>")]
pub struct Subscribe;

/// Dismiss any active request and stop the coordinator
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Single-active-request onboarding state machine
pub struct OnboardingCoordinator {
    phase: GatePhase,
    active: Option<ActiveRequest>,
    identity: IdentityState,
    settle_delay: Duration,
    settle_timer: Option<SpawnHandle>,
    retry: RetryPolicy,
    auth_query: Option<Arc<dyn AuthSessionQuery>>,
    session_keys: Option<Arc<dyn SessionKeyQuery>>,
    /// Bumped on every refresh; reads from older generations are dropped
    generation: u64,
    view: watch::Sender<GateView>,
}

impl OnboardingCoordinator {
    pub fn new(settle_delay: Duration) -> Self {
        let (view, _) = watch::channel(GateView::idle());
        Self {
            phase: GatePhase::Idle,
            active: None,
            identity: IdentityState::default(),
            settle_delay,
            settle_timer: None,
            retry: RetryPolicy::default(),
            auth_query: None,
            session_keys: None,
            generation: 0,
            view,
        }
    }

    pub fn from_config(config: &OnboardingConfig) -> Self {
        Self::new(config.settle_delay()).with_retry(RetryPolicy::from(&config.retry))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_auth_query(mut self, query: Arc<dyn AuthSessionQuery>) -> Self {
        self.auth_query = Some(query);
        self
    }

    pub fn with_session_key_query(mut self, query: Arc<dyn SessionKeyQuery>) -> Self {
        self.session_keys = Some(query);
        self
    }

    pub fn with_identity(mut self, identity: IdentityState) -> Self {
        self.identity = identity;
        self
    }

    /// Start the coordinator and register it. Replaces any registered one.
    pub fn init(self, registry: &CoordinatorRegistry) -> Addr<Self> {
        let addr = self.start();
        if let Some(previous) = registry.register(addr.clone()) {
            tracing::warn!("Replacing a registered onboarding coordinator");
            previous.do_send(Shutdown);
        }
        addr
    }

    /// Unregister and stop the coordinator, dismissing any active request
    pub async fn teardown(registry: &CoordinatorRegistry) -> Result<(), GateError> {
        let addr = registry.unregister().ok_or(GateError::NotRegistered)?;
        addr.send(Shutdown).await?;
        Ok(())
    }

    fn is_ready(&self, steps: &OnboardingSteps) -> bool {
        evaluate(steps, &self.identity).ready
    }

    fn view(&self) -> GateView {
        GateView {
            phase: self.phase,
            current_request: self.active.as_ref().map(|req| RequestView {
                id: req.id,
                steps: req.steps,
            }),
            is_open: self.phase != GatePhase::Idle,
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.view());
    }

    fn cancel_settle(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.settle_timer.take() {
            ctx.cancel_future(handle);
        }
    }

    /// Activate a request, replacing whatever was active
    fn open(&mut self, request: ActiveRequest, ctx: &mut Context<Self>) -> Uuid {
        self.cancel_settle(ctx);
        if let Some(previous) = self.active.take() {
            tracing::warn!("Onboarding request {} replaced by {}", previous.id, request.id);
            previous.resolve(OnboardingOutcome::Replaced);
        }

        let id = request.id;
        tracing::info!("Onboarding gate opened ({}): {}", id, request.steps);
        self.active = Some(request);
        self.phase = GatePhase::Open;
        self.publish();
        id
    }

    fn finish(&mut self, outcome: OnboardingOutcome, ctx: &mut Context<Self>) {
        self.cancel_settle(ctx);
        if let Some(request) = self.active.take() {
            match outcome {
                OnboardingOutcome::Completed => tracing::info!("Onboarding request {} completed", request.id),
                _ => tracing::info!("Onboarding request {} ended: {:?}", request.id, outcome),
            }
            request.resolve(outcome);
        }
        self.phase = GatePhase::Idle;
        self.publish();
    }

    /// Re-check the active request after any identity change
    fn reevaluate(&mut self, ctx: &mut Context<Self>) {
        let Some(request) = &self.active else {
            return;
        };
        let id = request.id;
        let ready = self.is_ready(&request.steps);

        match (self.phase, ready) {
            (GatePhase::Open, true) => {
                tracing::debug!("Onboarding request {} satisfied, settling", id);
                self.phase = GatePhase::Completing;
                let handle = ctx.run_later(self.settle_delay, move |act, ctx| {
                    act.settle_timer = None;
                    act.settled(id, ctx);
                });
                self.settle_timer = Some(handle);
                self.publish();
            }
            (GatePhase::Completing, false) => {
                tracing::debug!("Onboarding request {} no longer satisfied", id);
                self.cancel_settle(ctx);
                self.phase = GatePhase::Open;
                self.publish();
            }
            _ => {}
        }
    }

    fn settled(&mut self, id: Uuid, ctx: &mut Context<Self>) {
        let still_current = self.phase == GatePhase::Completing
            && self
                .active
                .as_ref()
                .is_some_and(|req| req.id == id && self.is_ready(&req.steps));

        if still_current {
            self.finish(OnboardingOutcome::Completed, ctx);
        }
    }

    fn refresh_identity(&mut self, ctx: &mut Context<Self>) {
        self.generation += 1;
        let generation = self.generation;

        let Some(address) = self.identity.wallet.address().map(str::to_string) else {
            self.identity.reset_queries();
            return;
        };

        if let Some(query) = self.auth_query.clone() {
            let retry = self.retry.clone();
            self.identity.auth.begin_fetch();
            ctx.spawn(
                async move { retry.execute(|| query.fetch(), IdentityError::is_transient).await }
                    .into_actor(self)
                    .map(move |result, act, ctx| act.auth_settled(generation, result, ctx)),
            );
        }

        if let Some(query) = self.session_keys.clone() {
            let retry = self.retry.clone();
            self.identity.session_key.begin_fetch();
            ctx.spawn(
                async move {
                    retry
                        .execute(|| query.fetch(&address), IdentityError::is_transient)
                        .await
                }
                .into_actor(self)
                .map(move |result, act, ctx| act.session_key_settled(generation, result, ctx)),
            );
        }
    }

    fn accept_read(&self, generation: u64, what: &str) -> bool {
        if generation != self.generation {
            tracing::warn!("Discarding stale {} result (generation {} < {})", what, generation, self.generation);
            return false;
        }
        true
    }

    fn log_read_failure(what: &str, error: &IdentityError) {
        match error {
            IdentityError::Transient(_) => tracing::warn!("{} lookup failed after retries: {}", what, error),
            IdentityError::Unexpected(_) => tracing::error!("{} lookup failed: {}", what, error),
        }
    }

    fn auth_settled(
        &mut self,
        generation: u64,
        result: Result<AuthUserResponse, IdentityError>,
        ctx: &mut Context<Self>,
    ) {
        if !self.accept_read(generation, "auth session") {
            return;
        }
        if let Err(e) = &result {
            Self::log_read_failure("Auth session", e);
        }
        self.identity.auth.settle(result);
        self.reevaluate(ctx);
    }

    fn session_key_settled(&mut self, generation: u64, result: Result<bool, IdentityError>, ctx: &mut Context<Self>) {
        if !self.accept_read(generation, "session key") {
            return;
        }
        if let Err(e) = &result {
            Self::log_read_failure("Session key", e);
        }
        self.identity.session_key.settle(result);
        self.reevaluate(ctx);
    }
}

impl Actor for OnboardingCoordinator {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Onboarding coordinator started (settle delay {:?})", self.settle_delay);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        if self.active.is_some() {
            self.finish(OnboardingOutcome::Dismissed, ctx);
        }
        tracing::info!("Onboarding coordinator stopped");
    }
}

impl Handler<Require> for OnboardingCoordinator {
    type Result = bool;

    fn handle(&mut self, msg: Require, ctx: &mut Self::Context) -> Self::Result {
        if self.is_ready(&msg.steps) {
            return true;
        }
        self.open(ActiveRequest::new(msg.steps), ctx);
        false
    }
}

impl Handler<RequireOnboarding> for OnboardingCoordinator {
    type Result = Option<Uuid>;

    fn handle(&mut self, msg: RequireOnboarding, ctx: &mut Self::Context) -> Self::Result {
        if self.is_ready(&msg.steps) {
            (msg.on_complete)();
            return None;
        }
        let mut request = ActiveRequest::new(msg.steps);
        request.on_complete = Some(msg.on_complete);
        Some(self.open(request, ctx))
    }
}

impl Handler<AwaitOnboarding> for OnboardingCoordinator {
    type Result = MessageResult<AwaitOnboarding>;

    fn handle(&mut self, msg: AwaitOnboarding, ctx: &mut Self::Context) -> Self::Result {
        let (tx, rx) = oneshot::channel();
        if self.is_ready(&msg.steps) {
            let _ = tx.send(OnboardingOutcome::Completed);
        } else {
            let mut request = ActiveRequest::new(msg.steps);
            request.waiters.push(tx);
            self.open(request, ctx);
        }
        MessageResult(rx)
    }
}

impl Handler<Complete> for OnboardingCoordinator {
    type Result = bool;

    fn handle(&mut self, _msg: Complete, ctx: &mut Self::Context) -> Self::Result {
        let satisfied = self.active.as_ref().is_some_and(|req| self.is_ready(&req.steps));
        if !satisfied {
            tracing::debug!("Ignoring completion of an unsatisfied onboarding request");
            return false;
        }
        self.finish(OnboardingOutcome::Completed, ctx);
        true
    }
}

impl Handler<Close> for OnboardingCoordinator {
    type Result = bool;

    fn handle(&mut self, _msg: Close, ctx: &mut Self::Context) -> Self::Result {
        if self.active.is_none() {
            return false;
        }
        self.finish(OnboardingOutcome::Dismissed, ctx);
        true
    }
}

impl Handler<IdentityUpdated> for OnboardingCoordinator {
    type Result = ();

    fn handle(&mut self, msg: IdentityUpdated, ctx: &mut Self::Context) -> Self::Result {
        self.generation += 1;
        self.identity = msg.0;
        self.reevaluate(ctx);
    }
}

impl Handler<WalletStatusChanged> for OnboardingCoordinator {
    type Result = ();

    fn handle(&mut self, msg: WalletStatusChanged, ctx: &mut Self::Context) -> Self::Result {
        if self.identity.wallet == msg.0 {
            return;
        }
        tracing::debug!("Wallet status changed: {:?}", msg.0);
        self.identity.wallet = msg.0;
        self.identity.reset_queries();
        self.refresh_identity(ctx);
        self.reevaluate(ctx);
    }
}

impl Handler<RefreshIdentity> for OnboardingCoordinator {
    type Result = ();

    fn handle(&mut self, _msg: RefreshIdentity, ctx: &mut Self::Context) -> Self::Result {
        self.refresh_identity(ctx);
        self.reevaluate(ctx);
    }
}

impl Handler<GetGateView> for OnboardingCoordinator {
    type Result = MessageResult<GetGateView>;

    fn handle(&mut self, _msg: GetGateView, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.view())
    }
}

impl Handler<GetIdentity> for OnboardingCoordinator {
    type Result = MessageResult<GetIdentity>;

    fn handle(&mut self, _msg: GetIdentity, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.identity.clone())
    }
}

impl Handler<Evaluate> for OnboardingCoordinator {
    type Result = MessageResult<Evaluate>;

    fn handle(&mut self, msg: Evaluate, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(evaluate(&msg.steps, &self.identity))
    }
}

impl Handler<Subscribe> for OnboardingCoordinator {
    type Result = MessageResult<Subscribe>;

    fn handle(&mut self, _msg: Subscribe, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.view.subscribe())
    }
}

impl Handler<Shutdown> for OnboardingCoordinator {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        self.finish(OnboardingOutcome::Dismissed, ctx);
        ctx.stop();
    }
}
