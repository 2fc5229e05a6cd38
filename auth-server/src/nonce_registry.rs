// auth-server/src/nonce_registry.rs
use actix::{Actor, AsyncContext, Context, Handler, Message, MessageResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

// Default nonce TTL in seconds (10 minutes)
const DEFAULT_NONCE_TTL: i64 = 600;

/// Actor message: Record a freshly issued nonce
#[derive(Message)]
#[rtype(result = "()")]
pub struct RecordNonce {
    pub nonce: String,
}

/// Actor message: Consume a nonce. Always removes it, whatever the outcome.
#[derive(Message)]
#[rtype(result = "NonceStatus")]
pub struct ConsumeNonce {
    pub nonce: String,
}

/// Actor message: Refuse an authenticated session until it would have lapsed anyway
#[derive(Message)]
#[rtype(result = "()")]
pub struct RevokeSession {
    pub session_id: String,
    pub until: DateTime<Utc>,
}

/// Actor message: Whether a session id was revoked
#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsSessionRevoked {
    pub session_id: String,
}

/// Actor message: Clean up expired nonces and lapsed revocations
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredNonces;

/// Actor message: Get nonce metrics
#[derive(Message)]
#[rtype(result = "NonceMetrics")]
pub struct GetNonceMetrics;

/// State of a nonce at the moment it was consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceStatus {
    /// Issued by us, within its TTL, never consumed before
    Live,
    /// Issued by us but older than the TTL
    Expired,
    /// Never issued, or already consumed
    Unknown,
}

/// Nonce metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonceMetrics {
    pub issued: usize,
    pub consumed: usize,
    pub expired: usize,
    pub outstanding: usize,
    pub revoked_sessions: usize,
}

/// Server-side ledger of issued nonces and logged-out sessions.
///
/// The session record lives on the client, so a replayed old cookie could
/// bring a used nonce or a logged-out session back. The ledger makes every
/// nonce single-use and every logout final, whichever cookie is presented.
pub struct NonceRegistryActor {
    // Map from nonce to issue time
    nonces: Arc<DashMap<String, DateTime<Utc>>>,
    // Map from revoked session id to the end of that session's maximum age
    revoked: Arc<DashMap<String, DateTime<Utc>>>,
    // Nonce TTL in seconds
    nonce_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
    metrics: NonceMetrics,
}

impl Default for NonceRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceRegistryActor {
    pub fn new() -> Self {
        Self {
            nonces: Arc::new(DashMap::new()),
            revoked: Arc::new(DashMap::new()),
            nonce_ttl: DEFAULT_NONCE_TTL,
            cleanup_interval: 60,
            metrics: NonceMetrics::default(),
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.nonce_ttl = ttl_seconds;
        self
    }

    pub fn with_cleanup_interval(mut self, interval_seconds: u64) -> Self {
        self.cleanup_interval = interval_seconds.max(1);
        self
    }

    fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(issued_at).num_seconds() >= self.nonce_ttl
    }

    /// Remove expired nonces and update metrics
    fn cleanup_nonces(&mut self) -> usize {
        let now = Utc::now();

        let expired: Vec<String> = self
            .nonces
            .iter()
            .filter(|entry| self.is_expired(*entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut expired_count = 0;
        for nonce in expired {
            if self.nonces.remove(&nonce).is_some() {
                expired_count += 1;
            }
        }

        self.metrics.expired += expired_count;
        self.metrics.outstanding = self.nonces.len();

        // A lapsed session is refused by its own age cap
        self.revoked.retain(|_, until| *until > now);
        self.metrics.revoked_sessions = self.revoked.len();

        expired_count
    }
}

impl Actor for NonceRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("NonceRegistryActor started with TTL: {}s", self.nonce_ttl);

        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_nonces();
            if expired_count > 0 {
                tracing::debug!("Cleaned up {} expired nonces", expired_count);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "NonceRegistryActor stopped. {} issued, {} consumed, {} expired",
            self.metrics.issued,
            self.metrics.consumed,
            self.metrics.expired
        );
    }
}

impl Handler<RecordNonce> for NonceRegistryActor {
    type Result = ();

    fn handle(&mut self, msg: RecordNonce, _ctx: &mut Self::Context) -> Self::Result {
        self.nonces.insert(msg.nonce, Utc::now());
        self.metrics.issued += 1;
        self.metrics.outstanding = self.nonces.len();
    }
}

impl Handler<ConsumeNonce> for NonceRegistryActor {
    type Result = MessageResult<ConsumeNonce>;

    fn handle(&mut self, msg: ConsumeNonce, _ctx: &mut Self::Context) -> Self::Result {
        let status = match self.nonces.remove(&msg.nonce) {
            Some((_, issued_at)) if self.is_expired(issued_at, Utc::now()) => {
                self.metrics.expired += 1;
                NonceStatus::Expired
            }
            Some(_) => {
                self.metrics.consumed += 1;
                NonceStatus::Live
            }
            None => NonceStatus::Unknown,
        };
        self.metrics.outstanding = self.nonces.len();

        tracing::trace!("Consumed nonce with status {:?}", status);
        MessageResult(status)
    }
}

impl Handler<RevokeSession> for NonceRegistryActor {
    type Result = ();

    fn handle(&mut self, msg: RevokeSession, _ctx: &mut Self::Context) -> Self::Result {
        self.revoked.insert(msg.session_id, msg.until);
        self.metrics.revoked_sessions = self.revoked.len();
    }
}

impl Handler<IsSessionRevoked> for NonceRegistryActor {
    type Result = bool;

    fn handle(&mut self, msg: IsSessionRevoked, _ctx: &mut Self::Context) -> Self::Result {
        self.revoked.contains_key(&msg.session_id)
    }
}

impl Handler<CleanupExpiredNonces> for NonceRegistryActor {
    type Result = MessageResult<CleanupExpiredNonces>;

    fn handle(&mut self, _msg: CleanupExpiredNonces, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.cleanup_nonces())
    }
}

impl Handler<GetNonceMetrics> for NonceRegistryActor {
    type Result = MessageResult<GetNonceMetrics>;

    fn handle(&mut self, _msg: GetNonceMetrics, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.metrics.clone())
    }
}
