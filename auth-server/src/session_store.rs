// auth-server/src/session_store.rs
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, CookieJar, Key, SameSite};
use actix_web::HttpRequest;
use chrono::{DateTime, Duration, Utc};
use identity_common::Session;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Load and persist the client-held session record.
///
/// Implementations own sealing; handlers only see [`Session`].
pub trait SessionStore: Send + Sync {
    /// Session carried by the request, or an empty one
    fn load(&self, req: &HttpRequest) -> Session;

    /// Seal the session into a cookie for the response
    fn persist(&self, session: &Session) -> Result<Cookie<'static>, SessionError>;

    /// Cookie that removes the session from the client
    fn destroy(&self) -> Cookie<'static>;
}

/// What actually goes inside the sealed cookie. The browser's max-age is
/// advisory, so the record carries its own deadline.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealedSession {
    expires_at: DateTime<Utc>,
    session: Session,
}

/// Session record stored in an encrypted, authenticated cookie
pub struct CookieSessionStore {
    key: Key,
    cookie_name: String,
    max_age_secs: i64,
}

impl CookieSessionStore {
    /// `secret` must be at least 32 bytes; config validation guarantees it.
    pub fn new(secret: &[u8], cookie_name: impl Into<String>, max_age_secs: i64) -> Self {
        Self {
            key: Key::derive_from(secret),
            cookie_name: cookie_name.into(),
            max_age_secs,
        }
    }

    /// Session carried by the request as of `now`
    pub fn load_at(&self, req: &HttpRequest, now: DateTime<Utc>) -> Session {
        let Some(cookie) = req.cookie(&self.cookie_name) else {
            return Session::new();
        };

        match self.open(cookie, now) {
            Ok(session) => session,
            Err(e) => {
                // Tampered, stale key, over age or old format: start over
                tracing::debug!("Discarding session cookie: {}", e);
                Session::new()
            }
        }
    }

    pub fn persist_at(&self, session: &Session, now: DateTime<Utc>) -> Result<Cookie<'static>, SessionError> {
        let sealed = SealedSession {
            expires_at: now + Duration::seconds(self.max_age_secs),
            session: session.clone(),
        };
        let value = serde_json::to_string(&sealed)?;

        let cookie = Cookie::build(self.cookie_name.clone(), value)
            .path("/")
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Strict)
            .max_age(CookieDuration::seconds(self.max_age_secs))
            .finish();

        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(cookie);

        jar.get(&self.cookie_name).cloned().ok_or(SessionError::Seal)
    }

    fn open(&self, cookie: Cookie<'static>, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let mut jar = CookieJar::new();
        jar.add_original(cookie);

        let opened = jar
            .private(&self.key)
            .get(&self.cookie_name)
            .ok_or(SessionError::Unreadable)?;

        let sealed: SealedSession = serde_json::from_str(opened.value())?;
        if sealed.expires_at <= now {
            return Err(SessionError::Expired(sealed.expires_at));
        }

        Ok(sealed.session)
    }
}

impl SessionStore for CookieSessionStore {
    fn load(&self, req: &HttpRequest) -> Session {
        self.load_at(req, Utc::now())
    }

    fn persist(&self, session: &Session) -> Result<Cookie<'static>, SessionError> {
        self.persist_at(session, Utc::now())
    }

    fn destroy(&self) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), "")
            .path("/")
            .max_age(CookieDuration::seconds(0))
            .finish()
    }
}
