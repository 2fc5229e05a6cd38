// auth-server/src/auth/message.rs
use actix_web::cookie::time::OffsetDateTime;
use chrono::{DateTime, Utc};

use super::signature::Address;
use crate::error::AuthError;

/// A parsed EIP-4361 challenge, kept next to the exact text the wallet signed
#[derive(Debug, Clone)]
pub struct SiweMessage {
    raw: String,
    inner: siwe::Message,
}

impl SiweMessage {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let inner = raw
            .parse::<siwe::Message>()
            .map_err(|e| AuthError::MalformedMessage(e.to_string()))?;

        Ok(Self { raw: raw.to_string(), inner })
    }

    /// Text as received. Signatures are checked against this, not a re-rendering.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn address(&self) -> Address {
        self.inner.address
    }

    pub fn chain_id(&self) -> u64 {
        self.inner.chain_id
    }

    pub fn nonce(&self) -> &str {
        &self.inner.nonce
    }

    pub fn domain(&self) -> String {
        self.inner.domain.to_string()
    }

    pub fn expiration_time(&self) -> Option<String> {
        self.inner.expiration_time.as_ref().map(|t| t.to_string())
    }

    pub fn matches_domain(&self, expected: &str) -> bool {
        self.domain().eq_ignore_ascii_case(expected)
    }

    /// Whether `now` falls inside the message's `Not Before` / `Expiration Time` window
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let now = now
            .timestamp_nanos_opt()
            .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).ok());

        match now {
            Some(now) => self.inner.valid_at(&now),
            None => false,
        }
    }
}

/// Render a SIWE message the way wallets present it
#[derive(Debug, Clone)]
pub struct SiweMessageBuilder {
    pub domain: String,
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
    pub expiration_time: Option<String>,
    pub not_before: Option<String>,
}

impl SiweMessageBuilder {
    pub fn build(&self) -> String {
        let mut out = format!(
            "{} wants you to sign in with your Ethereum account:\n{}\n\n",
            self.domain, self.address
        );
        if let Some(statement) = &self.statement {
            out.push_str(statement);
            out.push('\n');
        }
        out.push_str(&format!(
            "\nURI: {}\nVersion: 1\nChain ID: {}\nNonce: {}\nIssued At: {}",
            self.uri, self.chain_id, self.nonce, self.issued_at
        ));
        if let Some(expiration_time) = &self.expiration_time {
            out.push_str(&format!("\nExpiration Time: {}", expiration_time));
        }
        if let Some(not_before) = &self.not_before {
            out.push_str(&format!("\nNot Before: {}", not_before));
        }
        out
    }
}
