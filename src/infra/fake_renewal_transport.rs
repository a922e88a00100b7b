use crate::domain::{JwtTokenCodec, TokenClaims};
use crate::domain_model::TokenKind;
use crate::domain_port::{RenewalTransport, RenewedAccess, TransportError};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Scripted behaviour of [`FakeRenewalTransport`].
#[derive(Debug, Clone)]
pub enum FakeRenewal {
    /// Mint an access token for the refresh token's subject.
    Issue { signing_key: Vec<u8>, ttl: Duration },
    Fixed(String),
    Fail(String),
}

impl FakeRenewal {
    pub fn issuing(signing_key: &[u8], ttl: Duration) -> Self {
        FakeRenewal::Issue {
            signing_key: signing_key.to_vec(),
            ttl,
        }
    }

    pub fn fixed(access_raw: impl Into<String>) -> Self {
        FakeRenewal::Fixed(access_raw.into())
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        FakeRenewal::Fail(reason.into())
    }
}

// Stand-in for the refresh endpoint, for local runs and tests.
#[derive(Debug)]
pub struct FakeRenewalTransport {
    script: Mutex<FakeRenewal>,
    calls: AtomicUsize,
}

impl FakeRenewalTransport {
    pub fn new(script: FakeRenewal) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_script(&self, script: FakeRenewal) {
        *self.script.lock().unwrap_or_else(PoisonError::into_inner) = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RenewalTransport for FakeRenewalTransport {
    async fn renew(&self, refresh_raw: &str) -> Result<RenewedAccess, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let access_raw = match script {
            FakeRenewal::Issue { signing_key, ttl } => issue_access(refresh_raw, &signing_key, ttl)?,
            FakeRenewal::Fixed(access_raw) => access_raw,
            FakeRenewal::Fail(reason) => return Err(TransportError::Rejected(reason)),
        };
        Ok(RenewedAccess { access_raw })
    }
}

fn issue_access(refresh_raw: &str, signing_key: &[u8], ttl: Duration) -> Result<String, TransportError> {
    let refresh = JwtTokenCodec::default()
        .decode_payload(refresh_raw)
        .map_err(|e| TransportError::Rejected(e.to_string()))?;
    if refresh.token_type != TokenKind::Refresh {
        return Err(TransportError::Rejected("not a refresh token".to_owned()));
    }

    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    let claims = TokenClaims {
        token_type: TokenKind::Access,
        exp: Utc::now().timestamp().saturating_add(ttl),
        user_id: refresh.user_id,
        is_admin: refresh.is_admin,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(signing_key))
        .map_err(|e| TransportError::Body(e.to_string()))
}
