use crate::domain::{AuthGate, CredentialStore, GateConfig, JwtTokenCodec, TokenClaims};
use crate::domain_model::{AuthEvent, TokenKind};
use crate::event::{EventBus, OrderedEventEmitter};
use crate::infra::{FakeRenewalTransport, MemoryKeyValueStore};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;

pub use crate::infra::FakeRenewal;

pub const SIGNING_KEY: &[u8] = b"test-signing-key";

pub fn mint_claims(claims: &TokenClaims) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(SIGNING_KEY)).unwrap()
}

/// Token of `kind` expiring `expires_in_ms` from now (negative for the past).
pub fn mint(kind: TokenKind, expires_in_ms: i64, user_id: i64, is_admin: bool) -> String {
    let exp_ms = Utc::now().timestamp_millis() + expires_in_ms;
    mint_claims(&TokenClaims {
        token_type: kind,
        exp: exp_ms.div_euclid(1000),
        user_id,
        is_admin,
    })
}

pub struct Fixture {
    pub gate: AuthGate,
    pub store: CredentialStore,
    pub transport: Arc<FakeRenewalTransport>,
}

impl Fixture {
    pub fn new(script: FakeRenewal) -> Self {
        Self::with_config(script, GateConfig::default())
    }

    pub fn with_config(script: FakeRenewal, config: GateConfig) -> Self {
        let store = CredentialStore::new(Arc::new(MemoryKeyValueStore::new()), "test");
        let transport = Arc::new(FakeRenewalTransport::new(script));
        let gate = AuthGate::new(
            store.clone(),
            Arc::new(JwtTokenCodec::default()),
            transport.clone(),
            OrderedEventEmitter::<AuthEvent>::with_label("auth"),
            EventBus::new(),
            config,
        );
        Fixture {
            gate,
            store,
            transport,
        }
    }
}
