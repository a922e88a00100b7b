use crate::domain_model::{DecodedClaims, SubjectId, TokenKind};
use crate::domain_port::{DecodeError, TokenCodec};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LENIENCY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Slack added to `exp` to absorb clock skew with the issuer.
    pub leniency: Duration,
    /// HS256 secret. Without one, tokens are decoded structurally and their
    /// signature is left to the issuer to enforce.
    pub verification_key: Option<Vec<u8>>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            leniency: DEFAULT_LENIENCY,
            verification_key: None,
        }
    }
}

/// Payload of the tokens handed out by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub token_type: TokenKind,
    pub exp: i64, // unix seconds
    pub user_id: i64,
    pub is_admin: bool,
}

impl From<TokenClaims> for DecodedClaims {
    fn from(claims: TokenClaims) -> Self {
        DecodedClaims::new(
            claims.token_type,
            claims.exp.saturating_mul(1000),
            SubjectId(claims.user_id),
            claims.is_admin,
        )
    }
}

pub struct JwtTokenCodec {
    leniency: Duration,
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenCodec {
    pub fn new(cfg: CodecConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        let key = match &cfg.verification_key {
            Some(secret) => DecodingKey::from_secret(secret),
            None => {
                validation.insecure_disable_signature_validation();
                DecodingKey::from_secret(&[])
            }
        };
        // liveness is judged by `is_expired`, with leniency
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        JwtTokenCodec {
            leniency: cfg.leniency,
            key,
            validation,
        }
    }

    pub fn leniency(&self) -> Duration {
        self.leniency
    }

    /// The token payload exactly as issued, before any policy is applied.
    pub fn decode_payload(&self, raw: &str) -> Result<TokenClaims, DecodeError> {
        let data = decode::<TokenClaims>(raw, &self.key, &self.validation)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Ok(data.claims)
    }
}

impl Default for JwtTokenCodec {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl TokenCodec for JwtTokenCodec {
    fn decode(&self, raw: &str) -> Result<DecodedClaims, DecodeError> {
        self.decode_payload(raw).map(DecodedClaims::from)
    }

    fn is_expired(&self, claims: &DecodedClaims) -> bool {
        claims.is_expired_at(Utc::now().timestamp_millis(), self.leniency)
    }
}
