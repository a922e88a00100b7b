use crate::domain_model::{DecodedClaims, TokenKind};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("expected {expected} token, got {actual}")]
    WrongKind { expected: TokenKind, actual: TokenKind },
}

/// Turns raw credential strings into claims and answers liveness.
pub trait TokenCodec: Send + Sync {
    fn decode(&self, raw: &str) -> Result<DecodedClaims, DecodeError>;

    /// Liveness check using the codec's configured clock-skew leniency.
    fn is_expired(&self, claims: &DecodedClaims) -> bool;

    fn decode_kind(&self, raw: &str, expected: TokenKind) -> Result<DecodedClaims, DecodeError> {
        let claims = self.decode(raw)?;
        if claims.kind != expected {
            return Err(DecodeError::WrongKind {
                expected,
                actual: claims.kind,
            });
        }
        Ok(claims)
    }
}
