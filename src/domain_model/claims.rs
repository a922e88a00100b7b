use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub i64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SubjectId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(SubjectId)
    }
}

/// Claims carried by a credential, immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedClaims {
    pub kind: TokenKind,
    pub expires_at_ms: i64,
    pub subject_id: SubjectId,
    is_admin: bool,
}

impl DecodedClaims {
    pub fn new(kind: TokenKind, expires_at_ms: i64, subject_id: SubjectId, is_admin: bool) -> Self {
        Self {
            kind,
            expires_at_ms,
            subject_id,
            is_admin,
        }
    }

    /// Admin capability is only ever granted by access claims.
    pub fn is_admin(&self) -> bool {
        self.kind == TokenKind::Access && self.is_admin
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at_ms).single()
    }

    pub fn is_expired_at(&self, now_ms: i64, leniency: Duration) -> bool {
        let leniency_ms = i64::try_from(leniency.as_millis()).unwrap_or(i64::MAX);
        self.expires_at_ms.saturating_add(leniency_ms) < now_ms
    }

    pub fn is_expired(&self, leniency: Duration) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis(), leniency)
    }
}

/// A raw credential string together with its decoded claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub raw: String,
    pub claims: DecodedClaims,
}
