use super::{DecodedClaims, SubjectId, TokenKind};
use serde::Deserialize;
use std::fmt;

/// The two persisted credential slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    Access,
    Refresh,
}

impl CredentialSlot {
    pub const ALL: [CredentialSlot; 2] = [CredentialSlot::Access, CredentialSlot::Refresh];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSlot::Access => "access",
            CredentialSlot::Refresh => "refresh",
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            CredentialSlot::Access => TokenKind::Access,
            CredentialSlot::Refresh => TokenKind::Refresh,
        }
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token pair produced by an interactive login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginTokens {
    #[serde(rename = "access_token", default)]
    pub access_raw: Option<String>,
    #[serde(rename = "refresh_token")]
    pub refresh_raw: String,
}

/// Session state changes announced by the auth gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoginPromptShown,
    LoginPromptClosed { success: bool },
    UserChanged(Option<DecodedClaims>),
    AccessRenewed { subject: SubjectId },
    SessionCleared,
}
