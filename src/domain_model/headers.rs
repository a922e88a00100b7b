use serde::Serialize;

pub const AUTHORIZATION: &str = "Authorization";

/// Request headers proving the caller's identity:
/// `{ "Authorization": "Bearer <access token>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthHeaders {
    #[serde(rename = "Authorization")]
    authorization: String,
}

impl AuthHeaders {
    pub fn bearer(access_raw: &str) -> Self {
        Self {
            authorization: format!("Bearer {access_raw}"),
        }
    }

    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        std::iter::once((AUTHORIZATION, self.authorization.as_str()))
    }
}
