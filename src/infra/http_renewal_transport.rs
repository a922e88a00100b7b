use crate::domain_port::{RenewalTransport, RenewedAccess, TransportError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REFRESH_PATH: &str = "/core/auth/refresh";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    token: &'a str,
}

/// `{ success, error, data }` envelope used by every API response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    error: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RefreshData {
    token: String,
}

/// Renews access credentials against the API's refresh endpoint.
pub struct HttpRenewalTransport {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpRenewalTransport {
    pub fn new(base_url: &str, refresh_path: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            http_client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), refresh_path),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl RenewalTransport for HttpRenewalTransport {
    async fn renew(&self, refresh_raw: &str) -> Result<RenewedAccess, TransportError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&RefreshRequest { token: refresh_raw })
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        tracing::trace!(endpoint = %self.endpoint, %status, "renewal response");

        if !status.is_success() {
            return match serde_json::from_str::<Envelope<RefreshData>>(&text) {
                Ok(Envelope {
                    error: Some(error), ..
                }) => Err(TransportError::Rejected(error)),
                _ => Err(TransportError::Status(status.as_u16())),
            };
        }

        let envelope: Envelope<RefreshData> =
            serde_json::from_str(&text).map_err(|e| TransportError::Body(e.to_string()))?;
        if !envelope.success {
            return Err(TransportError::Rejected(
                envelope.error.unwrap_or_else(|| "unspecified".to_owned()),
            ));
        }
        let data = envelope
            .data
            .ok_or_else(|| TransportError::Body("missing data".to_owned()))?;

        Ok(RenewedAccess {
            access_raw: data.token,
        })
    }
}
