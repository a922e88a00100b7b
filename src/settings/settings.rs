use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub transport: Transport,
    pub storage: Storage,
    #[serde(default)]
    pub token: Token,
    #[serde(default)]
    pub login: Login,
    pub log: Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transport {
    pub backend: String, // "fake" or "http"
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "file"
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Clone, Deserialize)]
pub struct Token {
    #[serde(default = "default_leniency_ms")]
    pub leniency_ms: u64,
    #[serde(default)]
    pub verification_secret: Option<String>,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            leniency_ms: default_leniency_ms(),
            verification_secret: None,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("leniency_ms", &self.leniency_ms)
            .field(
                "verification_secret",
                &self.verification_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Login {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_refresh_path() -> String {
    "/core/auth/refresh".to_owned()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_storage_path() -> String {
    "session.json".to_owned()
}

fn default_key_prefix() -> String {
    "session_jwt".to_owned()
}

fn default_leniency_ms() -> u64 {
    1000
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn minimal_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.toml");
        fs::write(
            &path,
            r#"
[api]
base_url = "http://localhost:8000"

[transport]
backend = "http"

[storage]
backend = "memory"

[log]
filter = "warn"
"#,
        )
        .unwrap();

        let settings = parse_settings(path.to_str()).unwrap();
        assert_eq!(settings.api.refresh_path, "/core/auth/refresh");
        assert_eq!(settings.api.timeout_ms, 10_000);
        assert_eq!(settings.storage.key_prefix, "session_jwt");
        assert_eq!(settings.token.leniency_ms, 1000);
        assert_eq!(settings.token.verification_secret, None);
        assert_eq!(settings.login.timeout_secs, None);
    }

    #[test]
    fn debug_output_hides_the_verification_secret() {
        let token = Token {
            leniency_ms: 1000,
            verification_secret: Some("hunter2".to_owned()),
        };
        let printed = format!("{token:?}");
        assert!(!printed.contains("hunter2"), "{printed}");
        assert!(printed.contains("<redacted>"), "{printed}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("does/not/exist.toml")).is_err());
    }
}
