use crate::domain::{AuthGate, CodecConfig, CredentialStore, GateConfig, JwtTokenCodec};
use crate::domain_model::AuthEvent;
use crate::domain_port::{KeyValueStore, RenewalTransport, TokenCodec};
use crate::event::{EventBus, OrderedEventEmitter};
use crate::infra::{
    FakeRenewal, FakeRenewalTransport, FileKeyValueStore, HttpRenewalTransport,
    MemoryKeyValueStore,
};
use crate::settings::Settings;
use anyhow::bail;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const FAKE_SIGNING_KEY: &str = "fake-signing-key";
const FAKE_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Login UI hears about prompts before any other listener.
pub const LOGIN_UI_PRIORITY: i32 = 100;

/// The one process-wide session, assembled from settings and handed to
/// whoever needs it.
pub struct SessionContext {
    pub gate: Arc<AuthGate>,
    pub events: OrderedEventEmitter<AuthEvent>,
    pub bus: EventBus,
}

impl SessionContext {
    pub fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let kv: Arc<dyn KeyValueStore> = match settings.storage.backend.as_str() {
            "memory" => Arc::new(MemoryKeyValueStore::new()),
            "file" => Arc::new(FileKeyValueStore::open(&settings.storage.path)?),
            other => bail!("unknown storage backend: {other}"),
        };
        let store = CredentialStore::for_endpoint(
            kv,
            &settings.storage.key_prefix,
            &settings.api.base_url,
        );

        let verification_key = settings
            .token
            .verification_secret
            .as_ref()
            .map(|secret| secret.as_bytes().to_vec());
        let codec: Arc<dyn TokenCodec> = Arc::new(JwtTokenCodec::new(CodecConfig {
            leniency: Duration::from_millis(settings.token.leniency_ms),
            verification_key: verification_key.clone(),
        }));

        let transport: Arc<dyn RenewalTransport> = match settings.transport.backend.as_str() {
            "fake" => {
                let signing_key =
                    verification_key.unwrap_or_else(|| FAKE_SIGNING_KEY.as_bytes().to_vec());
                Arc::new(FakeRenewalTransport::new(FakeRenewal::issuing(
                    &signing_key,
                    FAKE_ACCESS_TTL,
                )))
            }
            "http" => Arc::new(HttpRenewalTransport::new(
                &settings.api.base_url,
                &settings.api.refresh_path,
                Duration::from_millis(settings.api.timeout_ms),
            )?),
            other => bail!("unknown transport backend: {other}"),
        };

        let events = OrderedEventEmitter::with_label("auth");
        let bus = EventBus::new();
        let config = GateConfig {
            login_timeout: settings.login.timeout_secs.map(Duration::from_secs),
        };
        let gate = Arc::new(AuthGate::new(
            store,
            codec,
            transport,
            events.clone(),
            bus.clone(),
            config,
        ));
        tracing::debug!(
            storage = %settings.storage.backend,
            transport = %settings.transport.backend,
            "session assembled"
        );

        Ok(Self { gate, events, bus })
    }

    /// Runs the console login UI until `cancel` fires: every prompt reads a
    /// token pair from `input`.
    pub fn spawn_console_login<R>(&self, input: R, cancel: CancellationToken) -> JoinHandle<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (prompt_tx, prompt_rx) = mpsc::channel(1);
        let subscription = self.events.add_listener_with_priority(
            move |event| {
                let prompt_tx = prompt_tx.clone();
                async move {
                    if event == AuthEvent::LoginPromptShown {
                        prompt_tx.send(()).await?;
                    }
                    Ok::<_, anyhow::Error>(())
                }
            },
            LOGIN_UI_PRIORITY,
        );

        let gate = self.gate.clone();
        tokio::spawn(async move {
            super::run_console_login(gate, prompt_rx, input, cancel).await;
            subscription.unsubscribe();
        })
    }
}
