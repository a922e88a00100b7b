use super::{CredentialStore, LoginFlight, LoginWaiter};
use crate::domain_model::{
    AuthEvent, AuthHeaders, Credential, CredentialSlot, DecodedClaims, LoginTokens,
};
use crate::domain_port::{DecodeError, RenewalTransport, StoreError, TokenCodec};
use crate::event::{EventBus, OrderedEventEmitter};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Bus event fired after the session was cleared.
pub const LOGOUT_EVENT: &str = "auth.logout";
/// Bus event fired after an access credential was renewed.
pub const RENEWED_EVENT: &str = "auth.renewed";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct GateConfig {
    /// Upper bound on how long one caller waits for the shared login prompt.
    /// Expiry reads as a failed login for that caller only.
    pub login_timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct SessionState {
    login_prompt_visible: bool,
    pending_login: Option<LoginFlight>,
    current_user: Option<DecodedClaims>,
}

/// Session state machine: hands out access headers, renews them from the
/// refresh credential and, when neither is usable, opens exactly one login
/// prompt no matter how many callers are waiting on it.
///
/// Invariant: `login_prompt_visible` is true iff a login flight is pending.
pub struct AuthGate {
    store: CredentialStore,
    codec: Arc<dyn TokenCodec>,
    transport: Arc<dyn RenewalTransport>,
    events: OrderedEventEmitter<AuthEvent>,
    bus: EventBus,
    config: GateConfig,
    state: Mutex<SessionState>,
}

impl AuthGate {
    pub fn new(
        store: CredentialStore,
        codec: Arc<dyn TokenCodec>,
        transport: Arc<dyn RenewalTransport>,
        events: OrderedEventEmitter<AuthEvent>,
        bus: EventBus,
        config: GateConfig,
    ) -> Self {
        Self {
            store,
            codec,
            transport,
            events,
            bus,
            config,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> &OrderedEventEmitter<AuthEvent> {
        &self.events
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn login_prompt_visible(&self) -> bool {
        self.lock().login_prompt_visible
    }

    pub fn has_pending_login(&self) -> bool {
        self.lock().pending_login.is_some()
    }

    /// Callers currently attached to the pending login, if any.
    pub fn login_waiters(&self) -> usize {
        self.lock()
            .pending_login
            .as_ref()
            .map(LoginFlight::waiting)
            .unwrap_or(0)
    }

    pub fn current_user(&self) -> Option<DecodedClaims> {
        self.lock().current_user.clone()
    }

    /// Loads and decodes one slot. Anything unusable reads as absent.
    fn live_credential(&self, slot: CredentialSlot) -> Option<Credential> {
        let raw = match self.store.load(slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%slot, "failed to load credential: {e}");
                return None;
            }
        };
        let claims = match self.codec.decode_kind(&raw, slot.kind()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(%slot, "ignoring stored credential: {e}");
                return None;
            }
        };
        if self.codec.is_expired(&claims) {
            tracing::debug!(%slot, expires_at_ms = claims.expires_at_ms, "stored credential expired");
            return None;
        }
        Some(Credential { raw, claims })
    }

    /// Returns `Authorization` headers, renewing the access credential when
    /// needed. `None` means no credential could be obtained; the reason has
    /// already been logged.
    pub async fn get_auth_headers(&self) -> Option<AuthHeaders> {
        if let Some(access) = self.live_credential(CredentialSlot::Access) {
            return Some(AuthHeaders::bearer(&access.raw));
        }

        let refresh = self.resolve_refresh_or_prompt().await?;
        let renewed = match self.transport.renew(&refresh.raw).await {
            Ok(renewed) => renewed,
            Err(e) => {
                tracing::warn!(subject = %refresh.claims.subject_id, "access renewal failed: {e}");
                return None;
            }
        };

        self.adopt_access(&renewed.access_raw).await;
        Some(AuthHeaders::bearer(&renewed.access_raw))
    }

    async fn adopt_access(&self, access_raw: &str) {
        if let Err(e) = self.store.save(CredentialSlot::Access, access_raw) {
            tracing::warn!("failed to persist renewed access credential: {e}");
        }

        let subject = match self.codec.decode_kind(access_raw, CredentialSlot::Access.kind()) {
            Ok(claims) => Some(claims.subject_id),
            Err(e) => {
                tracing::warn!("renewed access credential is not decodable: {e}");
                None
            }
        };
        tracing::debug!(?subject, "access credential renewed");

        if let Some(subject) = subject {
            self.events.trigger(AuthEvent::AccessRenewed { subject }).await;
        }
        self.bus
            .trigger(RENEWED_EVENT, json!({ "subject": subject.map(|s| s.0) }))
            .await;
    }

    /// Returns the live refresh credential, or waits for the one shared login
    /// prompt and checks again once it reports success.
    pub async fn resolve_refresh_or_prompt(&self) -> Option<Credential> {
        if let Some(refresh) = self.live_credential(CredentialSlot::Refresh) {
            return Some(refresh);
        }

        if !self.await_login().await {
            return None;
        }

        let refresh = self.live_credential(CredentialSlot::Refresh);
        if refresh.is_none() {
            tracing::warn!("login reported success but left no live refresh credential");
        }
        refresh
    }

    /// Attaches to the pending login or starts one. The bool tells whether
    /// this call opened the prompt.
    fn join_or_start_login(&self) -> (LoginWaiter, bool) {
        let mut state = self.lock();
        if let Some(flight) = &state.pending_login {
            return (flight.waiter(), false);
        }

        let flight = LoginFlight::new();
        let waiter = flight.waiter();
        state.pending_login = Some(flight);
        state.login_prompt_visible = true;
        tracing::debug!("login prompt opened");
        (waiter, true)
    }

    async fn await_login(&self) -> bool {
        let (waiter, started) = self.join_or_start_login();
        if started {
            self.events.trigger(AuthEvent::LoginPromptShown).await;
        }

        match self.config.login_timeout {
            Some(limit) => match tokio::time::timeout(limit, waiter.outcome()).await {
                Ok(success) => success,
                Err(_) => {
                    tracing::warn!(?limit, "gave up waiting for login");
                    false
                }
            },
            None => waiter.outcome().await,
        }
    }

    /// True once a live refresh credential exists, prompting if necessary.
    /// A successful prompt also reloads the current user.
    pub async fn wait_for_login(&self) -> bool {
        if self.live_credential(CredentialSlot::Refresh).is_some() {
            return true;
        }

        let success = self.await_login().await;
        if success {
            let user = self
                .live_credential(CredentialSlot::Refresh)
                .map(|refresh| refresh.claims);
            self.set_current_user(user).await;
        }
        success
    }

    /// Called by the login UI once per prompt. Without a pending login this
    /// does nothing.
    pub async fn notify_login_complete(&self, success: bool) {
        {
            let mut state = self.lock();
            let Some(flight) = state.pending_login.take() else {
                tracing::debug!(success, "login completion without pending login ignored");
                return;
            };
            state.login_prompt_visible = false;
            flight.complete(success);
        }
        tracing::debug!(success, "login prompt closed");

        self.events
            .trigger(AuthEvent::LoginPromptClosed { success })
            .await;
    }

    /// Stores the credentials produced by an interactive login.
    pub fn save_login(&self, tokens: &LoginTokens) -> Result<(), SessionError> {
        let refresh = self
            .codec
            .decode_kind(&tokens.refresh_raw, CredentialSlot::Refresh.kind())?;
        if let Some(access_raw) = &tokens.access_raw {
            self.codec
                .decode_kind(access_raw, CredentialSlot::Access.kind())?;
        }

        self.store.save(CredentialSlot::Refresh, &tokens.refresh_raw)?;
        match &tokens.access_raw {
            Some(access_raw) => self.store.save(CredentialSlot::Access, access_raw)?,
            None => self.store.clear(CredentialSlot::Access)?,
        }
        tracing::info!(subject = %refresh.subject_id, "login credentials stored");
        Ok(())
    }

    /// Forgets both credentials and the current user. A login prompt that is
    /// already open stays open.
    pub async fn clear_session(&self) {
        if let Err(e) = self.store.clear_all() {
            tracing::warn!("failed to clear stored credentials: {e}");
        }
        let previous = self.lock().current_user.take();
        tracing::info!(had_user = previous.is_some(), "session cleared");

        self.events.trigger(AuthEvent::SessionCleared).await;
        if previous.is_some() {
            self.events.trigger(AuthEvent::UserChanged(None)).await;
        }
        self.bus.trigger(LOGOUT_EVENT, json!({})).await;
    }

    /// Re-resolves the refresh credential, prompting if necessary, and
    /// publishes its claims as the current user.
    pub async fn load_user(&self) -> Option<DecodedClaims> {
        let user = self
            .resolve_refresh_or_prompt()
            .await
            .map(|refresh| refresh.claims);
        self.set_current_user(user.clone()).await;
        user
    }

    async fn set_current_user(&self, user: Option<DecodedClaims>) {
        let changed = {
            let mut state = self.lock();
            let changed = state.current_user != user;
            state.current_user = user.clone();
            changed
        };
        if changed {
            self.events.trigger(AuthEvent::UserChanged(user)).await;
        }
    }

    /// Admin capability, judged from the access credential alone.
    pub async fn require_admin(&self) -> bool {
        if self.get_auth_headers().await.is_none() {
            return false;
        }
        self.live_credential(CredentialSlot::Access)
            .map(|access| access.claims.is_admin())
            .unwrap_or(false)
    }
}
