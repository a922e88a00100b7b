use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Priority given to listeners registered without one.
pub const DEFAULT_PRIORITY: i32 = 0;

pub type ListenerFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type Listener<A> = Arc<dyn Fn(A) -> ListenerFuture + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("listener #{id} on `{emitter}` failed: {source:#}")]
    Failed {
        emitter: String,
        id: u64,
        source: anyhow::Error,
    },
    #[error("listener #{id} on `{emitter}` panicked")]
    Panicked { emitter: String, id: u64 },
}

struct Registration<A> {
    id: u64,
    priority: i32,
    callback: Listener<A>,
}

impl<A> Clone for Registration<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            callback: self.callback.clone(),
        }
    }
}

struct EmitterState<A> {
    listeners: Vec<Registration<A>>,
    next_id: u64,
    ordered: bool,
    suspended: bool,
    pending: Option<A>,
}

impl<A> EmitterState<A> {
    /// Listeners scheduled for one delivery. Registration order is kept as the
    /// tie-break, so the stable sort is enough.
    fn scheduled(&self) -> Vec<Registration<A>> {
        let mut scheduled = self.listeners.clone();
        if self.ordered {
            scheduled.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        scheduled
    }
}

/// Typed publish/subscribe primitive.
///
/// Every `trigger` reaches each registered listener once. Until some listener
/// declares a priority, listeners run concurrently; after that, every delivery
/// runs them one at a time in descending priority order (ties in registration
/// order), awaiting each before starting the next.
///
/// While suspended, triggers are coalesced into a single slot holding the most
/// recent payload, which `resume` delivers once.
///
/// Clones are handles to the same emitter.
pub struct OrderedEventEmitter<A> {
    label: Arc<str>,
    state: Arc<Mutex<EmitterState<A>>>,
}

impl<A> Clone for OrderedEventEmitter<A> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            state: self.state.clone(),
        }
    }
}

impl<A> Default for OrderedEventEmitter<A>
where
    A: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> OrderedEventEmitter<A>
where
    A: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_label("emitter")
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self {
            label: Arc::from(label),
            state: Arc::new(Mutex::new(EmitterState {
                listeners: Vec::new(),
                next_id: 0,
                ordered: false,
                suspended: false,
                pending: None,
            })),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a listener at the neutral priority. Does not switch the
    /// emitter to ordered delivery.
    pub fn add_listener<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(callback, None)
    }

    /// Registers a listener with an explicit priority; from now on every
    /// delivery on this emitter is serialized by priority.
    pub fn add_listener_with_priority<F, Fut>(&self, callback: F, priority: i32) -> Subscription
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(callback, Some(priority))
    }

    fn register<F, Fut>(&self, callback: F, priority: Option<i32>) -> Subscription
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: Listener<A> = Arc::new(move |args: A| callback(args).boxed());

        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        if priority.is_some() {
            state.ordered = true;
        }
        state.listeners.push(Registration {
            id,
            priority: priority.unwrap_or(DEFAULT_PRIORITY),
            callback,
        });
        tracing::trace!(emitter = %self.label, id, ?priority, "listener registered");

        let state = Arc::downgrade(&self.state);
        Subscription {
            id,
            remove: Box::new(move |id| remove_listener(&state, id)),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    /// Delivers `args` to every listener and resolves once all of them have
    /// finished. While suspended, only replaces the pending payload.
    pub async fn trigger(&self, args: A) {
        let scheduled = {
            let mut state = self.lock();
            if state.suspended {
                tracing::trace!(emitter = %self.label, "suspended, payload buffered");
                state.pending = Some(args);
                return;
            }
            (state.scheduled(), state.ordered)
        };
        self.deliver(scheduled, args).await;
    }

    pub fn suspend(&self) {
        let mut state = self.lock();
        if !state.suspended {
            tracing::debug!(emitter = %self.label, "delivery suspended");
        }
        state.suspended = true;
    }

    /// Returns to immediate delivery and flushes the buffered payload, if any.
    pub async fn resume(&self) {
        let flushed = {
            let mut state = self.lock();
            if !state.suspended {
                return;
            }
            state.suspended = false;
            tracing::debug!(emitter = %self.label, pending = state.pending.is_some(), "delivery resumed");
            match state.pending.take() {
                Some(args) => Some(((state.scheduled(), state.ordered), args)),
                None => None,
            }
        };
        if let Some((scheduled, args)) = flushed {
            self.deliver(scheduled, args).await;
        }
    }

    async fn deliver(&self, (scheduled, ordered): (Vec<Registration<A>>, bool), args: A) {
        if scheduled.is_empty() {
            return;
        }

        if ordered {
            for registration in scheduled {
                let result = invoke(&self.label, registration, args.clone()).await;
                report(result);
            }
        } else {
            let calls = scheduled
                .into_iter()
                .map(|registration| invoke(&self.label, registration, args.clone()));
            for result in join_all(calls).await {
                report(result);
            }
        }
    }
}

async fn invoke<A>(label: &str, registration: Registration<A>, args: A) -> Result<(), ListenerError> {
    let Registration { id, callback, .. } = registration;
    let call = async move { callback(args).await };
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(ListenerError::Failed {
            emitter: label.to_owned(),
            id,
            source,
        }),
        Err(_) => Err(ListenerError::Panicked {
            emitter: label.to_owned(),
            id,
        }),
    }
}

fn report(result: Result<(), ListenerError>) {
    if let Err(e) = result {
        tracing::error!("unhandled listener error: {e}");
    }
}

fn remove_listener<A>(state: &Weak<Mutex<EmitterState<A>>>, id: u64) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    state.listeners.retain(|registration| registration.id != id);
}

/// Handle returned by listener registration.
///
/// Dropping it keeps the listener registered; call [`Subscription::unsubscribe`]
/// to remove it. Deliveries already in flight are not affected.
pub struct Subscription {
    id: u64,
    remove: Box<dyn Fn(u64) + Send + Sync>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes exactly this registration. Repeated calls are no-ops.
    pub fn unsubscribe(&self) {
        (self.remove)(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    #[tokio::test]
    async fn trigger_reaches_every_listener_once() {
        let emitter = OrderedEventEmitter::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            let _ = emitter.add_listener(move |n| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(n as usize, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        emitter.trigger(2).await;
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn unordered_trigger_waits_for_slow_listeners() {
        let emitter = OrderedEventEmitter::<()>::new();
        let log = recorder();
        let slow = log.clone();
        let _ = emitter.add_listener(move |_| {
            let slow = slow.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                record(&slow, "slow");
                Ok(())
            }
        });

        emitter.trigger(()).await;
        assert_eq!(*log.lock().unwrap(), vec!["slow"]);
    }

    #[tokio::test]
    async fn priorities_order_delivery_with_registration_tie_break() {
        let emitter = OrderedEventEmitter::<()>::new();
        let log = recorder();

        let listen = |name: &'static str, priority: Option<i32>| {
            let log = log.clone();
            let callback = move |_| {
                let log = log.clone();
                async move {
                    // later-starting listeners must not overtake earlier ones
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    record(&log, name);
                    Ok(())
                }
            };
            match priority {
                Some(p) => emitter.add_listener_with_priority(callback, p),
                None => emitter.add_listener(callback),
            }
        };

        let _e = listen("E", None);
        let _d = listen("D", Some(1));
        let _b = listen("B", Some(5));
        let _a = listen("A", Some(10));
        let _c = listen("C", Some(5));
        let _f = listen("F", Some(-3));

        emitter.trigger(()).await;
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[tokio::test]
    async fn suspended_triggers_coalesce_to_last_payload() {
        let emitter = OrderedEventEmitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _ = emitter.add_listener(move |n| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(n);
                Ok(())
            }
        });

        emitter.suspend();
        assert!(emitter.is_suspended());
        for n in 1..=5 {
            emitter.trigger(n).await;
        }
        assert!(seen.lock().unwrap().is_empty());

        emitter.resume().await;
        assert_eq!(*seen.lock().unwrap(), vec![5]);

        // the buffer is consumed by the first resume
        emitter.suspend();
        emitter.resume().await;
        assert_eq!(*seen.lock().unwrap(), vec![5]);

        emitter.trigger(9).await;
        assert_eq!(*seen.lock().unwrap(), vec![5, 9]);
    }

    #[tokio::test]
    async fn resume_without_suspend_is_a_no_op() {
        let emitter = OrderedEventEmitter::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _ = emitter.add_listener(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        emitter.resume().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_exact() {
        let emitter = OrderedEventEmitter::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let mut subscriptions = Vec::new();
        for _ in 0..2 {
            let hits = hits.clone();
            subscriptions.push(emitter.add_listener(move |_| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        }

        subscriptions[0].unsubscribe();
        subscriptions[0].unsubscribe();
        assert_eq!(emitter.listener_count(), 1);

        emitter.trigger(()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_during_delivery_spares_the_current_round() {
        let emitter = OrderedEventEmitter::<()>::new();
        let log = recorder();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let killer_victim = victim.clone();
        let killer_log = log.clone();
        let _ = emitter.add_listener_with_priority(
            move |_| {
                let victim = killer_victim.clone();
                let log = killer_log.clone();
                async move {
                    if let Some(subscription) = victim.lock().unwrap().as_ref() {
                        subscription.unsubscribe();
                    }
                    record(&log, "killer");
                    Ok(())
                }
            },
            10,
        );
        let victim_log = log.clone();
        let subscription = emitter.add_listener_with_priority(
            move |_| {
                let log = victim_log.clone();
                async move {
                    record(&log, "victim");
                    Ok(())
                }
            },
            1,
        );
        *victim.lock().unwrap() = Some(subscription);

        emitter.trigger(()).await;
        emitter.trigger(()).await;
        assert_eq!(*log.lock().unwrap(), vec!["killer", "victim", "killer"]);
    }

    #[tokio::test]
    async fn unsubscribe_during_concurrent_delivery_spares_the_current_round() {
        let emitter = OrderedEventEmitter::<()>::new();
        let killer_hits = Arc::new(AtomicUsize::new(0));
        let victim_hits = Arc::new(AtomicUsize::new(0));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let killer_victim = victim.clone();
        let hits = killer_hits.clone();
        let _ = emitter.add_listener(move |_| {
            let victim = killer_victim.clone();
            let hits = hits.clone();
            async move {
                if let Some(subscription) = victim.lock().unwrap().as_ref() {
                    subscription.unsubscribe();
                }
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let hits = victim_hits.clone();
        let subscription = emitter.add_listener(move |_| {
            let hits = hits.clone();
            async move {
                tokio::task::yield_now().await;
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        *victim.lock().unwrap() = Some(subscription);

        emitter.trigger(()).await;
        assert_eq!(victim_hits.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 1);

        emitter.trigger(()).await;
        assert_eq!(killer_hits.load(Ordering::SeqCst), 2);
        assert_eq!(victim_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_listeners_do_not_stop_siblings() {
        for ordered in [false, true] {
            let emitter = OrderedEventEmitter::<()>::with_label("failures");
            let hits = Arc::new(AtomicUsize::new(0));
            let priority = ordered.then_some(1);

            let _ = emitter.register(|_| async { Err(anyhow::anyhow!("boom")) }, priority);
            let _ = emitter.register(
                |_| async {
                    if true {
                        panic!("listener panic");
                    }
                    Ok(())
                },
                priority,
            );
            let counter = hits.clone();
            let _ = emitter.register(
                move |_| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                priority,
            );

            emitter.trigger(()).await;
            assert_eq!(hits.load(Ordering::SeqCst), 1, "ordered = {ordered}");
        }
    }

    #[tokio::test]
    async fn clones_share_listeners_and_suspension() {
        let emitter = OrderedEventEmitter::<u8>::new();
        let handle = emitter.clone();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _ = handle.add_listener(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        emitter.suspend();
        assert!(handle.is_suspended());
        handle.trigger(1).await;
        emitter.resume().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 1);
    }
}
