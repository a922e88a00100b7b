use super::{OrderedEventEmitter, Subscription};
use dashmap::DashMap;
use std::sync::Arc;

/// Named-channel fan-out for loosely coupled notifications.
///
/// Each name owns a lazily created [`OrderedEventEmitter`]. The bus never
/// declares priorities, so listeners of one name always run concurrently.
pub struct EventBus<P = serde_json::Value> {
    channels: Arc<DashMap<String, OrderedEventEmitter<P>>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
        }
    }
}

impl<P> Default for EventBus<P>
where
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventBus<P>
where
    P: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
        }
    }

    pub fn add_event_listener<F, Fut>(&self, name: &str, callback: F) -> Subscription
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let emitter = self
            .channels
            .entry(name.to_owned())
            .or_insert_with(|| OrderedEventEmitter::with_label(format!("bus:{name}")))
            .clone();
        emitter.add_listener(callback)
    }

    /// Resolves immediately when nobody listens on `name`.
    pub async fn trigger(&self, name: &str, payload: P) {
        let Some(emitter) = self.channels.get(name).map(|entry| entry.value().clone()) else {
            tracing::trace!(event = name, "no listeners");
            return;
        };
        emitter.trigger(payload).await;
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.channels
            .get(name)
            .map(|entry| entry.value().listener_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_without_listeners_resolves() {
        let bus = EventBus::<Value>::new();
        bus.trigger("nobody", json!(null)).await;
        assert_eq!(bus.listener_count("nobody"), 0);
    }

    #[tokio::test]
    async fn listeners_only_hear_their_own_name() {
        let bus = EventBus::<Value>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["auth.logout", "auth.renewed"] {
            let seen = seen.clone();
            let _ = bus.add_event_listener(name, move |payload| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push((name, payload));
                    Ok(())
                }
            });
        }

        bus.trigger("auth.logout", json!({ "reason": "manual" })).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("auth.logout", json!({ "reason": "manual" }))]
        );
    }

    #[tokio::test]
    async fn trigger_waits_for_all_listeners() {
        let bus = EventBus::<Value>::new();
        let done = Arc::new(AtomicUsize::new(0));
        for delay in [15, 5, 10] {
            let done = done.clone();
            let _ = bus.add_event_listener("tick", move |_| {
                let done = done.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }

        bus.trigger("tick", Value::Null).await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unsubscribed_listener_is_skipped() {
        let bus = EventBus::<u8>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let subscription = bus.add_event_listener("tick", move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        assert_eq!(bus.listener_count("tick"), 1);

        subscription.unsubscribe();
        bus.trigger("tick", 1).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count("tick"), 0);
    }
}
