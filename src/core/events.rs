// src/core/events.rs — In-process pub/sub for internal cross-plugin events
//
// Handlers for an event type run one after another, in subscription order.
// Dispatch works on a snapshot of the subscriber list, so a handler may
// subscribe new listeners without affecting the round in progress.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// A subscribed handler: receives the event type and payload.
pub type EventHandler =
    Arc<dyn Fn(String, Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Default)]
pub struct EventRouter {
    subscribers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `event_type`. Safe to call from any task,
    /// including from inside a running handler.
    pub fn subscribe<F, Fut>(&self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |event_type, payload| {
            Box::pin(handler(event_type, payload))
        });
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers
            .entry(event_type.into())
            .or_default()
            .push(handler);
    }

    /// Invoke every handler for `event_type` sequentially. The first failing
    /// handler aborts the round and its error is returned to the caller.
    /// No subscribers is a no-op.
    pub async fn dispatch(&self, event_type: &str, payload: Value) -> anyhow::Result<()> {
        let listeners = self.snapshot(event_type);
        if listeners.is_empty() {
            tracing::trace!(event_type, "No subscribers for internal event");
            return Ok(());
        }

        tracing::debug!(
            event_type,
            listeners = listeners.len(),
            "Dispatching internal event"
        );
        for (index, handler) in listeners.iter().enumerate() {
            handler(event_type.to_string(), payload.clone())
                .await
                .map_err(|e| {
                    e.context(format!(
                        "handler #{index} for internal event '{event_type}' failed"
                    ))
                })?;
        }
        Ok(())
    }

    /// Number of handlers currently subscribed to `event_type`.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.snapshot(event_type).len()
    }

    fn snapshot(&self, event_type: &str) -> Vec<EventHandler> {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.get(event_type).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type CallLog = Arc<Mutex<Vec<String>>>;

    fn recorder(
        log: &CallLog,
        name: &'static str,
    ) -> impl Fn(String, Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static
    {
        let log = log.clone();
        move |_event, payload| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("{name}:{payload}"));
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_dispatch_runs_handlers_in_subscription_order() {
        let router = EventRouter::new();
        let log: CallLog = Arc::default();
        router.subscribe("greeted", recorder(&log, "h1"));
        router.subscribe("greeted", recorder(&log, "h2"));
        router.subscribe("greeted", recorder(&log, "h3"));

        router
            .dispatch("greeted", json!({"user": "U1"}))
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                r#"h1:{"user":"U1"}"#.to_string(),
                r#"h2:{"user":"U1"}"#.to_string(),
                r#"h3:{"user":"U1"}"#.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatch_without_subscribers_is_noop() {
        let router = EventRouter::new();
        router.dispatch("nobody-listens", json!({})).await.unwrap();
        assert_eq!(router.subscriber_count("nobody-listens"), 0);
    }

    #[tokio::test]
    async fn test_dispatch_only_reaches_matching_type() {
        let router = EventRouter::new();
        let log: CallLog = Arc::default();
        router.subscribe("a", recorder(&log, "a"));
        router.subscribe("b", recorder(&log, "b"));

        router.dispatch("b", json!(1)).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:1".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_handler_stops_the_round() {
        let router = EventRouter::new();
        let log: CallLog = Arc::default();
        router.subscribe("x", recorder(&log, "first"));
        router.subscribe("x", |_, _| async { Err(anyhow::anyhow!("boom")) });
        router.subscribe("x", recorder(&log, "never"));

        let err = router.dispatch("x", json!(null)).await.unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
        assert_eq!(*log.lock().unwrap(), vec!["first:null".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_reaches_every_handler() {
        let router = Arc::new(EventRouter::new());
        let log: CallLog = Arc::default();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let router = router.clone();
            let log = log.clone();
            tasks.spawn(async move {
                router.subscribe("greeted", move |_, _| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push(format!("h{i}"));
                        Ok(())
                    }
                });
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
        assert_eq!(router.subscriber_count("greeted"), 16);

        router.dispatch("greeted", json!({})).await.unwrap();
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        let mut expected: Vec<String> = (0..16).map(|i| format!("h{i}")).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_subscribe_during_dispatch_waits_for_next_round() {
        let router = Arc::new(EventRouter::new());
        let log: CallLog = Arc::default();

        let inner_router = router.clone();
        let inner_log = log.clone();
        router.subscribe("tick", move |_, _| {
            let router = inner_router.clone();
            let log = inner_log.clone();
            async move {
                log.lock().unwrap().push("outer".into());
                let late_log = log.clone();
                router.subscribe("tick", move |_, _| {
                    let log = late_log.clone();
                    async move {
                        log.lock().unwrap().push("late".into());
                        Ok(())
                    }
                });
                Ok(())
            }
        });

        router.dispatch("tick", json!({})).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["outer".to_string()]);
        assert_eq!(router.subscriber_count("tick"), 2);

        log.lock().unwrap().clear();
        router.dispatch("tick", json!({})).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer".to_string(), "late".to_string()]
        );
    }
}
