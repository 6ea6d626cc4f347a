//! Event bus for republished SDK callbacks
//!
//! Every callback the SDK fires ends up here as an [`EventRecord`]: a type
//! name plus the ordered argument list the SDK passed. Hosts subscribe either
//! to one type or to the wildcard channel, which sees everything.
//!
//! Delivery is synchronous. For one publish, listeners on the event's own
//! channel run first, then wildcard listeners, each in subscription order and
//! each exactly once. Nothing is buffered: a listener added after a publish
//! never sees it.
//!
//! ```rust
//! use rvoip_webrtc_adapter::events::{Channel, EventBus};
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = seen.clone();
//! bus.on_any(move |event| {
//!     sink.lock().unwrap().push(event.event_type.clone());
//!     Ok(())
//! });
//!
//! bus.publish("registered", vec![json!("1001")]).unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec!["registered".to_string()]);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::ListenerFailurePolicy;
use crate::error::{AdapterError, AdapterResult};

/// One published event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Event type, e.g. `registered` or `gateway-error`
    pub event_type: String,
    /// Arguments in the order the SDK passed them
    pub payload: Vec<Value>,
}

impl EventRecord {
    pub fn new(event_type: impl Into<String>, payload: Vec<Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// First payload argument, if any
    pub fn first(&self) -> Option<&Value> {
        self.payload.first()
    }
}

/// Subscription channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Only events of this type
    Named(String),
    /// Every event
    Wildcard,
}

impl Channel {
    /// Channel for one event type
    pub fn named(event_type: impl Into<String>) -> Self {
        Self::Named(event_type.into())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

impl From<&str> for Channel {
    fn from(value: &str) -> Self {
        if value == "*" {
            Self::Wildcard
        } else {
            Self::Named(value.to_string())
        }
    }
}

/// Receiver of bus events
///
/// A returned error is reported to whoever published the event.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EventRecord) -> Result<(), String>;
}

impl<F> EventListener for F
where
    F: Fn(&EventRecord) -> Result<(), String> + Send + Sync,
{
    fn on_event(&self, event: &EventRecord) -> Result<(), String> {
        self(event)
    }
}

/// Handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    channel: Channel,
    listener: Arc<dyn EventListener>,
}

/// Synchronous publish/subscribe multiplexer with a wildcard channel
pub struct EventBus {
    /// Kept in subscription order
    subscriptions: RwLock<Vec<Subscription>>,
    policy: ListenerFailurePolicy,
}

impl EventBus {
    /// Create a fail-fast bus
    pub fn new() -> Self {
        Self::with_policy(ListenerFailurePolicy::FailFast)
    }

    /// Create a bus with an explicit listener failure policy
    pub fn with_policy(policy: ListenerFailurePolicy) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            policy,
        }
    }

    /// Active listener failure policy
    pub fn policy(&self) -> ListenerFailurePolicy {
        self.policy
    }

    /// Add a listener to a channel
    pub fn subscribe(
        &self,
        channel: impl Into<Channel>,
        listener: Arc<dyn EventListener>,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        let channel = channel.into();
        tracing::trace!(subscription = %id, channel = %channel, "Listener subscribed");
        self.subscriptions.write().push(Subscription {
            id,
            channel,
            listener,
        });
        id
    }

    /// Subscribe a closure to one event type
    pub fn on<F>(&self, event_type: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&EventRecord) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribe(Channel::Named(event_type.into()), Arc::new(listener))
    }

    /// Subscribe a closure to the wildcard channel
    pub fn on_any<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&EventRecord) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribe(Channel::Wildcard, Arc::new(listener))
    }

    /// Remove a listener; `false` if it was not subscribed on that channel
    pub fn unsubscribe(&self, channel: impl Into<Channel>, id: SubscriptionId) -> bool {
        let channel = channel.into();
        let mut subscriptions = self.subscriptions.write();
        match subscriptions
            .iter()
            .position(|s| s.id == id && s.channel == channel)
        {
            Some(pos) => {
                subscriptions.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Number of listeners on a channel
    pub fn subscription_count(&self, channel: impl Into<Channel>) -> usize {
        let channel = channel.into();
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.channel == channel)
            .count()
    }

    /// Publish an event to its channel, then to the wildcard channel
    pub fn publish(&self, event_type: impl Into<String>, payload: Vec<Value>) -> AdapterResult<()> {
        self.publish_record(EventRecord::new(event_type, payload))
    }

    /// Publish a prepared record
    pub fn publish_record(&self, event: EventRecord) -> AdapterResult<()> {
        // Snapshot so listeners can touch the bus without deadlocking
        let targets: Vec<Subscription> = {
            let subscriptions = self.subscriptions.read();
            let named = subscriptions
                .iter()
                .filter(|s| {
                    matches!(&s.channel, Channel::Named(name) if *name == event.event_type)
                });
            let wildcard = subscriptions
                .iter()
                .filter(|s| s.channel == Channel::Wildcard);
            named.chain(wildcard).cloned().collect()
        };

        tracing::trace!(
            event_type = %event.event_type,
            listeners = targets.len(),
            "Publishing event"
        );

        let mut failures = Vec::new();
        for subscription in &targets {
            if let Err(reason) = subscription.listener.on_event(&event) {
                match self.policy {
                    ListenerFailurePolicy::FailFast => {
                        return Err(AdapterError::listener(&event.event_type, reason));
                    }
                    ListenerFailurePolicy::Isolate => {
                        tracing::warn!(
                            event_type = %event.event_type,
                            subscription = %subscription.id,
                            %reason,
                            "Listener failed, continuing delivery"
                        );
                        failures.push(reason);
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AdapterError::ListenerFailures {
                event_type: event.event_type,
                failures,
            })
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder(
        log: Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&EventRecord) -> Result<(), String> + Send + Sync + 'static {
        move |event| {
            log.lock().push(format!("{tag}:{}:{}", event.event_type, event.payload.len()));
            Ok(())
        }
    }

    #[test]
    fn test_named_listeners_run_before_wildcard_in_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on_any(recorder(log.clone(), "any1"));
        bus.on("registered", recorder(log.clone(), "named1"));
        bus.on_any(recorder(log.clone(), "any2"));
        bus.on("registered", recorder(log.clone(), "named2"));
        bus.on("calling", recorder(log.clone(), "other"));

        bus.publish("registered", vec![json!("1001"), json!(true)]).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "named1:registered:2",
                "named2:registered:2",
                "any1:registered:2",
                "any2:registered:2",
            ]
        );
    }

    #[test]
    fn test_wildcard_sees_type_and_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        bus.on_any(move |event| {
            *sink.lock() = Some(event.clone());
            Ok(())
        });

        bus.publish("gateway-error", vec![json!({"code": 503})]).unwrap();

        let event = seen.lock().clone().unwrap();
        assert_eq!(event.event_type, "gateway-error");
        assert_eq!(event.first(), Some(&json!({"code": 503})));
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.publish("registered", vec![]).unwrap();
        bus.on("registered", recorder(log.clone(), "late"));
        assert!(log.lock().is_empty());

        bus.publish("registered", vec![]).unwrap();
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_requires_matching_channel() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.on("hangUp", recorder(log.clone(), "h"));

        assert!(!bus.unsubscribe(Channel::Wildcard, id));
        assert_eq!(bus.subscription_count("hangUp"), 1);
        assert!(bus.unsubscribe("hangUp", id));
        assert!(!bus.unsubscribe("hangUp", id));

        bus.publish("hangUp", vec![]).unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_fail_fast_stops_delivery() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("calling", |_: &EventRecord| Err("listener exploded".to_string()));
        bus.on("calling", recorder(log.clone(), "after"));
        bus.on_any(recorder(log.clone(), "any"));

        let err = bus.publish("calling", vec![]).unwrap_err();
        match err {
            AdapterError::Listener { event_type, reason } => {
                assert_eq!(event_type, "calling");
                assert_eq!(reason, "listener exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_isolate_delivers_to_everyone_and_aggregates() {
        let bus = EventBus::with_policy(ListenerFailurePolicy::Isolate);
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.on("calling", |_: &EventRecord| Err("first".to_string()));
        bus.on("calling", recorder(log.clone(), "ok"));
        bus.on_any(|_: &EventRecord| Err("second".to_string()));
        bus.on_any(recorder(log.clone(), "any"));

        let err = bus.publish("calling", vec![]).unwrap_err();
        match err {
            AdapterError::ListenerFailures { event_type, failures } => {
                assert_eq!(event_type, "calling");
                assert_eq!(failures, vec!["first".to_string(), "second".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*log.lock(), vec!["ok:calling:0", "any:calling:0"]);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(Mutex::new(0));
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let (bus2, count2, slot2) = (bus.clone(), count.clone(), slot.clone());
        let id = bus.on("missedCall", move |_| {
            *count2.lock() += 1;
            if let Some(id) = *slot2.lock() {
                bus2.unsubscribe("missedCall", id);
            }
            Ok(())
        });
        *slot.lock() = Some(id);

        bus.publish("missedCall", vec![]).unwrap();
        bus.publish("missedCall", vec![]).unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!(Channel::from("*"), Channel::Wildcard);
        assert_eq!(Channel::from("DTMF"), Channel::named("DTMF"));
        assert_eq!(Channel::Wildcard.to_string(), "*");
    }
}
