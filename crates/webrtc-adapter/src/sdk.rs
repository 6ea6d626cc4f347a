//! Boundary to the vendor softphone SDK
//!
//! The SDK exposes one global entry point (`start`) that takes two groups of
//! callbacks and the media sinks, and later hands back a session handler.
//! Here that entry point is the [`SoftphoneSdk`] trait, injected into the
//! coordinator so tests and non-browser hosts can supply their own.
//!
//! Callbacks are not typed one by one. Each group is a table of
//! name → [`Callback`], where a callback receives the SDK's arguments as an
//! ordered list of JSON values. The only callback with a different shape is
//! the session-level success callback, which delivers the handler.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AdapterError, AdapterResult, SdkError};
use crate::media::MediaSinks;
use crate::protocol::{CallbackScope, SUCCESS_CALLBACK};

/// Callback invoked by the SDK with its raw arguments
pub type Callback = Arc<dyn Fn(Vec<Value>) -> AdapterResult<()> + Send + Sync>;

/// Session success callback, receives the session handler
pub type SuccessCallback = Arc<dyn Fn(Arc<dyn SessionHandler>) -> AdapterResult<()> + Send + Sync>;

/// Capability object the SDK hands over once the session is up
///
/// `capability` is the SDK's own method name (`dial`, `hangUp`, ...).
pub trait SessionHandler: Send + Sync {
    fn invoke(&self, capability: &str, args: Vec<Value>) -> Result<Value, SdkError>;
}

/// The SDK's global entry point
pub trait SoftphoneSdk: Send + Sync {
    /// Start the session. The SDK keeps `options` and fires its callbacks
    /// later, possibly from another task.
    fn start(&self, options: StartOptions) -> Result<(), SdkError>;
}

/// Named callback table for one group
#[derive(Clone)]
pub struct CallbackGroup {
    scope: CallbackScope,
    callbacks: Vec<(&'static str, Callback)>,
}

impl CallbackGroup {
    pub fn new(scope: CallbackScope) -> Self {
        Self {
            scope,
            callbacks: Vec::new(),
        }
    }

    /// Register a callback under `name`
    pub fn insert(&mut self, name: &'static str, callback: Callback) {
        self.callbacks.retain(|(existing, _)| *existing != name);
        self.callbacks.push((name, callback));
    }

    pub fn scope(&self) -> CallbackScope {
        self.scope
    }

    /// Registered callback names, in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|(name, _)| *name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.iter().any(|(existing, _)| *existing == name)
    }

    pub fn get(&self, name: &str) -> Option<&Callback> {
        self.callbacks
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, callback)| callback)
    }

    /// Invoke a callback the way the SDK would
    pub fn fire(&self, name: &str, payload: Vec<Value>) -> AdapterResult<()> {
        match self.get(name) {
            Some(callback) => callback(payload),
            None => Err(AdapterError::UnknownCallback {
                scope: self.scope,
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for CallbackGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackGroup")
            .field("scope", &self.scope)
            .field("callbacks", &self.names())
            .finish()
    }
}

/// Session-level callbacks
#[derive(Clone)]
pub struct SessionCallbacks {
    events: CallbackGroup,
    success: SuccessCallback,
}

impl SessionCallbacks {
    pub fn new(events: CallbackGroup, success: SuccessCallback) -> Self {
        Self { events, success }
    }

    /// All session callback names, including `success`
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = self.events.names();
        names.push(SUCCESS_CALLBACK);
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        name == SUCCESS_CALLBACK || self.events.contains(name)
    }

    /// Fire a payload-style session callback
    pub fn fire(&self, name: &str, payload: Vec<Value>) -> AdapterResult<()> {
        if name == SUCCESS_CALLBACK {
            return Err(AdapterError::CallbackMisuse {
                name: name.to_string(),
                reason: "the success callback carries a session handler, use `succeed`".into(),
            });
        }
        self.events.fire(name, payload)
    }

    /// Report that the session is established
    pub fn succeed(&self, handler: Arc<dyn SessionHandler>) -> AdapterResult<()> {
        (self.success)(handler)
    }
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("callbacks", &self.names())
            .finish()
    }
}

/// Everything passed to [`SoftphoneSdk::start`]
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Origin override, if configured
    pub origin: Option<String>,
    /// Transport-level callbacks
    pub gateway: CallbackGroup,
    /// Telephony callbacks
    pub session: SessionCallbacks,
    /// Local and remote audio sinks, already attached
    pub media: MediaSinks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct EchoHandler;

    impl SessionHandler for EchoHandler {
        fn invoke(&self, capability: &str, args: Vec<Value>) -> Result<Value, SdkError> {
            Ok(json!({ "capability": capability, "args": args }))
        }
    }

    #[test]
    fn test_group_fires_registered_callback() {
        let seen: Arc<Mutex<Vec<Vec<Value>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut group = CallbackGroup::new(CallbackScope::Gateway);
        group.insert(
            "closed",
            Arc::new(move |payload: Vec<Value>| -> AdapterResult<()> {
                sink.lock().push(payload);
                Ok(())
            }),
        );

        group.fire("closed", vec![json!(1000)]).unwrap();
        assert_eq!(*seen.lock(), vec![vec![json!(1000)]]);

        let err = group.fire("reconnect", vec![]).unwrap_err();
        assert!(matches!(err, AdapterError::UnknownCallback { scope: CallbackScope::Gateway, .. }));
    }

    #[test]
    fn test_insert_replaces_existing_name() {
        let mut group = CallbackGroup::new(CallbackScope::Session);
        group.insert("calling", Arc::new(|_: Vec<Value>| -> AdapterResult<()> { Ok(()) }));
        group.insert(
            "calling",
            Arc::new(|_: Vec<Value>| -> AdapterResult<()> { Err(AdapterError::session("second")) }),
        );
        assert_eq!(group.names(), vec!["calling"]);
        assert!(group.fire("calling", vec![]).is_err());
    }

    #[test]
    fn test_session_success_goes_through_succeed() {
        let delivered = Arc::new(Mutex::new(None));
        let sink = delivered.clone();
        let callbacks = SessionCallbacks::new(
            CallbackGroup::new(CallbackScope::Session),
            Arc::new(move |handler: Arc<dyn SessionHandler>| -> AdapterResult<()> {
                *sink.lock() = Some(handler.invoke("dial", vec![json!(123)]).unwrap());
                Ok(())
            }),
        );

        assert!(callbacks.contains(SUCCESS_CALLBACK));
        let err = callbacks.fire(SUCCESS_CALLBACK, vec![]).unwrap_err();
        assert!(matches!(err, AdapterError::CallbackMisuse { ref name, .. } if name == "success"));
        assert!(!err.is_terminal());
        assert!(delivered.lock().is_none());

        callbacks.succeed(Arc::new(EchoHandler)).unwrap();
        assert_eq!(
            delivered.lock().clone(),
            Some(json!({ "capability": "dial", "args": [123] }))
        );
    }
}
