//! Error types for the WebRTC adapter
//!
//! Errors fall into three groups:
//!
//! - **Load errors** - the SDK script could not be fetched or executed. Terminal.
//! - **Session errors** - the SDK reported a gateway or session failure, or
//!   refused to start. Terminal for action availability.
//! - **Usage errors** - an action was called before the session was ready, the
//!   adapter was mounted twice, an event listener failed, and so on.
//!
//! Business-level failures reported by the SDK (`registrationFailed`,
//! `missedCall`, ...) are not errors here; they travel through the event bus
//! as ordinary events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::coordinator::LifecycleState;
use crate::protocol::{Action, CallbackScope, ProtocolRevision};

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur in the adapter
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The SDK script failed to fetch or execute
    #[error("Failed to load SDK script from {url}: {reason}")]
    ScriptLoadFailure { url: String, reason: String },

    /// The loader was asked to load a second time
    #[error("SDK script was already requested by this adapter")]
    ScriptAlreadyRequested,

    /// `mount` was called on an adapter that already left `Idle`
    #[error("Adapter already mounted (state: {state})")]
    AlreadyMounted { state: LifecycleState },

    /// Gateway or session failure reported by the SDK
    #[error("Session error: {reason}")]
    Session { reason: String },

    /// Error returned by the vendor SDK itself
    #[error(transparent)]
    Sdk(#[from] SdkError),

    /// The SDK refused to start the session; the adapter is in `SessionError`
    #[error("SDK refused to start the session: {0}")]
    StartRefused(#[source] SdkError),

    /// Operation requires a ready session
    #[error("Session not ready (state: {state})")]
    NotReady { state: LifecycleState },

    /// The active protocol revision does not carry this action
    #[error("Action {action} is not available in protocol {revision}")]
    UnsupportedAction {
        action: Action,
        revision: ProtocolRevision,
    },

    /// No action with this wire name exists
    #[error("Unknown action: {name}")]
    UnknownAction { name: String },

    /// The SDK fired a callback that was never registered
    #[error("Unknown {scope} callback: {name}")]
    UnknownCallback { scope: CallbackScope, name: String },

    /// A callback was fired through the wrong entry point
    #[error("Callback '{name}' misused: {reason}")]
    CallbackMisuse { name: String, reason: String },

    /// An event listener failed during delivery
    #[error("Listener for '{event_type}' failed: {reason}")]
    Listener { event_type: String, reason: String },

    /// One or more listeners failed while delivery continued
    #[error("{} listener(s) for '{event_type}' failed", .failures.len())]
    ListenerFailures {
        event_type: String,
        failures: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AdapterError {
    /// Create a script load failure
    pub fn script_load(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScriptLoadFailure {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a session error
    pub fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
        }
    }

    /// Create a listener error
    pub fn listener(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Listener {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short category label, handy for log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::ScriptLoadFailure { .. } | Self::ScriptAlreadyRequested => "script",
            Self::Session { .. } | Self::Sdk(_) | Self::StartRefused(_) => "session",
            Self::NotReady { .. } | Self::AlreadyMounted { .. } => "state",
            Self::UnsupportedAction { .. } | Self::UnknownAction { .. } => "action",
            Self::UnknownCallback { .. } | Self::CallbackMisuse { .. } => "callback",
            Self::Listener { .. } | Self::ListenerFailures { .. } => "listener",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Whether this error leaves the adapter in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ScriptLoadFailure { .. } | Self::Session { .. } | Self::StartRefused(_)
        )
    }
}

/// Error reported by the vendor SDK
///
/// The SDK hands back loosely shaped error objects; `details` keeps whatever
/// extra fields came with it.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("SDK error{}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
pub struct SdkError {
    /// Vendor error code, if any
    #[serde(default)]
    pub code: Option<String>,
    /// Human readable message
    pub message: String,
    /// Raw extra data
    #[serde(default)]
    pub details: Value,
}

impl SdkError {
    /// Create an SDK error with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            details: Value::Null,
        }
    }

    /// Attach a vendor error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach raw details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// JSON form, as carried in `fail` event payloads
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::String(self.message.clone()))
    }
}
