//! Adapter configuration
//!
//! Mirrors the options a host passes when wrapping its component:
//!
//! | option             | effect                                  |
//! |--------------------|-----------------------------------------|
//! | `apiKey`           | becomes the `data-key` script attribute |
//! | `url`              | overrides the default SDK script URL    |
//! | `origin`           | passed through to session start         |
//! | `errorComponent`   | placeholder shown on failure            |
//! | `loadingComponent` | placeholder shown while loading         |
//!
//! plus the behaviour switches `protocol`, `postReadyErrors` and
//! `listenerFailures`.
//!
//! ```rust
//! use rvoip_webrtc_adapter::config::{AdapterConfig, PostReadyErrorPolicy};
//!
//! let config = AdapterConfig::new()
//!     .with_api_key("secret")
//!     .with_origin("https://pbx.example.com")
//!     .with_post_ready_errors(PostReadyErrorPolicy::Demote);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.api_key.as_deref(), Some("secret"));
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};
use crate::protocol::ProtocolRevision;

/// Default SDK script location
pub const DEFAULT_SCRIPT_URL: &str = "https://cdn.teravoz.com.br/webrtc/v1/teravoz-webrtc.js";

/// Environment prefix used by [`AdapterConfig::load`]
pub const ENV_PREFIX: &str = "WEBRTC_ADAPTER";

/// What to do with an error callback that arrives after the session is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostReadyErrorPolicy {
    /// Republish only; the session stays ready
    #[default]
    Informational,
    /// Move to `SessionError` and drop the action facade
    Demote,
}

/// How the event bus treats a failing listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerFailurePolicy {
    /// Stop delivery and return the first failure to the publisher
    #[default]
    FailFast,
    /// Deliver to every listener, then report all failures together
    Isolate,
}

/// Adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Access key exposed to the SDK as `data-key`
    #[serde(alias = "api_key", alias = "apikey")]
    pub api_key: Option<String>,

    /// SDK script URL
    pub url: String,

    /// Origin override handed to session start
    pub origin: Option<String>,

    /// Placeholder identifier shown on failure
    #[serde(alias = "error_component", alias = "errorcomponent")]
    pub error_component: Option<String>,

    /// Placeholder identifier shown while loading
    #[serde(alias = "loading_component", alias = "loadingcomponent")]
    pub loading_component: Option<String>,

    /// SDK protocol revision
    pub protocol: ProtocolRevision,

    /// Handling of error callbacks after readiness
    #[serde(alias = "post_ready_errors", alias = "postreadyerrors")]
    pub post_ready_errors: PostReadyErrorPolicy,

    /// Handling of failing event listeners
    #[serde(alias = "listener_failures", alias = "listenerfailures")]
    pub listener_failures: ListenerFailurePolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: DEFAULT_SCRIPT_URL.to_string(),
            origin: None,
            error_component: None,
            loading_component: None,
            protocol: ProtocolRevision::default(),
            post_ready_errors: PostReadyErrorPolicy::default(),
            listener_failures: ListenerFailurePolicy::default(),
        }
    }
}

impl AdapterConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the script URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the origin override
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set the error placeholder
    pub fn with_error_component(mut self, component: impl Into<String>) -> Self {
        self.error_component = Some(component.into());
        self
    }

    /// Set the loading placeholder
    pub fn with_loading_component(mut self, component: impl Into<String>) -> Self {
        self.loading_component = Some(component.into());
        self
    }

    /// Select the protocol revision
    pub fn with_protocol(mut self, revision: ProtocolRevision) -> Self {
        self.protocol = revision;
        self
    }

    /// Set the post-ready error policy
    pub fn with_post_ready_errors(mut self, policy: PostReadyErrorPolicy) -> Self {
        self.post_ready_errors = policy;
        self
    }

    /// Set the listener failure policy
    pub fn with_listener_failures(mut self, policy: ListenerFailurePolicy) -> Self {
        self.listener_failures = policy;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> AdapterResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| AdapterError::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then an optional TOML file, then `WEBRTC_ADAPTER_*`
    /// environment variables
    pub fn load(path: Option<&Path>) -> AdapterResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(false),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AdapterError::config(e.to_string()))?;

        config.validate()?;
        tracing::debug!(
            url = %config.url,
            protocol = %config.protocol,
            "Loaded adapter configuration"
        );
        Ok(config)
    }

    /// Check the configuration for obvious mistakes
    pub fn validate(&self) -> AdapterResult<()> {
        if self.url.trim().is_empty() {
            return Err(AdapterError::config("script URL is required"));
        }

        let scheme_ok = ["https://", "http://", "//", "/"]
            .iter()
            .any(|prefix| self.url.starts_with(prefix));
        if !scheme_ok {
            return Err(AdapterError::config(format!(
                "script URL must be absolute or root-relative, got '{}'",
                self.url
            )));
        }

        if matches!(self.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            return Err(AdapterError::config("API key must not be blank"));
        }

        Ok(())
    }
}

impl fmt::Display for PostReadyErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Informational => write!(f, "informational"),
            Self::Demote => write!(f, "demote"),
        }
    }
}
