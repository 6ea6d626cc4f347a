//! # WebRTC Adapter - Softphone SDK integration layer
//!
//! This crate lets a host application drive a third-party browser softphone
//! SDK without caring when the SDK script finishes loading or how its
//! callbacks are shaped. It provides:
//!
//! - **script**: once-only loading of the externally hosted SDK script
//! - **coordinator**: the lifecycle state machine (load → session start → ready/error)
//! - **events**: one uniform event stream for the SDK's many callbacks
//! - **actions**: a small call-control facade (dial, hold, mute, hang up, ...)
//!   that only exists once the session is ready
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rvoip_webrtc_adapter::{AdapterConfig, LifecycleCoordinator, MediaSinks};
//! use rvoip_webrtc_adapter::sdk::SoftphoneSdk;
//! use rvoip_webrtc_adapter::script::ResourceFetcher;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     sdk: Arc<dyn SoftphoneSdk>,
//! #     fetcher: Arc<dyn ResourceFetcher>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let media = MediaSinks::new();
//! media.local.attach("audio#local");
//! media.remote.attach("audio#remote");
//!
//! let adapter = LifecycleCoordinator::new(
//!     AdapterConfig::new().with_api_key("my-key"),
//!     sdk,
//!     fetcher,
//!     media,
//! )?;
//!
//! let events = adapter.events();
//! events.on("incomingCall", |event| {
//!     println!("call from {:?}", event.first());
//!     Ok(())
//! });
//!
//! adapter.mount().await?;
//!
//! // Later, once the `success` event has fired
//! if let Some(actions) = adapter.actions() {
//!     actions.dial(vec![json!("1001")])?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Events
//!
//! Session callbacks are republished under their own names (`registered`,
//! `incomingCall`, `hangUp`, ...). Gateway callbacks get a `gateway-` prefix
//! (`gateway-error`, `gateway-closed`). The coordinator adds two synthetic
//! events: `success` when the session becomes ready and `fail` when it fails.

pub mod actions;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod media;
pub mod protocol;
pub mod render;
pub mod script;
pub mod sdk;

// Re-export main types
pub use actions::{ActionFacade, ActionSet};
pub use crate::config::{AdapterConfig, ListenerFailurePolicy, PostReadyErrorPolicy};
pub use coordinator::{LifecycleCoordinator, LifecycleState};
pub use error::{AdapterError, AdapterResult, SdkError};
pub use events::{Channel, EventBus, EventRecord, SubscriptionId};
pub use media::{MediaSinkRef, MediaSinks, SinkRole};
pub use protocol::{Action, ProtocolRevision};
pub use render::{ReadySurface, RenderDecision};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
