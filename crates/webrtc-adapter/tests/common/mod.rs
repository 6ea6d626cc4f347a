//! Test doubles for the SDK, the script fetcher and the session handler

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use rvoip_webrtc_adapter::events::{EventBus, EventRecord};
use rvoip_webrtc_adapter::script::{ResourceFetcher, ScriptTag};
use rvoip_webrtc_adapter::sdk::{SessionHandler, SoftphoneSdk, StartOptions};
use rvoip_webrtc_adapter::{MediaSinks, SdkError};

/// Fetcher that succeeds, fails, or waits for a release
pub struct FakeFetcher {
    pub outcome: Result<(), String>,
    pub gate: Option<Arc<Notify>>,
    pub requests: Mutex<Vec<ScriptTag>>,
}

impl FakeFetcher {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(()),
            gate: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(reason.to_string()),
            gate: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Succeeds once `gate` is notified
    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(()),
            gate: Some(gate),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, tag: &ScriptTag) -> anyhow::Result<()> {
        self.requests.lock().push(tag.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome.clone().map_err(anyhow::Error::msg)
    }
}

/// SDK that records every `start` call and keeps the options
#[derive(Default)]
pub struct FakeSdk {
    pub starts: AtomicUsize,
    pub options: Mutex<Option<StartOptions>>,
    /// Handler to report from inside `start`, like an SDK with a cached session
    pub succeed_immediately: Option<Arc<dyn SessionHandler>>,
    /// Whether both sinks were attached when `start` ran
    pub sinks_resolved_at_start: Mutex<Option<bool>>,
}

impl FakeSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> StartOptions {
        self.options.lock().clone().expect("session was not started")
    }
}

impl SoftphoneSdk for FakeSdk {
    fn start(&self, options: StartOptions) -> Result<(), SdkError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.sinks_resolved_at_start.lock() = Some(options.media.is_resolved());
        *self.options.lock() = Some(options.clone());
        if let Some(handler) = &self.succeed_immediately {
            options
                .session
                .succeed(handler.clone())
                .map_err(|e| SdkError::new(e.to_string()))?;
        }
        Ok(())
    }
}

/// Handler that records calls and answers `{"capability": .., "echo": args}`
#[derive(Default)]
pub struct RecordingHandler {
    pub calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SessionHandler for RecordingHandler {
    fn invoke(&self, capability: &str, args: Vec<Value>) -> Result<Value, SdkError> {
        self.calls.lock().push((capability.to_string(), args.clone()));
        Ok(json!({ "capability": capability, "echo": args }))
    }
}

/// Media sinks with both targets attached
pub fn attached_sinks() -> MediaSinks {
    let media = MediaSinks::new();
    media.local.attach("audio#local");
    media.remote.attach("audio#remote");
    media
}

/// Record every event seen on the wildcard channel
pub fn record_all(bus: &EventBus) -> Arc<Mutex<Vec<EventRecord>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.on_any(move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    seen
}

/// Event types in order
pub fn types(events: &Mutex<Vec<EventRecord>>) -> Vec<String> {
    events.lock().iter().map(|e| e.event_type.clone()).collect()
}
