//! Lifecycle coordinator
//!
//! Drives the adapter from script load to a ready session:
//!
//! ```text
//!   Idle ──mount──▶ ScriptLoading ──load failed──▶ ScriptError
//!                        │
//!                     loaded (+ media sinks attached)
//!                        ▼
//!               SessionInitializing ──error / gateway-error──▶ SessionError
//!                        │                                        ▲
//!                  session success                                │
//!                        ▼                                        │
//!                  SessionReady ───── error (Demote policy only) ─┘
//! ```
//!
//! Every SDK callback is republished on the [`EventBus`] under its own name
//! (gateway callbacks with a `gateway-` prefix). Only two callbacks move the
//! state machine: session `success`, which builds the [`ActionFacade`] and
//! publishes `success`, and the `error` callbacks, which publish `fail`.
//!
//! `ScriptError` and `SessionError` are final. A new coordinator is needed to
//! try again.
//!
//! Leaving `SessionReady` revokes the facade, including every copy the host
//! already holds. Dropping the coordinator does the same. SDK callbacks only
//! hold a weak reference, so anything the SDK fires afterwards is ignored.
//! There is no timeout on the script load or on session start.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::actions::{ActionFacade, ActionSet};
use crate::config::{AdapterConfig, PostReadyErrorPolicy};
use crate::error::{AdapterError, AdapterResult};
use crate::events::EventBus;
use crate::media::MediaSinks;
use crate::protocol::{
    CallbackScope, ERROR_CALLBACK, FAIL_EVENT, SUCCESS_CALLBACK, SUCCESS_EVENT,
};
use crate::render::{ReadySurface, RenderDecision};
use crate::script::{ResourceFetcher, ScriptLoader, ScriptTag};
use crate::sdk::{CallbackGroup, SessionCallbacks, SessionHandler, SoftphoneSdk, StartOptions};

/// Adapter lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not mounted yet
    #[default]
    Idle,
    /// Waiting for the SDK script
    ScriptLoading,
    /// The SDK script failed to load
    ScriptError,
    /// Session start called, waiting for the SDK
    SessionInitializing,
    /// Session established, actions available
    SessionReady,
    /// The SDK reported a failure
    SessionError,
}

impl LifecycleState {
    /// No further transitions happen from this state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ScriptError | Self::SessionError)
    }

    pub fn is_ready(self) -> bool {
        self == Self::SessionReady
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ScriptLoading => "script_loading",
            Self::ScriptError => "script_error",
            Self::SessionInitializing => "session_initializing",
            Self::SessionReady => "session_ready",
            Self::SessionError => "session_error",
        };
        f.write_str(name)
    }
}

struct Shared {
    state: LifecycleState,
    /// Present exactly while `state` is `SessionReady`
    facade: Option<Arc<ActionFacade>>,
    session_started: bool,
}

struct Inner {
    config: AdapterConfig,
    sdk: Arc<dyn SoftphoneSdk>,
    loader: ScriptLoader,
    media: MediaSinks,
    bus: Arc<EventBus>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<LifecycleState>,
}

impl Inner {
    fn set_state(&self, shared: &mut Shared, next: LifecycleState) {
        let previous = shared.state;
        shared.state = next;
        if !next.is_ready() {
            if let Some(facade) = shared.facade.take() {
                facade.revoke(next);
            }
        }
        self.state_tx.send_replace(next);
        if next.is_terminal() {
            tracing::error!(from = %previous, to = %next, "Adapter entered terminal state");
        } else {
            tracing::info!(from = %previous, to = %next, "Adapter state changed");
        }
    }

    fn on_callback(
        &self,
        scope: CallbackScope,
        name: &'static str,
        payload: Vec<Value>,
    ) -> AdapterResult<()> {
        let event_type = scope.event_name(name);

        let failed = {
            let mut shared = self.shared.lock();
            if !shared.session_started {
                tracing::warn!(
                    %scope,
                    callback = name,
                    "Callback fired before session start, ignoring"
                );
                return Ok(());
            }

            let mut failed = false;
            if name == ERROR_CALLBACK {
                match shared.state {
                    LifecycleState::SessionInitializing => failed = true,
                    LifecycleState::SessionReady => match self.config.post_ready_errors {
                        PostReadyErrorPolicy::Demote => failed = true,
                        PostReadyErrorPolicy::Informational => {
                            tracing::warn!(%scope, "Error reported after session became ready");
                        }
                    },
                    _ => {}
                }
            }
            if failed {
                self.set_state(&mut shared, LifecycleState::SessionError);
            }
            failed
        };

        tracing::debug!(%event_type, args = payload.len(), "Republishing SDK callback");
        let raw = self.bus.publish(event_type, payload.clone());
        let synthetic = if failed {
            self.bus.publish(FAIL_EVENT, payload)
        } else {
            Ok(())
        };
        merge_listener_results(raw, synthetic)
    }

    fn on_session_success(&self, handler: Arc<dyn SessionHandler>) -> AdapterResult<()> {
        {
            let mut shared = self.shared.lock();
            if shared.state != LifecycleState::SessionInitializing {
                tracing::warn!(state = %shared.state, "Ignoring session success callback");
                return Ok(());
            }
            let actions = ActionSet::new(self.config.protocol);
            shared.facade = Some(Arc::new(ActionFacade::new(handler, actions)));
            self.set_state(&mut shared, LifecycleState::SessionReady);
        }

        self.bus.publish(SUCCESS_EVENT, Vec::new())
    }

    fn start_options(inner: &Arc<Inner>) -> StartOptions {
        let revision = inner.config.protocol;

        let mut gateway = CallbackGroup::new(CallbackScope::Gateway);
        for &name in revision.gateway_callbacks() {
            gateway.insert(name, Self::route(inner, CallbackScope::Gateway, name));
        }

        let mut session = CallbackGroup::new(CallbackScope::Session);
        for &name in revision.session_callbacks() {
            if name != SUCCESS_CALLBACK {
                session.insert(name, Self::route(inner, CallbackScope::Session, name));
            }
        }

        let weak = Arc::downgrade(inner);
        let success = Arc::new(move |handler: Arc<dyn SessionHandler>| -> AdapterResult<()> {
            match weak.upgrade() {
                Some(inner) => inner.on_session_success(handler),
                None => Ok(()),
            }
        });

        StartOptions {
            origin: inner.config.origin.clone(),
            gateway,
            session: SessionCallbacks::new(session, success),
            media: inner.media.clone(),
        }
    }

    fn route(inner: &Arc<Inner>, scope: CallbackScope, name: &'static str) -> crate::sdk::Callback {
        let weak: Weak<Inner> = Arc::downgrade(inner);
        Arc::new(move |payload: Vec<Value>| -> AdapterResult<()> {
            match weak.upgrade() {
                Some(inner) => inner.on_callback(scope, name, payload),
                None => {
                    tracing::debug!(%scope, callback = name, "Adapter gone, dropping callback");
                    Ok(())
                }
            }
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(facade) = self.shared.get_mut().facade.take() {
            facade.revoke(LifecycleState::Idle);
        }
    }
}

/// Combine the raw and synthetic publish results of one callback
///
/// Isolated failures from both publishes end up in one `ListenerFailures`,
/// the ones from the synthetic event prefixed with its type.
fn merge_listener_results(
    raw: AdapterResult<()>,
    synthetic: AdapterResult<()>,
) -> AdapterResult<()> {
    match (raw, synthetic) {
        (Ok(()), synthetic) => synthetic,
        (Err(e), Ok(())) => Err(e),
        (
            Err(AdapterError::ListenerFailures {
                event_type,
                mut failures,
            }),
            Err(AdapterError::ListenerFailures {
                event_type: synthetic_type,
                failures: more,
            }),
        ) => {
            failures.extend(more.into_iter().map(|f| format!("{synthetic_type}: {f}")));
            Err(AdapterError::ListenerFailures {
                event_type,
                failures,
            })
        }
        (Err(e), Err(dropped)) => {
            tracing::warn!(error = %dropped, "Second listener failure for the same callback");
            Err(e)
        }
    }
}

/// Owns the adapter state machine
pub struct LifecycleCoordinator {
    inner: Arc<Inner>,
}

impl LifecycleCoordinator {
    /// Create an unmounted coordinator
    pub fn new(
        config: AdapterConfig,
        sdk: Arc<dyn SoftphoneSdk>,
        fetcher: Arc<dyn ResourceFetcher>,
        media: MediaSinks,
    ) -> AdapterResult<Self> {
        config.validate()?;

        let loader = ScriptLoader::new(ScriptTag::from_config(&config), fetcher);
        let bus = Arc::new(EventBus::with_policy(config.listener_failures));
        let (state_tx, _) = watch::channel(LifecycleState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                sdk,
                loader,
                media,
                bus,
                shared: Mutex::new(Shared {
                    state: LifecycleState::Idle,
                    facade: None,
                    session_started: false,
                }),
                state_tx,
            }),
        })
    }

    /// Load the SDK and start the session
    ///
    /// Returns the state reached when this call finishes: normally
    /// `SessionInitializing`, or `SessionReady` if the SDK reported success
    /// from inside `start`. Script and start failures are returned as errors
    /// after the state has moved to `ScriptError` / `SessionError`.
    pub async fn mount(&self) -> AdapterResult<LifecycleState> {
        let inner = &self.inner;
        {
            let mut shared = inner.shared.lock();
            if shared.state != LifecycleState::Idle {
                return Err(AdapterError::AlreadyMounted {
                    state: shared.state,
                });
            }
            inner.set_state(&mut shared, LifecycleState::ScriptLoading);
        }

        if let Err(e) = inner.loader.load().await {
            let mut shared = inner.shared.lock();
            inner.set_state(&mut shared, LifecycleState::ScriptError);
            return Err(e);
        }

        // Session start needs both audio sinks attached
        if !inner.media.is_resolved() {
            tracing::debug!("Waiting for media sinks before starting session");
        }
        inner.media.resolved().await;

        {
            let mut shared = inner.shared.lock();
            if shared.state != LifecycleState::ScriptLoading || shared.session_started {
                return Err(AdapterError::AlreadyMounted {
                    state: shared.state,
                });
            }
            shared.session_started = true;
            inner.set_state(&mut shared, LifecycleState::SessionInitializing);
        }

        let options = Inner::start_options(inner);
        tracing::info!(
            origin = ?options.origin,
            gateway = ?options.gateway.names(),
            session = ?options.session.names(),
            "Starting SDK session"
        );

        if let Err(e) = inner.sdk.start(options) {
            tracing::error!(error = %e, "SDK refused to start session");
            let moved = {
                let mut shared = inner.shared.lock();
                let moved = shared.state == LifecycleState::SessionInitializing;
                if moved {
                    inner.set_state(&mut shared, LifecycleState::SessionError);
                }
                moved
            };
            if moved {
                if let Err(listener_err) = inner.bus.publish(FAIL_EVENT, vec![e.to_value()]) {
                    tracing::warn!(
                        error = %listener_err,
                        "Listener failed while handling start failure"
                    );
                }
            }
            return Err(AdapterError::StartRefused(e));
        }

        Ok(self.state())
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.inner.shared.lock().state
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.inner.state_tx.subscribe()
    }

    /// Action facade, only while the session is ready
    pub fn actions(&self) -> Option<Arc<ActionFacade>> {
        self.inner.shared.lock().facade.clone()
    }

    /// Action facade or a `NotReady` error
    pub fn require_actions(&self) -> AdapterResult<Arc<ActionFacade>> {
        let shared = self.inner.shared.lock();
        shared
            .facade
            .clone()
            .ok_or(AdapterError::NotReady { state: shared.state })
    }

    /// Event bus carrying republished callbacks
    pub fn events(&self) -> Arc<EventBus> {
        self.inner.bus.clone()
    }

    /// Media sinks handed to the SDK
    pub fn media(&self) -> &MediaSinks {
        &self.inner.media
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    /// Script element requested from the host
    pub fn script_tag(&self) -> &ScriptTag {
        self.inner.loader.tag()
    }

    /// Host-facing surface, once ready
    pub fn surface(&self) -> Option<ReadySurface> {
        self.actions().map(|actions| ReadySurface {
            actions,
            events: self.events(),
            media: self.inner.media.clone(),
        })
    }

    /// What the host should show right now
    pub fn render(&self) -> RenderDecision {
        let (state, facade) = {
            let shared = self.inner.shared.lock();
            (shared.state, shared.facade.clone())
        };
        let surface = facade.map(|actions| ReadySurface {
            actions,
            events: self.events(),
            media: self.inner.media.clone(),
        });
        RenderDecision::decide(state, surface, &self.inner.config)
    }
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("state", &self.state())
            .field("script", &self.inner.loader.tag().src)
            .finish_non_exhaustive()
    }
}
