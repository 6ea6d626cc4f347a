//! What the host should render for a given lifecycle state

use std::sync::Arc;

use crate::actions::ActionFacade;
use crate::config::AdapterConfig;
use crate::coordinator::LifecycleState;
use crate::events::EventBus;
use crate::media::MediaSinks;

/// Everything the wrapped content receives once the session is ready
#[derive(Debug, Clone)]
pub struct ReadySurface {
    /// Call-control operations
    pub actions: Arc<ActionFacade>,
    /// Republished SDK events
    pub events: Arc<EventBus>,
    /// Local and remote audio sinks
    pub media: MediaSinks,
}

/// Rendering decision
#[derive(Debug, Clone)]
pub enum RenderDecision {
    /// Script or session still starting
    Loading { placeholder: Option<String> },
    /// Script or session failed
    Error { placeholder: Option<String> },
    /// Render the wrapped content with the ready surface injected
    Ready(ReadySurface),
}

impl RenderDecision {
    /// Pure function of the state; `surface` is only used when ready
    pub fn decide(
        state: LifecycleState,
        surface: Option<ReadySurface>,
        config: &AdapterConfig,
    ) -> Self {
        match (state, surface) {
            (LifecycleState::ScriptError | LifecycleState::SessionError, _) => Self::Error {
                placeholder: config.error_component.clone(),
            },
            (LifecycleState::SessionReady, Some(surface)) => Self::Ready(surface),
            _ => Self::Loading {
                placeholder: config.loading_component.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
