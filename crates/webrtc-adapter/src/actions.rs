//! Call-control action facade
//!
//! [`ActionFacade`] wraps the session handler the SDK delivers on success.
//! Every method forwards its arguments to the handler capability of the same
//! name and hands back whatever the handler returned. No validation, no
//! reshaping.
//!
//! The coordinator only hands a facade out while the session is ready. Once
//! the session leaves `SessionReady`, or the coordinator is dropped, every
//! copy already given out is revoked and fails with
//! [`AdapterError::NotReady`] without reaching the handler. Hosts get it from
//! [`LifecycleCoordinator::actions`](crate::coordinator::LifecycleCoordinator::actions).

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::coordinator::LifecycleState;
use crate::error::{AdapterError, AdapterResult};
use crate::protocol::{Action, ProtocolRevision};
use crate::sdk::SessionHandler;

/// Immutable action table for one protocol revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSet {
    revision: ProtocolRevision,
}

impl ActionSet {
    pub fn new(revision: ProtocolRevision) -> Self {
        Self { revision }
    }

    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    pub fn actions(&self) -> &'static [Action] {
        self.revision.actions()
    }

    pub fn contains(&self, action: Action) -> bool {
        self.revision.supports(action)
    }
}

/// Forwarding shim over the SDK session handler
#[derive(Clone)]
pub struct ActionFacade {
    handler: Arc<dyn SessionHandler>,
    actions: ActionSet,
    /// State the session moved to when the facade was revoked; shared by clones
    revoked: Arc<Mutex<Option<LifecycleState>>>,
}

impl ActionFacade {
    pub fn new(handler: Arc<dyn SessionHandler>, actions: ActionSet) -> Self {
        Self {
            handler,
            actions,
            revoked: Arc::new(Mutex::new(None)),
        }
    }

    pub fn action_set(&self) -> ActionSet {
        self.actions
    }

    /// Stop forwarding; later calls fail with `NotReady { state }`
    pub(crate) fn revoke(&self, state: LifecycleState) {
        let mut revoked = self.revoked.lock();
        if revoked.is_none() {
            tracing::debug!(%state, "Action facade revoked");
            *revoked = Some(state);
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.lock().is_some()
    }

    /// Forward `args` to the handler capability behind `action`
    pub fn invoke(&self, action: Action, args: Vec<Value>) -> AdapterResult<Value> {
        if let Some(state) = *self.revoked.lock() {
            return Err(AdapterError::NotReady { state });
        }

        let revision = self.actions.revision();
        if !self.actions.contains(action) {
            return Err(AdapterError::UnsupportedAction { action, revision });
        }

        let capability = action.wire_name(revision);
        tracing::debug!(%action, capability, args = args.len(), "Forwarding action");
        Ok(self.handler.invoke(capability, args)?)
    }

    /// Forward by handler capability name
    pub fn invoke_by_name(&self, name: &str, args: Vec<Value>) -> AdapterResult<Value> {
        let action = self
            .actions
            .revision()
            .action_by_name(name)
            .ok_or_else(|| AdapterError::UnknownAction {
                name: name.to_string(),
            })?;
        self.invoke(action, args)
    }

    pub fn register(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Register, args)
    }

    pub fn refresh(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Refresh, args)
    }

    pub fn unregister(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Unregister, args)
    }

    /// Place a call (v1 handlers only)
    pub fn call(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Call, args)
    }

    pub fn dial(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Dial, args)
    }

    pub fn hold(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Hold, args)
    }

    pub fn unhold(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Unhold, args)
    }

    /// Answer an incoming call (v1 handlers only)
    pub fn accept(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Accept, args)
    }

    /// Reject an incoming call (v1 handlers only)
    pub fn decline(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Decline, args)
    }

    pub fn mute(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Mute, args)
    }

    pub fn unmute(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::Unmute, args)
    }

    pub fn hang_up(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::HangUp, args)
    }

    pub fn send_dtmf(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::SendDtmf, args)
    }

    pub fn set_devices(&self, args: Vec<Value>) -> AdapterResult<Value> {
        self.invoke(Action::SetDevices, args)
    }
}

impl fmt::Debug for ActionFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFacade")
            .field("revision", &self.actions.revision())
            .field("revoked", &self.is_revoked())
            .finish_non_exhaustive()
    }
}
