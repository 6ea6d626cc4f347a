//! Protocol revision tables
//!
//! The vendor SDK added and renamed callbacks and actions between releases.
//! Everything revision specific lives here as plain name tables so the
//! coordinator, the bus and the facade never hard-code a callback list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Name of the callback the SDK uses to report success, in both groups
pub const SUCCESS_CALLBACK: &str = "success";

/// Name of the callback the SDK uses to report errors, in both groups
pub const ERROR_CALLBACK: &str = "error";

/// Synthetic event published once the session is ready
pub const SUCCESS_EVENT: &str = "success";

/// Synthetic event published when the session fails
pub const FAIL_EVENT: &str = "fail";

/// Prefix applied to republished gateway callbacks
pub const GATEWAY_EVENT_PREFIX: &str = "gateway-";

/// SDK protocol revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolRevision {
    /// First published SDK (`v1` script)
    V1,
    /// Current SDK
    #[default]
    V2,
}

impl ProtocolRevision {
    /// Callbacks registered in the gateway group
    pub fn gateway_callbacks(self) -> &'static [&'static str] {
        match self {
            Self::V1 => &["closed", "error", "success"],
            Self::V2 => &["closed", "error", "success", "disconnect", "reconnect"],
        }
    }

    /// Callbacks registered in the session group
    pub fn session_callbacks(self) -> &'static [&'static str] {
        match self {
            Self::V1 => &[
                "registering",
                "registered",
                "registrationFailed",
                "calling",
                "incomingCall",
                "earlyMedia",
                "acceptedCall",
                "missedCall",
                "hangingUp",
                "hangup",
                "webRTCState",
                "DTMF",
                "isReceivingMedia",
                "cleanup",
                "success",
                "error",
            ],
            Self::V2 => &[
                "registering",
                "registered",
                "registrationFailed",
                "unregistering",
                "unregistered",
                "calling",
                "incomingCall",
                "earlyMedia",
                "acceptedCall",
                "missedCall",
                "hangingUp",
                "hangUp",
                "stateChanged",
                "DTMF",
                "isReceivingMedia",
                "cleanUp",
                "success",
                "error",
            ],
        }
    }

    /// Actions the session handler exposes
    pub fn actions(self) -> &'static [Action] {
        use Action::*;
        match self {
            Self::V1 => &[
                Register, Unregister, Call, Dial, Hold, Unhold, Accept, Decline, Mute, Unmute,
                HangUp,
            ],
            Self::V2 => &[
                Register, Refresh, Unregister, Dial, Hold, Unhold, Mute, Unmute, HangUp, SendDtmf,
                SetDevices,
            ],
        }
    }

    /// Whether this revision carries `action`
    pub fn supports(self, action: Action) -> bool {
        self.actions().contains(&action)
    }

    /// Resolve a handler capability name for this revision
    pub fn action_by_name(self, name: &str) -> Option<Action> {
        self.actions()
            .iter()
            .copied()
            .find(|action| action.wire_name(self) == name)
    }
}

impl fmt::Display for ProtocolRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for ProtocolRevision {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            other => Err(AdapterError::config(format!("unknown protocol revision '{other}'"))),
        }
    }
}

/// Which callback group a callback belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackScope {
    /// Signaling transport lifecycle (connect/close/error)
    Gateway,
    /// Telephony session events
    Session,
}

impl CallbackScope {
    /// Event name a callback is republished under
    pub fn event_name(self, callback: &str) -> String {
        match self {
            Self::Gateway => format!("{GATEWAY_EVENT_PREFIX}{callback}"),
            Self::Session => callback.to_string(),
        }
    }
}

impl fmt::Display for CallbackScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gateway => write!(f, "gateway"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Call-control operation forwarded to the session handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Register,
    Refresh,
    Unregister,
    /// v1 only
    Call,
    Dial,
    Hold,
    Unhold,
    /// v1 only
    Accept,
    /// v1 only
    Decline,
    Mute,
    Unmute,
    HangUp,
    SendDtmf,
    SetDevices,
}

impl Action {
    /// Canonical name, as used by the current SDK
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Refresh => "refresh",
            Self::Unregister => "unregister",
            Self::Call => "call",
            Self::Dial => "dial",
            Self::Hold => "hold",
            Self::Unhold => "unhold",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::HangUp => "hangUp",
            Self::SendDtmf => "sendDTMF",
            Self::SetDevices => "setDevices",
        }
    }

    /// Capability name on the handler for a given revision
    pub fn wire_name(self, revision: ProtocolRevision) -> &'static str {
        match (self, revision) {
            (Self::HangUp, ProtocolRevision::V1) => "hangup",
            _ => self.name(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
