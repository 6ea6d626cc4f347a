//! Media sink handles
//!
//! The SDK plays local and remote audio into two host-owned sinks (audio
//! elements in a browser host). The adapter never creates or destroys them; it
//! only needs to know when both are attached to a live rendering target, since
//! the session must not start before that.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Which side of the call a sink renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkRole {
    Local,
    Remote,
}

impl fmt::Display for SinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Shared handle to one media sink
///
/// Clones observe the same attachment state. The host calls
/// [`attach`](Self::attach) once its rendering target exists.
#[derive(Clone)]
pub struct MediaSinkRef {
    role: SinkRole,
    target: Arc<watch::Sender<Option<String>>>,
}

impl MediaSinkRef {
    /// Create an unattached sink
    pub fn new(role: SinkRole) -> Self {
        let (target, _) = watch::channel(None);
        Self {
            role,
            target: Arc::new(target),
        }
    }

    /// Role of this sink
    pub fn role(&self) -> SinkRole {
        self.role
    }

    /// Attach the sink to a rendering target
    pub fn attach(&self, target: impl Into<String>) {
        let target = target.into();
        tracing::debug!(role = %self.role, %target, "Media sink attached");
        self.target.send_replace(Some(target));
    }

    /// Detach the sink
    pub fn detach(&self) {
        tracing::debug!(role = %self.role, "Media sink detached");
        self.target.send_replace(None);
    }

    /// Current rendering target
    pub fn target(&self) -> Option<String> {
        self.target.borrow().clone()
    }

    /// Whether the sink is attached right now
    pub fn is_resolved(&self) -> bool {
        self.target.borrow().is_some()
    }

    /// Wait until the sink is attached
    pub async fn resolved(&self) -> String {
        let mut rx = self.target.subscribe();
        loop {
            if let Some(target) = rx.borrow_and_update().clone() {
                return target;
            }
            // The sender lives as long as `self`
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl fmt::Debug for MediaSinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSinkRef")
            .field("role", &self.role)
            .field("target", &self.target())
            .finish()
    }
}

/// The local/remote sink pair handed to session start
#[derive(Debug, Clone)]
pub struct MediaSinks {
    pub local: MediaSinkRef,
    pub remote: MediaSinkRef,
}

impl MediaSinks {
    /// Create a pair of unattached sinks
    pub fn new() -> Self {
        Self {
            local: MediaSinkRef::new(SinkRole::Local),
            remote: MediaSinkRef::new(SinkRole::Remote),
        }
    }

    /// Both sinks attached
    pub fn is_resolved(&self) -> bool {
        self.local.is_resolved() && self.remote.is_resolved()
    }

    /// Wait until both sinks are attached
    ///
    /// ```rust
    /// use rvoip_webrtc_adapter::MediaSinks;
    ///
    /// # tokio_test::block_on(async {
    /// let media = MediaSinks::new();
    /// media.local.attach("audio#local");
    /// media.remote.attach("audio#remote");
    /// media.resolved().await;
    /// assert!(media.is_resolved());
    /// # })
    /// ```
    pub async fn resolved(&self) {
        tokio::join!(self.local.resolved(), self.remote.resolved());
    }
}

impl Default for MediaSinks {
    fn default() -> Self {
        Self::new()
    }
}
