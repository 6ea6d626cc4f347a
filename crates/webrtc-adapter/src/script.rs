//! SDK script loading
//!
//! The vendor SDK is an externally hosted script. [`ScriptLoader`] requests it
//! through a host supplied [`ResourceFetcher`] exactly once and reports one
//! outcome. A network failure and a script that throws while executing look
//! the same from here: both become [`AdapterError::ScriptLoadFailure`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};

/// `data-id` value the SDK looks for when it initialises
pub const SCRIPT_DATA_ID: &str = "teravoz";

/// Attribute carrying the script identifier
pub const DATA_ID_ATTR: &str = "data-id";

/// Attribute carrying the caller's access key
pub const DATA_KEY_ATTR: &str = "data-key";

/// Description of the script element to inject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTag {
    /// Script URL
    pub src: String,
    /// DOM attributes the SDK reads back on start-up
    pub attributes: BTreeMap<String, String>,
}

impl ScriptTag {
    /// Build the tag for a configuration
    pub fn from_config(config: &AdapterConfig) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(DATA_ID_ATTR.to_string(), SCRIPT_DATA_ID.to_string());
        if let Some(key) = &config.api_key {
            attributes.insert(DATA_KEY_ATTR.to_string(), key.clone());
        }
        Self {
            src: config.url.clone(),
            attributes,
        }
    }

    /// Look up an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Host capability that fetches and executes a script
///
/// Returns once the script has run and the SDK entry point is callable.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, tag: &ScriptTag) -> anyhow::Result<()>;
}

/// Loads the SDK script at most once
pub struct ScriptLoader {
    tag: ScriptTag,
    fetcher: Arc<dyn ResourceFetcher>,
    requested: AtomicBool,
}

impl ScriptLoader {
    pub fn new(tag: ScriptTag, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            tag,
            fetcher,
            requested: AtomicBool::new(false),
        }
    }

    /// Tag this loader injects
    pub fn tag(&self) -> &ScriptTag {
        &self.tag
    }

    /// Whether `load` has been called
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Fetch and execute the script
    ///
    /// Only the first call reaches the fetcher; later calls fail with
    /// [`AdapterError::ScriptAlreadyRequested`]. No retry is attempted.
    pub async fn load(&self) -> AdapterResult<()> {
        if self.requested.swap(true, Ordering::AcqRel) {
            return Err(AdapterError::ScriptAlreadyRequested);
        }

        tracing::info!(src = %self.tag.src, "Loading SDK script");
        match self.fetcher.fetch(&self.tag).await {
            Ok(()) => {
                tracing::info!(src = %self.tag.src, "SDK script loaded");
                Ok(())
            }
            Err(e) => {
                tracing::error!(src = %self.tag.src, error = %e, "SDK script failed to load");
                Err(AdapterError::script_load(&self.tag.src, format!("{e:#}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingFetcher {
        fail_with: Option<&'static str>,
        calls: Mutex<Vec<ScriptTag>>,
    }

    #[async_trait]
    impl ResourceFetcher for RecordingFetcher {
        async fn fetch(&self, tag: &ScriptTag) -> anyhow::Result<()> {
            self.calls.lock().push(tag.clone());
            match self.fail_with {
                Some(reason) => anyhow::bail!(reason),
                None => Ok(()),
            }
        }
    }

    fn fetcher(fail_with: Option<&'static str>) -> Arc<RecordingFetcher> {
        Arc::new(RecordingFetcher {
            fail_with,
            calls: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_tag_attributes_follow_config() {
        let tag = ScriptTag::from_config(&AdapterConfig::new());
        assert_eq!(tag.attribute(DATA_ID_ATTR), Some(SCRIPT_DATA_ID));
        assert_eq!(tag.attribute(DATA_KEY_ATTR), None);

        let tag = ScriptTag::from_config(
            &AdapterConfig::new()
                .with_api_key("k-42")
                .with_url("https://cdn.example.com/sdk.js"),
        );
        assert_eq!(tag.src, "https://cdn.example.com/sdk.js");
        assert_eq!(tag.attribute(DATA_KEY_ATTR), Some("k-42"));
    }

    #[tokio::test]
    async fn test_load_runs_once() {
        let fetcher = fetcher(None);
        let tag = ScriptTag::from_config(&AdapterConfig::new());
        let loader = ScriptLoader::new(tag, fetcher.clone());

        assert!(!loader.is_requested());
        loader.load().await.unwrap();
        assert!(loader.is_requested());

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, AdapterError::ScriptAlreadyRequested));
        assert_eq!(fetcher.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_collapses_to_script_load_failure() {
        let fetcher = fetcher(Some("net::ERR_NAME_NOT_RESOLVED"));
        let tag = ScriptTag::from_config(&AdapterConfig::new());
        let loader = ScriptLoader::new(tag, fetcher.clone());

        match loader.load().await.unwrap_err() {
            AdapterError::ScriptLoadFailure { url, reason } => {
                assert_eq!(url, crate::config::DEFAULT_SCRIPT_URL);
                assert!(reason.contains("ERR_NAME_NOT_RESOLVED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // No retry, even when asked again
        assert!(loader.load().await.is_err());
        assert_eq!(fetcher.calls.lock().len(), 1);
    }
}
