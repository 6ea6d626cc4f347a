//! Global subscriber installation, kept in its own binary so no other test
//! shares the subscriber

use rvoip_webrtc_adapter::AdapterError;
use rvoip_webrtc_adapter::logging::{setup_logging, LoggingConfig};
use tracing::Level;

#[test]
fn test_setup_installs_once() {
    setup_logging(LoggingConfig::new(Level::DEBUG).with_file_info()).unwrap();

    let second = setup_logging(LoggingConfig::default()).unwrap_err();
    assert!(matches!(second, AdapterError::Configuration { .. }));
}
