//! Tests for registry logging behavior
//!
//! Tests that a warning is emitted when a provider name is registered twice.

use durable_agent::{ChatModel, ProviderConfig, Registry};
use std::sync::Arc;

#[test]
fn test_reregistration_warning_with_logging_enabled() {
    // Initialize env_logger for this test
    // Set to warn level to capture the log::warn! call
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Warn)
        .try_init();

    let registry: Registry<String> = Registry::new("chat_models");
    registry.register("acme", |_config| Ok("first".to_string()));

    // Registering the same name again replaces the factory (last wins)
    // and emits the warning during this call.
    registry.register("acme", |_config| Ok("second".to_string()));

    // The replacement took effect and the registry still holds one entry.
    assert_eq!(
        registry.new_instance("acme", &ProviderConfig::new()).unwrap(),
        "second"
    );
    assert_eq!(registry.list(), vec!["acme"]);

    // Note: Actual log output would appear in test output with RUST_LOG=warn:
    // "chat_models: provider \"acme\" registered twice; last registration wins"
}

#[test]
fn test_no_warning_for_distinct_names() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Warn)
        .try_init();

    // Distinct names never hit the replacement path, so bootstrap of a
    // normal provider set stays silent at warn level.
    let registry: Registry<Arc<dyn ChatModel>> = Registry::new("chat_models");
    registry.register("alpha", |_config| {
        Err(durable_agent::Error::invalid_input("api_key is required"))
    });
    registry.register("beta", |_config| {
        Err(durable_agent::Error::invalid_input("api_key is required"))
    });

    assert_eq!(registry.list(), vec!["alpha", "beta"]);
}
