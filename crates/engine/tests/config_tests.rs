use tdb_engine::EngineConfig;
use tracing::info;

#[test]
fn test_default_config() {
    tdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default();

    assert!(config.auto_select_top_frame);
    assert!(!config.prefetch_frames);
}

#[test]
fn test_partial_config_uses_defaults() {
    tdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config: EngineConfig = toml::from_str("prefetch_frames = true").unwrap();

    assert!(config.auto_select_top_frame);
    assert!(config.prefetch_frames);
}

#[test]
fn test_config_with_custom_values() {
    tdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig { auto_select_top_frame: false, prefetch_frames: true };

    let text = toml::to_string(&config).unwrap();
    let parsed: EngineConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
