use super::*;

#[test]
fn test_defaults_match_spec() {
    let config = Config::default();
    assert_eq!(config.defrag_threshold_percent, 75);
    assert_eq!(config.background_index_delay_ms, 5_000);
    assert_eq!(config.memory_pressure_check_interval_ms, 30_000);
    assert_eq!(config.flush_policy, FlushPolicy::Batched(100));
}

#[test]
fn test_builder_overrides() {
    let config = Config::default()
        .with_capacity(64)
        .with_flush_policy(FlushPolicy::Immediate);
    assert_eq!(config.capacity, 64);
    assert_eq!(config.flush_policy, FlushPolicy::Immediate);
}

#[test]
fn test_from_toml_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nbrly.toml");
    let toml_text = r#"
capacity = 2048
batch_size = 25

[flush_policy]
kind = "Batched"
value = 25
"#;
    std::fs::write(&path, toml_text).unwrap();

    let config = Config::from_toml_file(path.as_os_str()).unwrap();
    assert_eq!(config.capacity, 2048);
    assert_eq!(config.batch_size, 25);
    assert_eq!(config.flush_policy, FlushPolicy::Batched(25));
}
