use std::io::Write;
use std::time::Duration;

use assert_matches::assert_matches;

use hdb_resale_manager::config::{Config, ConfigLoader};
use hdb_resale_manager::error::ResaleError;

#[test]
fn resolve_config_defaults() {
    let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
    assert_eq!(resolved.collection_id.get(), 189);
    assert_eq!(resolved.cache_path.as_str(), "resale_data.zip");
    assert_eq!(resolved.poll.max_attempts, 5);
    assert_eq!(resolved.poll.interval, Duration::from_secs(3));
    assert_eq!(resolved.request_timeout, Duration::from_secs(30));
    assert_eq!(resolved.assistant_model, "gpt-3.5-turbo");
}

#[test]
fn resolve_explicit_path_applies_overrides() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    write!(
        file,
        r#"{{
            "collection_id": 42,
            "cache_path": "archive/resale.zip",
            "max_polls": 2,
            "poll_interval_secs": 1,
            "assistant": {{ "model": "gpt-4o-mini" }}
        }}"#
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(file.path().to_str()).unwrap();
    assert_eq!(resolved.collection_id.get(), 42);
    assert_eq!(resolved.cache_path.as_str(), "archive/resale.zip");
    assert_eq!(resolved.poll.max_attempts, 2);
    assert_eq!(resolved.poll.interval, Duration::from_secs(1));
    assert_eq!(resolved.assistant_model, "gpt-4o-mini");
    // Unset fields keep their defaults.
    assert_eq!(resolved.request_timeout, Duration::from_secs(30));
}

#[test]
fn resolve_missing_explicit_path_fails() {
    let err = ConfigLoader::resolve(Some("/nonexistent/hdb-rm.json")).unwrap_err();
    assert_matches!(err, ResaleError::ConfigRead(_));
}

#[test]
fn resolve_malformed_json_fails() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    write!(file, "{{ not json").unwrap();

    let err = ConfigLoader::resolve(file.path().to_str()).unwrap_err();
    assert_matches!(err, ResaleError::ConfigParse(_));
}
