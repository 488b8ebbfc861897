use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::assistant;
use crate::datagov::PollPolicy;
use crate::domain::CollectionId;
use crate::error::ResaleError;

pub const DEFAULT_CONFIG_FILE: &str = "hdb-rm.json";
/// data.gov.sg collection id for "Resale Flat Prices".
const DEFAULT_COLLECTION_ID: u32 = 189;
const DEFAULT_CACHE_PATH: &str = "resale_data.zip";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub collection_id: Option<u32>,
    #[serde(default)]
    pub cache_path: Option<String>,
    #[serde(default)]
    pub max_polls: Option<usize>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub assistant: Option<AssistantConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub collection_id: CollectionId,
    pub cache_path: Utf8PathBuf,
    pub poll: PollPolicy,
    pub request_timeout: Duration,
    pub assistant_base_url: String,
    pub assistant_model: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            collection_id: CollectionId::new(DEFAULT_COLLECTION_ID),
            cache_path: Utf8PathBuf::from(DEFAULT_CACHE_PATH),
            poll: PollPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            assistant_base_url: assistant::DEFAULT_BASE_URL.to_string(),
            assistant_model: assistant::DEFAULT_MODEL.to_string(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves the effective configuration. An explicitly passed path must
    /// exist and parse; the implicit `hdb-rm.json` is optional and its
    /// absence resolves to defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ResaleError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ResaleError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ResaleError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ResaleError> {
        let defaults = ResolvedConfig::default();

        let collection_id = match config.collection_id {
            Some(0) => return Err(ResaleError::InvalidCollectionId("0".to_string())),
            Some(id) => CollectionId::new(id),
            None => defaults.collection_id,
        };

        let poll = PollPolicy {
            max_attempts: config.max_polls.unwrap_or(defaults.poll.max_attempts),
            interval: config
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll.interval),
        };

        let assistant = config.assistant.unwrap_or_default();

        Ok(ResolvedConfig {
            collection_id,
            cache_path: config
                .cache_path
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.cache_path),
            poll,
            request_timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            assistant_base_url: assistant.base_url.unwrap_or(defaults.assistant_base_url),
            assistant_model: assistant.model.unwrap_or(defaults.assistant_model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.collection_id.get(), 189);
        assert_eq!(resolved.cache_path.as_str(), "resale_data.zip");
        assert_eq!(resolved.poll.max_attempts, 5);
        assert_eq!(resolved.poll.interval, Duration::from_secs(3));
    }

    #[test]
    fn overrides_apply() {
        let config = Config {
            collection_id: Some(42),
            cache_path: Some("/tmp/hdb/resale.zip".to_string()),
            max_polls: Some(8),
            poll_interval_secs: Some(1),
            request_timeout_secs: Some(10),
            assistant: Some(AssistantConfig {
                base_url: Some("http://localhost:8080".to_string()),
                model: Some("gpt-4o-mini".to_string()),
            }),
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.collection_id.get(), 42);
        assert_eq!(resolved.poll.max_attempts, 8);
        assert_eq!(resolved.assistant_model, "gpt-4o-mini");
    }

    #[test]
    fn zero_collection_id_is_rejected() {
        let config = Config {
            collection_id: Some(0),
            ..Config::default()
        };
        assert!(ConfigLoader::resolve_config(config).is_err());
    }
}
