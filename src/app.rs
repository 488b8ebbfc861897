use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::datagov::DataGovClient;
use crate::domain::{CollectionId, DataSource, DatasetId, Fragment, ResaleDataset};
use crate::error::ResaleError;
use crate::merge::merge_fragments;
use crate::store::CacheStore;

/// Outcome of one acquisition. `Ok` with an empty `degraded` list is a full
/// success; `Ok` with entries in `degraded` is a partial success where those
/// fragments timed out and contributed zero rows; a fatal failure is the
/// `Err` of the operation that produced this.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub dataset: ResaleDataset,
    pub source: DataSource,
    pub degraded: Vec<DatasetId>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl FetchReport {
    pub fn summary(&self) -> FetchSummary {
        FetchSummary {
            source: self.source,
            rows: self.dataset.len(),
            degraded: self.degraded.clone(),
            last_updated: self.last_updated.map(|stamp| stamp.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub source: DataSource,
    pub rows: usize,
    pub degraded: Vec<DatasetId>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Acquisition orchestrator: decides cache-hit vs fetch-then-cache and owns
/// the unified dataset for the duration of a session. Acquisitions are
/// serialized on an in-process mutex; a refresh never races another
/// acquisition.
pub struct App<C: DataGovClient> {
    store: CacheStore,
    client: C,
    collection_id: CollectionId,
    acquisition: Mutex<()>,
}

impl<C: DataGovClient> App<C> {
    pub fn new(store: CacheStore, client: C, collection_id: CollectionId) -> Self {
        Self {
            store,
            client,
            collection_id,
            acquisition: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Returns the cached dataset when the archive is present and loadable
    /// (no network activity), otherwise runs the full fetch pipeline and
    /// caches the result.
    pub fn get_dataset(&self, sink: &dyn ProgressSink) -> Result<FetchReport, ResaleError> {
        let _guard = self
            .acquisition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.store.exists() {
            sink.event(ProgressEvent {
                message: "phase=Cache; loading archive".to_string(),
                elapsed: None,
            });
            match self.store.load() {
                Ok(dataset) => {
                    info!(rows = dataset.len(), "serving dataset from cache");
                    return Ok(FetchReport {
                        last_updated: self.store.last_modified().ok(),
                        source: DataSource::Cache,
                        degraded: Vec::new(),
                        dataset,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "cache unreadable, falling back to fetch");
                    sink.event(ProgressEvent {
                        message: "phase=Cache; archive unreadable, refetching".to_string(),
                        elapsed: None,
                    });
                }
            }
        }

        self.fetch_and_cache(sink)
    }

    /// Unconditionally fetches the latest dataset and overwrites the cache.
    pub fn refresh_dataset(&self, sink: &dyn ProgressSink) -> Result<FetchReport, ResaleError> {
        let _guard = self
            .acquisition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.fetch_and_cache(sink)
    }

    fn fetch_and_cache(&self, sink: &dyn ProgressSink) -> Result<FetchReport, ResaleError> {
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; collection {} metadata", self.collection_id),
            elapsed: None,
        });
        let collection = self.client.fetch_collection_metadata(self.collection_id)?;
        if collection.child_datasets.is_empty() {
            return Err(ResaleError::NoDatasets(self.collection_id.get()));
        }

        // Fragments are fetched one at a time, in listed order. A timeout
        // degrades that fragment to an empty table; any other failure is
        // fatal to the whole acquisition.
        let mut fragments = Vec::with_capacity(collection.child_datasets.len());
        let mut degraded = Vec::new();
        for dataset_id in &collection.child_datasets {
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; dataset {dataset_id}"),
                elapsed: None,
            });
            let start = std::time::Instant::now();
            match self.client.fetch_dataset(dataset_id) {
                Ok(fragment) => {
                    sink.event(ProgressEvent {
                        message: format!("phase=Fetch; dataset {dataset_id} done"),
                        elapsed: Some(start.elapsed()),
                    });
                    fragments.push(fragment);
                }
                Err(ResaleError::DownloadTimeout { attempts, .. }) => {
                    warn!(dataset = %dataset_id, attempts, "download timed out, continuing without fragment");
                    degraded.push(dataset_id.clone());
                    fragments.push(Fragment::empty(dataset_id.clone()));
                }
                Err(err) => return Err(err),
            }
        }

        sink.event(ProgressEvent {
            message: "phase=Merge; normalizing fragments".to_string(),
            elapsed: None,
        });
        let current_year = Utc::now().year();
        let dataset = merge_fragments(&fragments, current_year)?;

        sink.event(ProgressEvent {
            message: "phase=Store; writing cache archive".to_string(),
            elapsed: None,
        });
        self.store.save(&dataset)?;
        info!(
            rows = dataset.len(),
            degraded = degraded.len(),
            "dataset fetched and cached"
        );

        Ok(FetchReport {
            last_updated: self.store.last_modified().ok(),
            source: DataSource::Network,
            degraded,
            dataset,
        })
    }
}
