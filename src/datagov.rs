use std::str::FromStr;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Collection, CollectionId, DatasetId, Fragment, RawRecord};
use crate::error::ResaleError;

/// Bounds on the poll-download loop. Sleeping happens only between attempts.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(3),
        }
    }
}

pub trait DataGovClient: Send + Sync {
    fn fetch_collection_metadata(&self, id: CollectionId) -> Result<Collection, ResaleError>;
    fn fetch_dataset(&self, id: &DatasetId) -> Result<Fragment, ResaleError>;
}

impl<C: DataGovClient + ?Sized> DataGovClient for std::sync::Arc<C> {
    fn fetch_collection_metadata(&self, id: CollectionId) -> Result<Collection, ResaleError> {
        (**self).fetch_collection_metadata(id)
    }

    fn fetch_dataset(&self, id: &DatasetId) -> Result<Fragment, ResaleError> {
        (**self).fetch_dataset(id)
    }
}

#[derive(Clone)]
pub struct DataGovHttpClient {
    client: Client,
    production_base: String,
    open_base: String,
    poll: PollPolicy,
}

impl DataGovHttpClient {
    pub fn new(poll: PollPolicy, request_timeout: Duration) -> Result<Self, ResaleError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("hdb-rm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        Ok(Self {
            client,
            production_base: "https://api-production.data.gov.sg".to_string(),
            open_base: "https://api-open.data.gov.sg".to_string(),
            poll,
        })
    }

    pub fn with_base_urls(mut self, production_base: String, open_base: String) -> Self {
        self.production_base = production_base;
        self.open_base = open_base;
        self
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ResaleError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "data.gov.sg request failed".to_string());
        Err(ResaleError::DataGovStatus { status, message })
    }

    /// GET with an empty JSON body, the form the open-data download
    /// endpoints expect for initiate-download and poll-download.
    fn get_with_empty_json(&self, url: &str) -> Result<reqwest::blocking::Response, ResaleError> {
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        Self::handle_status(response)
    }

    fn download_rows(&self, url: &str) -> Result<Vec<RawRecord>, ResaleError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let payload = response
            .text()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        parse_csv_rows(&payload)
    }
}

impl DataGovClient for DataGovHttpClient {
    fn fetch_collection_metadata(&self, id: CollectionId) -> Result<Collection, ResaleError> {
        let url = format!(
            "{}/v2/public/api/collections/{}/metadata",
            self.production_base, id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let envelope: CollectionMetadataResponse = response
            .json()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;

        let body = envelope.data.collection_metadata;
        let child_datasets = body
            .child_datasets
            .iter()
            .map(|raw| DatasetId::from_str(raw))
            .collect::<Result<Vec<_>, ResaleError>>()?;
        debug!(collection = %id, datasets = child_datasets.len(), "collection metadata fetched");

        Ok(Collection {
            id,
            name: body.name,
            child_datasets,
        })
    }

    fn fetch_dataset(&self, id: &DatasetId) -> Result<Fragment, ResaleError> {
        let metadata_url = format!(
            "{}/v2/public/api/datasets/{}/metadata",
            self.production_base, id
        );
        let response = self
            .client
            .get(&metadata_url)
            .send()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let metadata: DatasetMetadataResponse = response
            .json()
            .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
        // columnMetadata is informational only; read it for the log, then drop it.
        let columns = metadata
            .data
            .column_metadata
            .map(|value| value.as_object().map(|map| map.len()).unwrap_or(0))
            .unwrap_or(0);
        debug!(dataset = %id, columns, "dataset metadata fetched");

        let initiate_url = format!(
            "{}/v1/public/api/datasets/{}/initiate-download",
            self.open_base, id
        );
        let _ = self.get_with_empty_json(&initiate_url)?;

        let poll_url = format!(
            "{}/v1/public/api/datasets/{}/poll-download",
            self.open_base, id
        );
        for attempt in 1..=self.poll.max_attempts {
            let response = self.get_with_empty_json(&poll_url)?;
            let poll: PollDownloadResponse = response
                .json()
                .map_err(|err| ResaleError::DataGovHttp(err.to_string()))?;
            if let Some(url) = poll.data.url {
                debug!(dataset = %id, attempt, "download url ready");
                let rows = self.download_rows(&url)?;
                return Ok(Fragment {
                    dataset_id: id.clone(),
                    rows,
                });
            }
            if attempt < self.poll.max_attempts {
                thread::sleep(self.poll.interval);
            }
        }

        Err(ResaleError::DownloadTimeout {
            dataset_id: id.to_string(),
            attempts: self.poll.max_attempts,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CollectionMetadataResponse {
    data: CollectionMetadataData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionMetadataData {
    collection_metadata: CollectionMetadataBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionMetadataBody {
    name: Option<String>,
    #[serde(default)]
    child_datasets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DatasetMetadataResponse {
    data: DatasetMetadataData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetMetadataData {
    #[serde(default)]
    column_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PollDownloadResponse {
    data: PollDownloadData,
}

#[derive(Debug, Deserialize)]
struct PollDownloadData {
    url: Option<String>,
}

/// Parses the downloaded CSV payload into raw rows. Lookup is header-driven:
/// a column absent from the header or an empty cell yields `None`, which the
/// merge stage later fills with the column's sentinel default.
pub fn parse_csv_rows(payload: &str) -> Result<Vec<RawRecord>, ResaleError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(payload.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| ResaleError::DataGovHttp(format!("csv header: {err}")))?
        .clone();
    let columns = ColumnIndices::of(&headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ResaleError::DataGovHttp(format!("csv row: {err}")))?;
        rows.push(columns.extract(&record));
    }
    Ok(rows)
}

struct ColumnIndices {
    month: Option<usize>,
    town: Option<usize>,
    flat_type: Option<usize>,
    block: Option<usize>,
    street_name: Option<usize>,
    storey_range: Option<usize>,
    floor_area_sqm: Option<usize>,
    flat_model: Option<usize>,
    lease_commence_date: Option<usize>,
    remaining_lease: Option<usize>,
    resale_price: Option<usize>,
}

impl ColumnIndices {
    fn of(headers: &csv::StringRecord) -> Self {
        let index = |name: &str| headers.iter().position(|header| header == name);
        Self {
            month: index("month"),
            town: index("town"),
            flat_type: index("flat_type"),
            block: index("block"),
            street_name: index("street_name"),
            storey_range: index("storey_range"),
            floor_area_sqm: index("floor_area_sqm"),
            flat_model: index("flat_model"),
            lease_commence_date: index("lease_commence_date"),
            remaining_lease: index("remaining_lease"),
            resale_price: index("resale_price"),
        }
    }

    fn extract(&self, record: &csv::StringRecord) -> RawRecord {
        let field = |index: Option<usize>| {
            index
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        RawRecord {
            month: field(self.month),
            town: field(self.town),
            flat_type: field(self.flat_type),
            block: field(self.block),
            street_name: field(self.street_name),
            storey_range: field(self.storey_range),
            floor_area_sqm: field(self.floor_area_sqm),
            flat_model: field(self.flat_model),
            lease_commence_date: field(self.lease_commence_date),
            remaining_lease: field(self.remaining_lease),
            resale_price: field(self.resale_price),
        }
    }
}
