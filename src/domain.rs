use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResaleError;

/// Identifier of a data.gov.sg collection (a named group of datasets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(u32);

impl CollectionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CollectionId {
    type Err = ResaleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let id = normalized
            .parse::<u32>()
            .map_err(|_| ResaleError::InvalidCollectionId(value.to_string()))?;
        if id == 0 {
            return Err(ResaleError::InvalidCollectionId(value.to_string()));
        }
        Ok(Self(id))
    }
}

/// Identifier of one downloadable child dataset within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = ResaleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(ResaleError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: CollectionId,
    pub name: Option<String>,
    pub child_datasets: Vec<DatasetId>,
}

/// One downloaded row before normalization. Every field is optional: older
/// datasets in the collection lack the `remaining_lease` column entirely,
/// and any cell may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub month: Option<String>,
    pub town: Option<String>,
    pub flat_type: Option<String>,
    pub block: Option<String>,
    pub street_name: Option<String>,
    pub storey_range: Option<String>,
    pub floor_area_sqm: Option<String>,
    pub flat_model: Option<String>,
    pub lease_commence_date: Option<String>,
    pub remaining_lease: Option<String>,
    pub resale_price: Option<String>,
}

/// One child dataset's rows, prior to merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub dataset_id: DatasetId,
    pub rows: Vec<RawRecord>,
}

impl Fragment {
    pub fn empty(dataset_id: DatasetId) -> Self {
        Self {
            dataset_id,
            rows: Vec::new(),
        }
    }
}

/// One normalized resale transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResaleRecord {
    pub month: String,
    pub town: String,
    pub flat_type: String,
    pub block: String,
    pub street_name: String,
    pub storey_range: String,
    pub floor_area_sqm: f64,
    pub flat_model: String,
    pub lease_commence_date: i64,
    pub remaining_lease: i64,
    pub resale_price: f64,
}

/// The unified table the rest of the application consumes. Rows are ordered
/// by transaction month, descending; the vector index is the row index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResaleDataset {
    records: Vec<ResaleRecord>,
}

impl ResaleDataset {
    pub fn new(records: Vec<ResaleRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ResaleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ResaleRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where an acquisition served its dataset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Network,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_collection_id_valid() {
        let id: CollectionId = " 189 ".parse().unwrap();
        assert_eq!(id.get(), 189);
    }

    #[test]
    fn parse_collection_id_invalid() {
        let err = "0".parse::<CollectionId>().unwrap_err();
        assert_matches!(err, ResaleError::InvalidCollectionId(_));
        let err = "resale".parse::<CollectionId>().unwrap_err();
        assert_matches!(err, ResaleError::InvalidCollectionId(_));
    }

    #[test]
    fn parse_dataset_id_valid() {
        let id: DatasetId = "d_ebc5ab87086db484f88045b47411ebc5".parse().unwrap();
        assert_eq!(id.as_str(), "d_ebc5ab87086db484f88045b47411ebc5");
    }

    #[test]
    fn parse_dataset_id_invalid() {
        let err = "".parse::<DatasetId>().unwrap_err();
        assert_matches!(err, ResaleError::InvalidDatasetId(_));
        let err = "d 123".parse::<DatasetId>().unwrap_err();
        assert_matches!(err, ResaleError::InvalidDatasetId(_));
    }
}
