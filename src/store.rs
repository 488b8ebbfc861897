use std::fs::{self, File};
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::domain::ResaleDataset;
use crate::error::ResaleError;

/// The single fixed entry name inside the cache archive.
pub const ARCHIVE_ENTRY: &str = "resale_data.json";

/// Local cache of the unified dataset: one zip archive holding one
/// serialized blob. Freshness is the archive's filesystem mtime, nothing
/// more.
#[derive(Debug, Clone)]
pub struct CacheStore {
    archive_path: Utf8PathBuf,
}

impl CacheStore {
    pub fn new(archive_path: Utf8PathBuf) -> Self {
        Self { archive_path }
    }

    pub fn archive_path(&self) -> &Utf8Path {
        &self.archive_path
    }

    pub fn exists(&self) -> bool {
        self.archive_path.as_std_path().exists()
    }

    /// Any structural mismatch here is `CacheCorrupt`; the orchestrator
    /// treats that identically to a cache miss.
    pub fn load(&self) -> Result<ResaleDataset, ResaleError> {
        let file = File::open(self.archive_path.as_std_path()).map_err(|err| {
            ResaleError::CacheCorrupt(format!("open {}: {err}", self.archive_path))
        })?;
        let mut archive =
            ZipArchive::new(file).map_err(|err| ResaleError::CacheCorrupt(err.to_string()))?;
        let mut entry = archive.by_name(ARCHIVE_ENTRY).map_err(|err| {
            ResaleError::CacheCorrupt(format!("missing entry {ARCHIVE_ENTRY}: {err}"))
        })?;
        let mut payload = String::new();
        entry
            .read_to_string(&mut payload)
            .map_err(|err| ResaleError::CacheCorrupt(err.to_string()))?;
        serde_json::from_str(&payload).map_err(|err| ResaleError::CacheCorrupt(err.to_string()))
    }

    /// Serializes the dataset into a freshly written archive and replaces
    /// any prior one atomically (write-new-then-replace, never in place).
    pub fn save(&self, dataset: &ResaleDataset) -> Result<(), ResaleError> {
        let parent = match self.archive_path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("hdb-rm-cache")
            .suffix(".zip")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;

        let mut writer = ZipWriter::new(temp.as_file());
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9));
        writer
            .start_file(ARCHIVE_ENTRY, options)
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        let payload = serde_json::to_vec(dataset)
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        writer
            .write_all(&payload)
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        writer
            .finish()
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;

        if self.archive_path.as_std_path().exists() {
            fs::remove_file(self.archive_path.as_std_path())
                .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        }
        temp.persist(self.archive_path.as_std_path())
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Display-only freshness; never used for invalidation.
    pub fn last_modified(&self) -> Result<DateTime<Utc>, ResaleError> {
        let modified = fs::metadata(self.archive_path.as_std_path())
            .and_then(|metadata| metadata.modified())
            .map_err(|err| ResaleError::Filesystem(err.to_string()))?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_archive_reports_absent() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("resale_data.zip")).unwrap();
        let store = CacheStore::new(path);
        assert!(!store.exists());
    }
}
