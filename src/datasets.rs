//! Dataset catalog: a JSON index of sharing links, fetched like a model artifact.

use crate::artifact::ensure_downloaded;
use crate::error::{Error, Result};
use crate::model::{resolve_download_url, Zoo};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const INDEX_FILE: &str = "datasets.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetEntry {
    pub link: String,
    /// Local file name; defaults to `<name>.csv`.
    #[serde(default)]
    pub file: Option<String>,
}

pub struct DatasetCatalog<'a> {
    zoo: &'a Zoo,
    entries: BTreeMap<String, DatasetEntry>,
}

impl<'a> DatasetCatalog<'a> {
    /// Downloads the index (cached in the data dir) and parses it.
    pub async fn open(zoo: &'a Zoo, force_download: bool) -> Result<Self> {
        let config = zoo.config();
        let url = resolve_download_url(&config.dataset_index_link, &config.download_base_url)?;
        let index_path = config.data_dir.join(INDEX_FILE);

        ensure_downloaded(zoo.fetcher(), &url, &index_path, force_download).await?;

        let content = tokio::fs::read_to_string(&index_path).await?;
        let entries: BTreeMap<String, DatasetEntry> = serde_json::from_str(&content)
            .map_err(|e| Error::SerializationError(format!("dataset index {:?}: {}", index_path, e)))?;

        tracing::debug!("Dataset index lists {} datasets", entries.len());
        Ok(Self { zoo, entries })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn entry(&self, name: &str) -> Result<&DatasetEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::DatasetNotFound(name.to_string()))
    }

    /// Downloads dataset `name` into the base directory and returns its path.
    pub async fn fetch(&self, name: &str, force_download: bool) -> Result<PathBuf> {
        let entry = self.entry(name)?;
        let config = self.zoo.config();

        let file = entry.file.clone().unwrap_or_else(|| format!("{}.csv", name));
        if file.trim().is_empty() || file == "." || file == ".." || file.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!(
                "Dataset '{}' has an invalid file name '{}'",
                name, file
            )));
        }

        let url = resolve_download_url(&entry.link, &config.download_base_url)?;
        let dest = config.base_dir.join(file);

        ensure_downloaded(self.zoo.fetcher(), &url, &dest, force_download).await?;
        Ok(dest)
    }
}
