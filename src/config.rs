use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DOWNLOAD_BASE: &str = "https://drive.google.com/uc?id=";
pub const DEFAULT_MANIFEST_NAME: &str = "result.json";
pub const DEFAULT_DATASET_INDEX: &str =
	"https://drive.google.com/file/d/10G-d7rdIHsQ9s8XE1mgs6t-hfQjVD-KA/view?usp=sharing";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	/// Directory model entries and dataset files are resolved against.
	pub base_dir: PathBuf,
	pub data_dir: PathBuf,
	pub registry_path: PathBuf,
	pub download_base_url: String,
	pub manifest_name: String,
	pub dataset_index_link: String,
}

/// Optional `config.toml` in the data directory.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
	download_base_url: Option<String>,
	manifest_name: Option<String>,
	dataset_index_link: Option<String>,
}

impl Config {
	/// Builds a config rooted at explicit directories without touching the filesystem.
	pub fn with_dirs(base_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
		let data_dir = data_dir.into();
		let registry_path = data_dir.join("models.toml");

		Self {
			base_dir: base_dir.into(),
			data_dir,
			registry_path,
			download_base_url: DEFAULT_DOWNLOAD_BASE.to_string(),
			manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
			dataset_index_link: DEFAULT_DATASET_INDEX.to_string(),
		}
	}

	pub fn new(base_dir: impl Into<PathBuf>) -> crate::error::Result<Self> {
		let project_dirs = ProjectDirs::from("", "", "forest")
			.ok_or_else(|| crate::error::Error::ConfigError("Could not determine data directory".to_string()))?;

		Self::with_dirs(base_dir, project_dirs.data_dir()).prepare()
	}

	pub fn from_env(base_dir: impl Into<PathBuf>) -> crate::error::Result<Self> {
		let config = if let Ok(data_dir) = std::env::var("FOREST_DATA_DIR") {
			Self::with_dirs(base_dir, data_dir).prepare()?
		} else {
			Self::new(base_dir)?
		};

		Ok(match std::env::var("FOREST_DOWNLOAD_BASE") {
			Ok(base) if !base.is_empty() => Self {
				download_base_url: base,
				..config
			},
			_ => config,
		})
	}

	/// Creates the data directory and applies `config.toml` overrides.
	pub fn prepare(self) -> crate::error::Result<Self> {
		std::fs::create_dir_all(&self.data_dir)?;
		self.apply_file_overrides()
	}

	pub fn config_file(&self) -> PathBuf {
		self.data_dir.join("config.toml")
	}

	fn apply_file_overrides(mut self) -> crate::error::Result<Self> {
		let path = self.config_file();
		if !path.exists() {
			return Ok(self);
		}

		let content = std::fs::read_to_string(&path)?;
		let overrides: FileOverrides = toml::from_str(&content)?;
		tracing::debug!("Applying overrides from {:?}", path);

		if let Some(base) = overrides.download_base_url {
			self.download_base_url = base;
		}
		if let Some(name) = overrides.manifest_name {
			self.manifest_name = name;
		}
		if let Some(link) = overrides.dataset_index_link {
			self.dataset_index_link = link;
		}
		Ok(self)
	}

	/// Anchors a relative path at `base_dir`.
	pub fn resolve(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_dir.join(path)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_with_dirs_defaults() {
		let config = Config::with_dirs("/zoo", "/data");
		assert_eq!(config.registry_path, PathBuf::from("/data/models.toml"));
		assert_eq!(config.download_base_url, DEFAULT_DOWNLOAD_BASE);
		assert_eq!(config.manifest_name, "result.json");
	}

	#[test]
	fn test_resolve_relative_and_absolute() {
		let config = Config::with_dirs("/zoo", "/data");
		assert_eq!(config.resolve(Path::new("bert")), PathBuf::from("/zoo/bert"));
		assert_eq!(config.resolve(Path::new("/models/bert")), PathBuf::from("/models/bert"));
	}

	#[test]
	fn test_prepare_applies_config_file() {
		let temp = TempDir::new().unwrap();
		let data_dir = temp.path().join("data");
		std::fs::create_dir_all(&data_dir).unwrap();
		std::fs::write(
			data_dir.join("config.toml"),
			"download_base_url = \"http://mirror.local/get?id=\"\nmanifest_name = \"zoo.json\"\n",
		)
		.unwrap();

		let config = Config::with_dirs(temp.path(), &data_dir).prepare().unwrap();
		assert_eq!(config.download_base_url, "http://mirror.local/get?id=");
		assert_eq!(config.manifest_name, "zoo.json");
		assert_eq!(config.dataset_index_link, DEFAULT_DATASET_INDEX);
	}

	#[test]
	fn test_prepare_rejects_bad_config_file() {
		let temp = TempDir::new().unwrap();
		std::fs::write(temp.path().join("config.toml"), "manifest_name = [").unwrap();

		let result = Config::with_dirs(temp.path(), temp.path()).prepare();
		assert!(matches!(result, Err(crate::error::Error::SerializationError(_))));
	}
}
