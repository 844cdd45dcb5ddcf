use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("Manifest not found: {}", .0.display())]
	ManifestNotFound(PathBuf),

	#[error("Malformed manifest {}: {reason}", .path.display())]
	ManifestMalformed { path: PathBuf, reason: String },

	#[error("Invalid sharing link '{link}': {reason}")]
	InvalidLink { link: String, reason: String },

	#[error("Download failed: {0}")]
	DownloadFailed(String),

	#[error("Extraction failed: {0}")]
	ExtractionFailed(String),

	#[error("Loader '{loader}' rejected {}: {reason}", .path.display())]
	LoaderRejected {
		loader: String,
		path: PathBuf,
		reason: String,
	},

	#[error("Inference failed: {0}")]
	InferenceFailed(String),

	#[error("Model entry already exists: {}", .0.display())]
	ScaffoldExists(PathBuf),

	#[error("Dataset not found: {0}")]
	DatasetNotFound(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	SerializationError(String),
}

impl Error {
	pub(crate) fn rejected(loader: &str, path: &std::path::Path, reason: impl ToString) -> Self {
		Error::LoaderRejected {
			loader: loader.to_string(),
			path: path.to_path_buf(),
			reason: reason.to_string(),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::ser::Error> for Error {
	fn from(err: toml::ser::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
