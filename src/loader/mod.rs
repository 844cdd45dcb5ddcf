//! Framework loaders that turn a downloaded artifact into an in-memory model.

pub mod device;
pub mod tokenizer;
pub mod transformer;
pub mod weights;

use crate::error::Result;
use std::path::{Path, PathBuf};

pub use device::DevicePolicy;
pub use tokenizer::PipelineLoader;
pub use transformer::{Transformer, TransformerLoader, TransformerTask};
pub use weights::{Weights, WeightsLoader};

pub const DEFAULT_ARCHIVE: &str = "model.zip";

/// How a model's artifact sits on disk next to its manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLayout {
    /// The download is the model file itself.
    File { file: PathBuf },
    /// The download is a zip archive that unpacks to `unpacked`.
    Archive { archive: PathBuf, unpacked: PathBuf },
}

impl ArtifactLayout {
    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self::File { file: file.into() }
    }

    pub fn archive(archive: impl Into<PathBuf>, unpacked: impl Into<PathBuf>) -> Self {
        Self::Archive {
            archive: archive.into(),
            unpacked: unpacked.into(),
        }
    }

    /// Where the downloaded bytes are stored.
    pub fn download_path(&self, dir: &Path) -> PathBuf {
        match self {
            Self::File { file } => dir.join(file),
            Self::Archive { archive, .. } => dir.join(archive),
        }
    }

    /// The path handed to the loader.
    pub fn local_path(&self, dir: &Path) -> PathBuf {
        match self {
            Self::File { file } => dir.join(file),
            Self::Archive { unpacked, .. } => dir.join(unpacked),
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive { .. })
    }
}

/// A source of models: knows its on-disk layout and how to load it.
pub trait ModelLoader {
    type Model;

    fn name(&self) -> &str;

    fn layout(&self) -> &ArtifactLayout;

    /// Loads the model at `path`; malformed input surfaces as `LoaderRejected`.
    fn load(&self, path: &Path) -> Result<Self::Model>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_layout_paths() {
        let layout = ArtifactLayout::file("model.safetensors");
        let dir = Path::new("/zoo/bert");
        assert_eq!(layout.download_path(dir), dir.join("model.safetensors"));
        assert_eq!(layout.local_path(dir), dir.join("model.safetensors"));
        assert!(!layout.is_archive());
    }

    #[test]
    fn test_archive_layout_paths() {
        let layout = ArtifactLayout::archive(DEFAULT_ARCHIVE, "bert-base");
        let dir = Path::new("/zoo/bert");
        assert_eq!(layout.download_path(dir), dir.join("model.zip"));
        assert_eq!(layout.local_path(dir), dir.join("bert-base"));
        assert!(layout.is_archive());
    }
}
