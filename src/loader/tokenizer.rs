use crate::error::{Error, Result};
use crate::loader::{ArtifactLayout, ModelLoader, DEFAULT_ARCHIVE};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Loads a text-processing pipeline (normalizer, pre-tokenizer, model and
/// post-processor) serialized as `tokenizer.json` inside an archive.
pub struct PipelineLoader {
    layout: ArtifactLayout,
}

impl PipelineLoader {
    pub fn new(unpacked: impl Into<PathBuf>) -> Self {
        Self {
            layout: ArtifactLayout::archive(DEFAULT_ARCHIVE, unpacked),
        }
    }

    pub fn with_layout(layout: ArtifactLayout) -> Self {
        Self { layout }
    }
}

pub(crate) fn load_tokenizer(loader: &str, path: &Path) -> Result<Tokenizer> {
    let file = if path.is_dir() {
        path.join(TOKENIZER_FILE)
    } else {
        path.to_path_buf()
    };

    if !file.exists() {
        return Err(Error::rejected(loader, path, format!("missing {}", TOKENIZER_FILE)));
    }

    Tokenizer::from_file(&file).map_err(|e| Error::rejected(loader, &file, e))
}

impl ModelLoader for PipelineLoader {
    type Model = Tokenizer;

    fn name(&self) -> &str {
        "pipeline"
    }

    fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    fn load(&self, path: &Path) -> Result<Tokenizer> {
        let tokenizer = load_tokenizer(self.name(), path)?;
        tracing::info!(
            "Loaded pipeline from {:?} (vocabulary: {})",
            path,
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }
}
