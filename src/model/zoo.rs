use crate::artifact::{ensure_downloaded, extract_if_missing, DownloadOutcome, ExtractOutcome, Fetcher, HttpFetcher};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::loader::{ArtifactLayout, ModelLoader};
use crate::model::link::resolve_download_url;
use crate::model::{Manifest, ModelRegistry, PulledModel};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Re-download even when the artifact is already on disk.
    pub force_download: bool,
}

impl LoadOptions {
    pub fn forced() -> Self {
        Self {
            force_download: true,
        }
    }
}

/// Where a fetch left things on disk.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub name: String,
    pub model_dir: PathBuf,
    pub download_path: PathBuf,
    pub local_path: PathBuf,
    pub download: DownloadOutcome,
    pub extraction: Option<ExtractOutcome>,
}

/// Runs the manifest → URL → cached download → extraction → load sequence
/// for model entries under `config.base_dir`.
pub struct Zoo {
    config: Config,
    fetcher: Box<dyn Fetcher>,
}

impl Zoo {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::with_fetcher(config, HttpFetcher::new(false)?))
    }

    pub fn with_fetcher(config: Config, fetcher: impl Fetcher + 'static) -> Self {
        Self {
            config,
            fetcher: Box::new(fetcher),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Makes the artifact of `model_dir` available locally without loading it.
    pub async fn fetch(
        &self,
        model_dir: &Path,
        layout: &ArtifactLayout,
        options: LoadOptions,
    ) -> Result<FetchedArtifact> {
        let model_dir = self.config.resolve(model_dir);
        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_dir.display().to_string());

        tracing::info!("Fetching model '{}' from {:?}", name, model_dir);

        let manifest = Manifest::load(&model_dir.join(&self.config.manifest_name))?;
        let url = resolve_download_url(manifest.link(), &self.config.download_base_url)?;

        let download_path = layout.download_path(&model_dir);
        let local_path = layout.local_path(&model_dir);

        let download = ensure_downloaded(
            self.fetcher(),
            &url,
            &download_path,
            options.force_download,
        )
        .await?;

        let extraction = if layout.is_archive() {
            let (archive, target, expected) =
                (download_path.clone(), model_dir.clone(), local_path.clone());
            let outcome =
                tokio::task::spawn_blocking(move || extract_if_missing(&archive, &target, &expected))
                    .await
                    .map_err(|e| Error::ExtractionFailed(e.to_string()))??;
            Some(outcome)
        } else {
            None
        };

        let artifact = FetchedArtifact {
            name,
            model_dir,
            download_path,
            local_path,
            download,
            extraction,
        };

        if let Err(e) = self.record(&artifact, manifest.link()) {
            tracing::warn!("Could not update model registry: {}", e);
        }

        Ok(artifact)
    }

    /// Fetches the artifact in the loader's layout and hands it to the loader.
    pub async fn load<L: ModelLoader>(
        &self,
        model_dir: &Path,
        loader: &L,
        options: LoadOptions,
    ) -> Result<L::Model> {
        let artifact = self.fetch(model_dir, loader.layout(), options).await?;

        tracing::info!(
            "Loading '{}' with the {} loader from {:?}",
            artifact.name,
            loader.name(),
            artifact.local_path
        );
        loader.load(&artifact.local_path)
    }

    fn record(&self, artifact: &FetchedArtifact, link: &str) -> Result<()> {
        let mut registry = ModelRegistry::load(&self.config)?;
        registry.record(PulledModel {
            name: artifact.name.clone(),
            link: link.to_string(),
            model_dir: artifact.model_dir.clone(),
            artifact_path: artifact.local_path.clone(),
            pulled_at: chrono::Utc::now().to_rfc3339(),
        });
        registry.save(&self.config)
    }
}
