mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands, DatasetCommands, LoaderKind};
use forest::artifact::{DownloadOutcome, ExtractOutcome, HttpFetcher};
use forest::datasets::DatasetCatalog;
use forest::loader::{
    ArtifactLayout, DevicePolicy, PipelineLoader, TransformerLoader, TransformerTask, WeightsLoader, DEFAULT_ARCHIVE,
};
use forest::model::{FetchedArtifact, ModelRegistry};
use forest::{Config, LoadOptions, Zoo};
use std::path::{Path, PathBuf};

fn options(force: bool) -> LoadOptions {
    LoadOptions {
        force_download: force,
    }
}

fn print_fetched(artifact: &FetchedArtifact) {
    match artifact.download {
        DownloadOutcome::Cached => println!("  Download: cached ({:?})", artifact.download_path),
        DownloadOutcome::Fetched { bytes } => {
            println!("  Download: {} bytes -> {:?}", bytes, artifact.download_path)
        }
    }
    match artifact.extraction {
        Some(ExtractOutcome::Skipped) => println!("  Extract: already unpacked"),
        Some(ExtractOutcome::Extracted { entries }) => println!("  Extract: {} files", entries),
        None => {}
    }
    println!("  Path: {:?}", artifact.local_path);
}

#[allow(clippy::too_many_arguments)]
async fn load_model(
    zoo: &Zoo,
    model_dir: &Path,
    kind: LoaderKind,
    output: PathBuf,
    zipped: bool,
    policy: DevicePolicy,
    text: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    match kind {
        LoaderKind::Weights => {
            let loader = if zipped {
                WeightsLoader::archived(DEFAULT_ARCHIVE, output, policy)?
            } else {
                WeightsLoader::new(output, policy)?
            };
            let weights = zoo.load(model_dir, &loader, options(force)).await?;

            println!("✓ Loaded state dict from {:?}", weights.source());
            println!("  Tensors: {}", weights.len());
            println!("  Parameters: {}", weights.parameter_count());
            for name in weights.names().into_iter().take(10) {
                if let Some(tensor) = weights.get(name) {
                    println!("    {} {:?}", name, tensor.dims());
                }
            }
        }

        LoaderKind::Pipeline => {
            let loader = PipelineLoader::new(output);
            let tokenizer = zoo.load(model_dir, &loader, options(force)).await?;

            println!("✓ Loaded pipeline");
            println!("  Vocabulary: {}", tokenizer.get_vocab_size(true));
            if let Some(text) = text {
                let encoding = tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
                let output = serde_json::json!({
                    "tokens": encoding.get_tokens(),
                    "ids": encoding.get_ids(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        LoaderKind::Transformer | LoaderKind::MaskedLm | LoaderKind::Classifier => {
            let task = match kind {
                LoaderKind::MaskedLm => TransformerTask::MaskedLm,
                LoaderKind::Classifier => TransformerTask::Classification,
                _ => TransformerTask::Encoder,
            };
            let loader = TransformerLoader::new(output, policy)?.with_task(task);
            let transformer = zoo.load(model_dir, &loader, options(force)).await?;
            let shape = transformer.shape();

            println!("✓ Loaded {} transformer on {:?}", task, transformer.device());
            println!("  Hidden size: {}", shape.hidden_size);
            println!("  Layers: {}", shape.num_hidden_layers);
            if !transformer.labels().is_empty() {
                println!("  Labels: {}", transformer.labels().join(", "));
            }

            if let Some(text) = text {
                let output = match task {
                    TransformerTask::Encoder => {
                        let embedding = transformer.embed(&text)?;
                        serde_json::json!({
                            "dimension": embedding.len(),
                            "embedding": embedding,
                        })
                    }
                    TransformerTask::MaskedLm => {
                        let fillers: Vec<_> = transformer
                            .fill_mask(&text)?
                            .into_iter()
                            .map(|(token, score)| serde_json::json!({ "token": token, "score": score }))
                            .collect();
                        serde_json::json!({ "fillers": fillers })
                    }
                    TransformerTask::Classification => {
                        serde_json::json!({ "label": transformer.classify(&text)? })
                    }
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Could not determine the current directory")?,
    };
    let config = Config::from_env(base_dir)?;

    match cli.command {
        Commands::Init { name } => {
            let name = match name {
                Some(name) => name,
                None => dialoguer::Input::<String>::new()
                    .with_prompt("Give the name of the model you want to choose")
                    .interact_text()
                    .context("Could not read the model name")?,
            };

            let root = forest::scaffold::create_model_entry(&config.base_dir, &name, &config.manifest_name)?;

            println!("✓ Created model entry: {:?}", root);
            println!("  Fill in {:?} and the docs before publishing", root.join(&config.manifest_name));
        }

        Commands::Pull {
            model_dir,
            file,
            unpacked,
            archive,
            force,
        } => {
            let layout = match unpacked {
                Some(unpacked) => ArtifactLayout::archive(
                    archive.unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE)),
                    unpacked,
                ),
                None => ArtifactLayout::file(file),
            };

            let zoo = Zoo::with_fetcher(config, HttpFetcher::new(cli.quiet)?);
            let artifact = zoo.fetch(&model_dir, &layout, options(force)).await?;

            println!("✓ Pulled model: {}", artifact.name);
            print_fetched(&artifact);
        }

        Commands::Load {
            model_dir,
            kind,
            output,
            zipped,
            device,
            text,
            force,
        } => {
            let policy: DevicePolicy = device.parse()?;
            let output = output.unwrap_or_else(|| PathBuf::from(kind.default_output()));
            if zipped && kind != LoaderKind::Weights {
                anyhow::bail!("--zipped only applies to the weights loader");
            }

            let zoo = Zoo::with_fetcher(config, HttpFetcher::new(cli.quiet)?);
            load_model(&zoo, &model_dir, kind, output, zipped, policy, text, force).await?;
        }

        Commands::List => {
            let registry = ModelRegistry::load(&config)?;
            let models = registry.list_models();

            if models.is_empty() {
                println!("No models pulled.");
                println!("Use 'forest pull <model-dir>' to download a model.");
            } else {
                println!("Pulled models:\n");
                for model in models {
                    println!("  {}", model.name);
                    println!("    Link: {}", model.link);
                    println!("    Path: {:?}", model.artifact_path);
                    println!("    Pulled: {}", model.pulled_at);
                    println!();
                }
            }
        }

        Commands::Dataset { command } => {
            let zoo = Zoo::with_fetcher(config, HttpFetcher::new(cli.quiet)?);
            match command {
                DatasetCommands::List { force } => {
                    let catalog = DatasetCatalog::open(&zoo, force).await?;
                    for name in catalog.names() {
                        println!("  {}", name);
                    }
                }
                DatasetCommands::Pull { name, force } => {
                    let catalog = DatasetCatalog::open(&zoo, false).await?;
                    let path = catalog.fetch(&name, force).await?;
                    println!("✓ Dataset '{}' available at {:?}", name, path);
                }
            }
        }
    }

    Ok(())
}
