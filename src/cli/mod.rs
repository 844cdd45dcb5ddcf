use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forest")]
#[command(version, about = "A CLI tool for managing models in the model zoo", long_about = None)]
pub struct Cli {
	/// Directory model entries and datasets are resolved against (defaults to the current directory)
	#[arg(long, global = true, env = "FOREST_BASE_DIR")]
	pub base_dir: Option<PathBuf>,

	/// Hide download progress bars
	#[arg(long, short, global = true)]
	pub quiet: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize a new model entry (manifest, docs and templates)
	Init {
		/// Name of the model directory; prompted for when omitted
		name: Option<String>,
	},

	/// Download a model's artifact, unpacking it when it is an archive
	Pull {
		/// Model entry directory containing the manifest
		model_dir: PathBuf,

		/// File name of a single-file artifact
		#[arg(long, default_value = "model.safetensors")]
		file: PathBuf,

		/// Treat the artifact as a zip archive that unpacks to this path
		#[arg(long, conflicts_with = "file")]
		unpacked: Option<PathBuf>,

		/// File name the archive is saved under (defaults to `model.zip`)
		#[arg(long, requires = "unpacked")]
		archive: Option<PathBuf>,

		/// Download again even if the artifact already exists
		#[arg(long)]
		force: bool,
	},

	/// Download a model and load it with one of the framework loaders
	Load {
		/// Model entry directory containing the manifest
		model_dir: PathBuf,

		/// Which loader to use
		#[arg(long, value_enum)]
		kind: LoaderKind,

		/// Weights file name, or the directory the archive unpacks to
		#[arg(long)]
		output: Option<PathBuf>,

		/// Weights are shipped inside `model.zip` (weights loader only)
		#[arg(long)]
		zipped: bool,

		/// Device to load onto (e.g., "auto", "cpu" or "cuda:0")
		#[arg(long, default_value = "auto")]
		device: String,

		/// Sentence to run through the loaded pipeline or transformer
		#[arg(long)]
		text: Option<String>,

		/// Download again even if the artifact already exists
		#[arg(long)]
		force: bool,
	},

	/// List pulled models
	List,

	/// Work with the dataset catalog
	Dataset {
		#[command(subcommand)]
		command: DatasetCommands,
	},
}

#[derive(Subcommand)]
pub enum DatasetCommands {
	/// List datasets in the catalog
	List {
		/// Refresh the catalog index
		#[arg(long)]
		force: bool,
	},

	/// Download a dataset into the base directory
	Pull {
		/// Dataset name from the catalog
		name: String,

		/// Download again even if the file already exists
		#[arg(long)]
		force: bool,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LoaderKind {
	/// Raw state dict (safetensors or PyTorch pickle)
	Weights,
	/// Text-processing pipeline (tokenizer.json)
	Pipeline,
	/// Pretrained BERT-family encoder with its tokenizer
	Transformer,
	/// BERT with a masked language-modelling head (`--text` fills a trailing mask)
	MaskedLm,
	/// BERT with a sequence-classification head (`--text` is labelled)
	Classifier,
}

impl LoaderKind {
	pub fn default_output(&self) -> &'static str {
		match self {
			LoaderKind::Weights => "model.safetensors",
			LoaderKind::Pipeline | LoaderKind::Transformer | LoaderKind::MaskedLm | LoaderKind::Classifier => "model",
		}
	}
}
