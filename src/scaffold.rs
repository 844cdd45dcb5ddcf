use crate::error::{Error, Result};
use crate::model::Manifest;
use std::fs;
use std::path::{Path, PathBuf};

const REFERENCES_MD: &str = "## References\n\
- [Add-Reference-Name](<Add-reference-link-here>)\n\
- ...\n";

const OVERVIEW_MD: &str = "## Model Overview\n\
Explain about your model with figures and maths.";

const DATASET_MD: &str = "## About Dataset\n\
Explain about the dataset used and give details about it.\n\
### **Links to database**\n\
- [Dataset-name](<Add-dataset-link-here>)\n\
- ...";

fn validate_name(name: &str) -> Result<&str> {
	let name = name.trim();
	if name.is_empty() {
		return Err(Error::InvalidInput("Model name cannot be empty".to_string()));
	}
	if name == "." || name == ".." || name.contains(['/', '\\']) {
		return Err(Error::InvalidInput(format!(
			"Model name '{}' must be a plain directory name",
			name
		)));
	}
	Ok(name)
}

/// Lays out a new model entry under `base_dir`:
///
/// ```text
/// <name>/
///   result.json
///   docs/{references,overview,dataset}.md
///   templates/
/// ```
pub fn create_model_entry(base_dir: &Path, name: &str, manifest_name: &str) -> Result<PathBuf> {
	let name = validate_name(name)?;
	let root = base_dir.join(name);

	if let Err(e) = fs::create_dir(&root) {
		return Err(match e.kind() {
			std::io::ErrorKind::AlreadyExists => Error::ScaffoldExists(root),
			_ => e.into(),
		});
	}

	tracing::info!("Creating config file");
	Manifest::template().save(&root.join(manifest_name))?;

	tracing::info!("Creating docs folder");
	let docs = root.join("docs");
	fs::create_dir(&docs)?;
	fs::write(docs.join("references.md"), REFERENCES_MD)?;
	fs::write(docs.join("overview.md"), OVERVIEW_MD)?;
	fs::write(docs.join("dataset.md"), DATASET_MD)?;

	tracing::info!("Creating templates folder");
	fs::create_dir(root.join("templates"))?;

	Ok(root)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_creates_layout() {
		let temp = TempDir::new().unwrap();
		let root = create_model_entry(temp.path(), "emotion-bert", "result.json").unwrap();

		assert_eq!(root, temp.path().join("emotion-bert"));
		assert!(root.join("templates").is_dir());
		for doc in ["references.md", "overview.md", "dataset.md"] {
			assert!(root.join("docs").join(doc).is_file(), "missing {doc}");
		}

		let manifest = Manifest::load(&root.join("result.json")).unwrap();
		assert_eq!(manifest, Manifest::template());

		let references = fs::read_to_string(root.join("docs/references.md")).unwrap();
		assert!(references.starts_with("## References\n- [Add-Reference-Name]"));
	}

	#[test]
	fn test_existing_directory_is_distinct_error() {
		let temp = TempDir::new().unwrap();
		fs::create_dir(temp.path().join("bert")).unwrap();
		fs::write(temp.path().join("bert/keep.txt"), "mine").unwrap();

		let err = create_model_entry(temp.path(), "bert", "result.json").unwrap_err();

		assert!(matches!(err, Error::ScaffoldExists(ref p) if p.ends_with("bert")));
		assert!(!temp.path().join("bert/result.json").exists());
		assert_eq!(fs::read_to_string(temp.path().join("bert/keep.txt")).unwrap(), "mine");
	}

	#[test]
	fn test_rejects_bad_names() {
		let temp = TempDir::new().unwrap();
		for name in ["", "   ", "..", "a/b", "a\\b"] {
			assert!(
				matches!(
					create_model_entry(temp.path(), name, "result.json"),
					Err(Error::InvalidInput(_))
				),
				"expected rejection for {name:?}"
			);
		}
	}

	#[test]
	fn test_trims_name() {
		let temp = TempDir::new().unwrap();
		let root = create_model_entry(temp.path(), "  spacy-ner \n", "result.json").unwrap();
		assert!(root.ends_with("spacy-ner"));
	}
}
