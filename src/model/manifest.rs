use crate::error::{Error, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const PLACEHOLDER_LINK: &str = "<link to pretrained model>";

/// The `result.json` descriptor of a model entry.
///
/// Only `Link` is consumed at runtime; the remaining keys are documentation
/// for the zoo and are kept verbatim, in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    link: String,
    fields: Map<String, Value>,
}

impl Manifest {
    pub const LINK_KEY: &'static str = "Link";

    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ManifestNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        Self::parse(&content).map_err(|reason| Error::ManifestMalformed {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(content: &[u8]) -> std::result::Result<Self, String> {
        let value: Value = serde_json::from_slice(content).map_err(|e| e.to_string())?;

        let Value::Object(fields) = value else {
            return Err("expected a JSON object".to_string());
        };

        let link = match fields.get(Self::LINK_KEY) {
            Some(Value::String(link)) if !link.trim().is_empty() => link.trim().to_string(),
            Some(Value::String(_)) => return Err("'Link' is empty".to_string()),
            Some(_) => return Err("'Link' must be a string".to_string()),
            None => return Err("missing 'Link' field".to_string()),
        };

        Ok(Self { link, fields })
    }

    /// Placeholder manifest written by `forest init`.
    pub fn template() -> Self {
        let fields: Map<String, Value> = [
            ("Title", json!("Enter title here")),
            ("Tags", json!([])),
            ("Architecture", json!("Explain the architecture type")),
            ("Publisher", json!(["<name1>", "<name2>"])),
            ("Links to Pub Tabs", json!([])),
            ("Problem Domain", json!("Give problem domain Egs Image, Text")),
            ("Model Format", json!("Format of the model")),
            ("Language", json!("Language")),
            ("Dataset", json!("docs/dataset.md")),
            ("Overview", json!("docs/overview.md")),
            ("Preprocessing", json!("templates/<template_filename>")),
            (Self::LINK_KEY, json!(PLACEHOLDER_LINK)),
            ("References", json!("docs/references.md")),
            ("Usage", json!("templates/<usage_filename>")),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Self {
            link: PLACEHOLDER_LINK.to_string(),
            fields,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.fields)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn title(&self) -> Option<&str> {
        self.field("Title").and_then(Value::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}
