use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// A model entry whose artifact has been fetched at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulledModel {
    pub name: String,
    pub link: String,
    pub model_dir: PathBuf,
    pub artifact_path: PathBuf,
    pub pulled_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModelRegistry {
    models: HashMap<String, PulledModel>,
}

impl ModelRegistry {
    pub fn load(config: &Config) -> Result<Self> {
        if !config.registry_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config.registry_path)?;
        let registry: ModelRegistry = toml::from_str(&content)?;
        Ok(registry)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = config.registry_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&config.registry_path, content)?;
        Ok(())
    }

    pub fn record(&mut self, model: PulledModel) {
        self.models.insert(model.name.clone(), model);
    }

    pub fn get_model(&self, name: &str) -> Result<&PulledModel> {
        self.models
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("No pulled model named '{}'", name)))
    }

    /// Pulled models ordered by name.
    pub fn list_models(&self) -> Vec<&PulledModel> {
        let mut models: Vec<&PulledModel> = self.models.values().collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }
}
