use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::marketplace::error::MarketplaceError;
use crate::marketplace::manifest::ModuleManifest;

/// Contents of `nexus.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleEntry>,
    /// Keys this crate does not manage survive a read-modify-write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl ModuleEntry {
    pub fn from_manifest(manifest: &ModuleManifest) -> Self {
        Self {
            version: manifest.version.clone(),
            enabled: true,
            installed_at: Utc::now(),
            dependencies: manifest.dependencies.clone(),
        }
    }
}

impl ProjectConfig {
    /// Installed modules as manifests, for dependency checks
    pub fn installed(&self) -> BTreeMap<String, ModuleManifest> {
        self.modules
            .iter()
            .map(|(name, entry)| {
                let mut manifest = ModuleManifest::new(name.clone(), entry.version.clone());
                manifest.dependencies = entry.dependencies.clone();
                (name.clone(), manifest)
            })
            .collect()
    }

    /// Installed modules that list `name` as a dependency
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.modules
            .iter()
            .filter(|(other, entry)| other.as_str() != name && entry.dependencies.contains_key(name))
            .map(|(other, _)| other.clone())
            .collect()
    }
}

/// JSON file store. Writes go to a sibling temp file which is then renamed over the original.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty config
    pub fn load(&self) -> Result<ProjectConfig, MarketplaceError> {
        if !self.path.exists() {
            return Ok(ProjectConfig::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| MarketplaceError::io(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(ProjectConfig::default());
        }

        serde_json::from_str(&contents)
            .map_err(|e| MarketplaceError::Config(format!("{}: {}", self.path.display(), e)))
    }

    pub fn save(&self, config: &ProjectConfig) -> Result<(), MarketplaceError> {
        let json = serde_json::to_string_pretty(config).map_err(|e| MarketplaceError::Config(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MarketplaceError::io(parent, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json + "\n").map_err(|e| MarketplaceError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| MarketplaceError::io(&self.path, e))?;
        Ok(())
    }

    /// Read, apply `f`, write back. Nothing is written if `f` fails.
    pub fn update<T, F>(&self, f: F) -> Result<T, MarketplaceError>
    where
        F: FnOnce(&mut ProjectConfig) -> Result<T, MarketplaceError>,
    {
        let mut config = self.load()?;
        let result = f(&mut config)?;
        self.save(&config)?;
        Ok(result)
    }
}
