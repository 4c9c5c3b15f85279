use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use crate::marketplace::error::MarketplaceError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// `manifest.json` at the root of every module version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Dependency name to requirement (`"*"` or an exact version)
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Files shipped with the module, relative to its root. Empty means everything.
    #[serde(default)]
    pub files: Vec<String>,
}

impl ModuleManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            dependencies: BTreeMap::new(),
            files: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.dependencies.insert(name.into(), requirement.into());
        self
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MarketplaceError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MarketplaceError::io(path, e))?;

        let manifest: ModuleManifest = serde_json::from_str(&contents).map_err(|e| MarketplaceError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        manifest.validate().map_err(|reason| MarketplaceError::InvalidManifest {
            path: path.to_path_buf(),
            reason,
        })?;

        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_name(&self.name) {
            return Err(format!("invalid module name '{}'", self.name));
        }
        if self.version.trim().is_empty() {
            return Err("version cannot be empty".to_string());
        }
        for dep in self.dependencies.keys() {
            if !is_valid_name(dep) {
                return Err(format!("invalid dependency name '{}'", dep));
            }
        }
        for file in &self.files {
            let p = Path::new(file);
            if p.is_absolute() || p.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
                return Err(format!("file '{}' escapes the module directory", file));
            }
        }
        Ok(())
    }
}

/// Module names double as directory names
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `"*"` (or empty) accepts any version; anything else must match exactly
pub fn version_matches(requirement: &str, version: &str) -> bool {
    let req = requirement.trim();
    req.is_empty() || req == "*" || req.trim_start_matches('=') == version
}

/// Dotted versions compared segment by segment, numerically where both sides are numbers
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements() {
        assert!(version_matches("*", "1.2.3"));
        assert!(version_matches("", "1.2.3"));
        assert!(version_matches("1.2.3", "1.2.3"));
        assert!(version_matches("=1.2.3", "1.2.3"));
        assert!(!version_matches("1.2.4", "1.2.3"));
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn manifest_validation() {
        assert!(ModuleManifest::new("auth", "1.0.0").validate().is_ok());
        assert!(ModuleManifest::new("../auth", "1.0.0").validate().is_err());
        assert!(ModuleManifest::new("auth", " ").validate().is_err());

        let mut m = ModuleManifest::new("auth", "1.0.0");
        m.files.push("../../etc/passwd".into());
        assert!(m.validate().is_err());
    }

    #[test]
    fn manifest_defaults_from_json() {
        let m: ModuleManifest = serde_json::from_str(r#"{"name":"auth","version":"1.0.0"}"#).unwrap();
        assert!(m.dependencies.is_empty());
        assert!(m.files.is_empty());
        assert_eq!(m.description, "");
    }
}
