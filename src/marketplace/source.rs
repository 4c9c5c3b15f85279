use std::fs;
use std::path::{Path, PathBuf};

use crate::marketplace::error::MarketplaceError;
use crate::marketplace::manifest::{compare_versions, version_matches, ModuleManifest, MANIFEST_FILE};

/// Where installable module versions come from
pub trait ModuleSource: Send + Sync {
    /// Available versions of `name`, oldest first
    fn versions(&self, name: &str) -> Result<Vec<String>, MarketplaceError>;

    fn manifest(&self, name: &str, version: &str) -> Result<ModuleManifest, MarketplaceError>;

    /// Copy the module's files into `dest`, which already exists and is empty
    fn fetch(&self, manifest: &ModuleManifest, dest: &Path) -> Result<(), MarketplaceError>;

    /// Newest version satisfying `requirement`
    fn select(&self, name: &str, requirement: &str) -> Result<ModuleManifest, MarketplaceError> {
        let version = self
            .versions(name)?
            .into_iter()
            .filter(|v| version_matches(requirement, v))
            .max_by(|a, b| compare_versions(a, b))
            .ok_or_else(|| MarketplaceError::ModuleNotFound {
                name: name.to_string(),
                version: Some(requirement.to_string()).filter(|r| r != "*"),
            })?;
        self.manifest(name, &version)
    }
}

/// Modules laid out as `<root>/<name>/<version>/manifest.json`
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn version_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }
}

impl ModuleSource for DirectorySource {
    fn versions(&self, name: &str) -> Result<Vec<String>, MarketplaceError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| MarketplaceError::io(&dir, e))? {
            let entry = entry.map_err(|e| MarketplaceError::io(&dir, e))?;
            if entry.path().join(MANIFEST_FILE).is_file() {
                versions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        versions.sort_by(|a, b| compare_versions(a, b));
        Ok(versions)
    }

    fn manifest(&self, name: &str, version: &str) -> Result<ModuleManifest, MarketplaceError> {
        let path = self.version_dir(name, version).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(MarketplaceError::ModuleNotFound {
                name: name.to_string(),
                version: Some(version.to_string()),
            });
        }

        let manifest = ModuleManifest::from_file(&path)?;
        if manifest.name != name || manifest.version != version {
            return Err(MarketplaceError::InvalidManifest {
                path,
                reason: format!(
                    "declares {} {} but is stored as {} {}",
                    manifest.name, manifest.version, name, version
                ),
            });
        }
        Ok(manifest)
    }

    fn fetch(&self, manifest: &ModuleManifest, dest: &Path) -> Result<(), MarketplaceError> {
        let src = self.version_dir(&manifest.name, &manifest.version);

        if manifest.files.is_empty() {
            return copy_dir(&src, dest);
        }

        copy_file(&src.join(MANIFEST_FILE), &dest.join(MANIFEST_FILE))?;
        for file in &manifest.files {
            let from = src.join(file);
            let to = dest.join(file);
            if from.is_dir() {
                copy_dir(&from, &to)?;
            } else {
                copy_file(&from, &to)?;
            }
        }
        Ok(())
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), MarketplaceError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| MarketplaceError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| MarketplaceError::io(from, e))?;
    Ok(())
}

/// Recursive copy; `to` is created if missing
pub(crate) fn copy_dir(from: &Path, to: &Path) -> Result<(), MarketplaceError> {
    fs::create_dir_all(to).map_err(|e| MarketplaceError::io(to, e))?;
    for entry in fs::read_dir(from).map_err(|e| MarketplaceError::io(from, e))? {
        let entry = entry.map_err(|e| MarketplaceError::io(from, e))?;
        let path = entry.path();
        let target = to.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &target)?;
        } else {
            fs::copy(&path, &target).map_err(|e| MarketplaceError::io(&path, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::publish;
    use tempfile::TempDir;

    #[test]
    fn lists_and_selects_versions() {
        let dir = TempDir::new().unwrap();
        publish(dir.path(), &ModuleManifest::new("auth", "1.2.0"));
        publish(dir.path(), &ModuleManifest::new("auth", "1.10.0"));
        publish(dir.path(), &ModuleManifest::new("auth", "1.9.1"));

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.versions("auth").unwrap(), vec!["1.2.0", "1.9.1", "1.10.0"]);
        assert_eq!(source.select("auth", "*").unwrap().version, "1.10.0");
        assert_eq!(source.select("auth", "1.9.1").unwrap().version, "1.9.1");
        assert!(matches!(
            source.select("auth", "3.0.0"),
            Err(MarketplaceError::ModuleNotFound { .. })
        ));
        assert!(source.versions("missing").unwrap().is_empty());
    }

    #[test]
    fn manifest_must_match_its_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth").join("1.0.0");
        fs::create_dir_all(&path).unwrap();
        let wrong = ModuleManifest::new("auth", "2.0.0");
        fs::write(path.join(MANIFEST_FILE), serde_json::to_string(&wrong).unwrap()).unwrap();

        let source = DirectorySource::new(dir.path());
        assert!(matches!(
            source.manifest("auth", "1.0.0"),
            Err(MarketplaceError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn fetch_copies_listed_files() {
        let dir = TempDir::new().unwrap();
        let mut manifest = ModuleManifest::new("auth", "1.0.0");
        manifest.files = vec!["lib/auth.js".into()];
        let version_dir = publish(dir.path(), &manifest);
        fs::create_dir_all(version_dir.join("lib")).unwrap();
        fs::write(version_dir.join("lib/auth.js"), "module.exports = {}").unwrap();
        fs::write(version_dir.join("notes.txt"), "not shipped").unwrap();

        let dest = TempDir::new().unwrap();
        DirectorySource::new(dir.path()).fetch(&manifest, dest.path()).unwrap();

        assert!(dest.path().join(MANIFEST_FILE).is_file());
        assert!(dest.path().join("lib/auth.js").is_file());
        assert!(!dest.path().join("notes.txt").exists());
    }
}
