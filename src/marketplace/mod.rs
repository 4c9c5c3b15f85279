// Marketplace: installs versioned modules from a source into the project

pub mod error;
pub mod manifest;
pub mod resolver;
pub mod source;
pub mod store;

pub use error::MarketplaceError;
pub use manifest::{compare_versions, version_matches, ModuleManifest, MANIFEST_FILE};
pub use resolver::{resolve, resolve_against, Resolution};
pub use source::{DirectorySource, ModuleSource};
pub use store::{ConfigStore, ModuleEntry, ProjectConfig};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::MarketplaceConfig;
use source::copy_dir;

const BACKUP_DIR: &str = ".backups";
const BACKUP_ENTRY: &str = "entry.json";
const BACKUP_FILES: &str = "files";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModule {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub dependencies: Vec<String>,
}

/// What a backup restores: the module's files (if it had any) and its config entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Backup {
    entry: ModuleEntry,
    has_files: bool,
}

pub struct Marketplace {
    source: Arc<dyn ModuleSource>,
    modules_dir: PathBuf,
    store: ConfigStore,
}

impl Marketplace {
    pub fn new(source: Arc<dyn ModuleSource>, modules_dir: impl Into<PathBuf>, store: ConfigStore) -> Self {
        Self {
            source,
            modules_dir: modules_dir.into(),
            store,
        }
    }

    pub fn from_config(config: &MarketplaceConfig) -> Self {
        Self::new(
            Arc::new(DirectorySource::new(&config.source_dir)),
            &config.modules_dir,
            ConfigStore::new(&config.config_file),
        )
    }

    pub fn source(&self) -> &dyn ModuleSource {
        self.source.as_ref()
    }

    pub fn list(&self) -> Result<Vec<InstalledModule>, MarketplaceError> {
        let config = self.store.load()?;
        Ok(config
            .modules
            .into_iter()
            .map(|(name, entry)| InstalledModule {
                name,
                version: entry.version,
                enabled: entry.enabled,
                dependencies: entry.dependencies.into_keys().collect(),
            })
            .collect())
    }

    /// Install order for `name` without touching anything
    pub fn plan(&self, name: &str, version: Option<&str>) -> Result<Resolution, MarketplaceError> {
        let root = self.source.select(name, version.unwrap_or("*"))?;
        resolve_against(&root, self.source.as_ref(), &self.store.load()?.installed())
    }

    /// Install a module and any dependencies that are not installed yet.
    /// Returns the modules that were newly installed, in install order.
    pub fn install(&self, name: &str, version: Option<&str>) -> Result<Vec<InstalledModule>, MarketplaceError> {
        let mut config = self.store.load()?;
        if let Some(entry) = config.modules.get(name) {
            return Err(MarketplaceError::AlreadyInstalled {
                name: name.to_string(),
                version: entry.version.clone(),
            });
        }

        let root = self.source.select(name, version.unwrap_or("*"))?;
        let resolution = resolve_against(&root, self.source.as_ref(), &config.installed())?;

        let to_install: Vec<ModuleManifest> = resolution
            .order
            .into_iter()
            .filter(|m| !config.modules.contains_key(&m.name))
            .collect();

        let mut created: Vec<PathBuf> = Vec::new();
        if let Err(e) = self.copy_in(&to_install, &mut config, &mut created) {
            tracing::warn!("Install of '{}' failed, removing partial files: {}", name, e);
            for dir in &created {
                let _ = fs::remove_dir_all(dir);
            }
            return Err(e);
        }

        for manifest in &to_install {
            tracing::info!("Installed {} {}", manifest.name, manifest.version);
        }
        Ok(to_install.iter().map(installed).collect())
    }

    /// Move an installed module to another version (newest when `version` is None).
    /// Missing dependencies of the new version are installed too.
    pub fn update(&self, name: &str, version: Option<&str>) -> Result<Vec<InstalledModule>, MarketplaceError> {
        let mut config = self.store.load()?;
        let current = config
            .modules
            .get(name)
            .cloned()
            .ok_or_else(|| MarketplaceError::NotInstalled(name.to_string()))?;

        let target = self.source.select(name, version.unwrap_or("*"))?;
        if target.version == current.version {
            tracing::info!("{} is already at {}", name, current.version);
            return Ok(Vec::new());
        }

        // Installed modules pinned to the current version would break
        for dependent in config.dependents_of(name) {
            let requirement = &config.modules[&dependent].dependencies[name];
            if !version_matches(requirement, &target.version) {
                return Err(MarketplaceError::VersionConflict {
                    module: name.to_string(),
                    required: requirement.clone(),
                    found: target.version.clone(),
                    required_by: dependent,
                });
            }
        }

        let mut others = config.installed();
        others.remove(name);
        let resolution = resolve_against(&target, self.source.as_ref(), &others)?;

        self.write_backup(name, &current)?;

        let changed: Vec<ModuleManifest> = resolution
            .order
            .into_iter()
            .filter(|m| m.name == name || !config.modules.contains_key(&m.name))
            .collect();

        let mut created: Vec<PathBuf> = Vec::new();
        if let Err(e) = self.copy_in(&changed, &mut config, &mut created) {
            tracing::warn!("Update of '{}' failed, restoring {}: {}", name, current.version, e);
            for dir in &created {
                let _ = fs::remove_dir_all(dir);
            }
            self.restore_files(name)?;
            return Err(e);
        }

        tracing::info!("Updated {} {} -> {}", name, current.version, target.version);
        Ok(changed.iter().map(installed).collect())
    }

    /// Remove a module nothing else depends on. The removed files are kept as a backup.
    pub fn uninstall(&self, name: &str) -> Result<(), MarketplaceError> {
        let mut config = self.store.load()?;
        let entry = config
            .modules
            .get(name)
            .cloned()
            .ok_or_else(|| MarketplaceError::NotInstalled(name.to_string()))?;

        let dependents = config.dependents_of(name);
        if !dependents.is_empty() {
            return Err(MarketplaceError::InUse {
                name: name.to_string(),
                dependents,
            });
        }

        self.write_backup(name, &entry)?;

        let dir = self.module_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| MarketplaceError::io(&dir, e))?;
        }

        config.modules.remove(name);
        if let Err(e) = self.store.save(&config) {
            self.restore_files(name)?;
            return Err(e);
        }

        tracing::info!("Uninstalled {} {}", name, entry.version);
        Ok(())
    }

    /// Restore the files and config entry saved by the last update or uninstall
    pub fn rollback(&self, name: &str) -> Result<InstalledModule, MarketplaceError> {
        let backup_dir = self.backup_dir(name);
        let entry_path = backup_dir.join(BACKUP_ENTRY);
        if !entry_path.is_file() {
            return Err(MarketplaceError::NoBackup(name.to_string()));
        }

        let raw = fs::read_to_string(&entry_path).map_err(|e| MarketplaceError::io(&entry_path, e))?;
        let backup: Backup = serde_json::from_str(&raw).map_err(|e| MarketplaceError::Config(e.to_string()))?;

        let mut config = self.store.load()?;
        for (dep, requirement) in &backup.entry.dependencies {
            match config.modules.get(dep) {
                Some(found) if version_matches(requirement, &found.version) => {}
                Some(found) => {
                    return Err(MarketplaceError::VersionConflict {
                        module: dep.clone(),
                        required: requirement.clone(),
                        found: found.version.clone(),
                        required_by: name.to_string(),
                    })
                }
                None => {
                    return Err(MarketplaceError::MissingDependency {
                        module: name.to_string(),
                        dependency: format!("{} {}", dep, requirement),
                    })
                }
            }
        }

        // Installed modules pinned to the current version would break
        for dependent in config.dependents_of(name) {
            let requirement = &config.modules[&dependent].dependencies[name];
            if !version_matches(requirement, &backup.entry.version) {
                return Err(MarketplaceError::VersionConflict {
                    module: name.to_string(),
                    required: requirement.clone(),
                    found: backup.entry.version.clone(),
                    required_by: dependent,
                });
            }
        }

        // Config first: a failed save leaves the current files untouched
        let previous = config.modules.insert(name.to_string(), backup.entry.clone());
        self.store.save(&config)?;

        if let Err(e) = self.restore_files(name) {
            tracing::warn!("Rollback of '{}' failed while restoring files: {}", name, e);
            match previous {
                Some(entry) => config.modules.insert(name.to_string(), entry),
                None => config.modules.remove(name),
            };
            if let Err(save_err) = self.store.save(&config) {
                tracing::error!("Could not restore config entry for '{}': {}", name, save_err);
            }
            return Err(e);
        }

        fs::remove_dir_all(&backup_dir).map_err(|e| MarketplaceError::io(&backup_dir, e))?;

        tracing::info!("Rolled back {} to {}", name, backup.entry.version);
        Ok(InstalledModule {
            name: name.to_string(),
            version: backup.entry.version,
            enabled: backup.entry.enabled,
            dependencies: backup.entry.dependencies.into_keys().collect(),
        })
    }

    /// Fetch each module into place and record it, then save the config once.
    /// Directories that did not exist before are pushed to `created`.
    fn copy_in(
        &self,
        manifests: &[ModuleManifest],
        config: &mut ProjectConfig,
        created: &mut Vec<PathBuf>,
    ) -> Result<(), MarketplaceError> {
        for manifest in manifests {
            let dest = self.module_dir(&manifest.name);
            if !dest.exists() {
                created.push(dest.clone());
            }
            self.fresh_dir(&dest)?;
            self.source.fetch(manifest, &dest)?;
            config
                .modules
                .insert(manifest.name.clone(), ModuleEntry::from_manifest(manifest));
        }
        self.store.save(config)
    }

    fn module_dir(&self, name: &str) -> PathBuf {
        self.modules_dir.join(name)
    }

    fn backup_dir(&self, name: &str) -> PathBuf {
        self.modules_dir.join(BACKUP_DIR).join(name)
    }

    fn fresh_dir(&self, dir: &Path) -> Result<(), MarketplaceError> {
        if dir.exists() {
            fs::remove_dir_all(dir).map_err(|e| MarketplaceError::io(dir, e))?;
        }
        fs::create_dir_all(dir).map_err(|e| MarketplaceError::io(dir, e))
    }

    /// Replaces any earlier backup of `name`
    fn write_backup(&self, name: &str, entry: &ModuleEntry) -> Result<(), MarketplaceError> {
        let backup_dir = self.backup_dir(name);
        self.fresh_dir(&backup_dir)?;

        let module_dir = self.module_dir(name);
        let has_files = module_dir.is_dir();
        if has_files {
            copy_dir(&module_dir, &backup_dir.join(BACKUP_FILES))?;
        }

        let backup = Backup {
            entry: entry.clone(),
            has_files,
        };
        let json = serde_json::to_string_pretty(&backup).map_err(|e| MarketplaceError::Config(e.to_string()))?;
        let path = backup_dir.join(BACKUP_ENTRY);
        fs::write(&path, json).map_err(|e| MarketplaceError::io(&path, e))?;

        tracing::debug!("Backed up {} {}", name, entry.version);
        Ok(())
    }

    fn restore_files(&self, name: &str) -> Result<(), MarketplaceError> {
        let dest = self.module_dir(name);
        let files = self.backup_dir(name).join(BACKUP_FILES);

        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(|e| MarketplaceError::io(&dest, e))?;
        }
        if files.is_dir() {
            copy_dir(&files, &dest)?;
        }
        Ok(())
    }
}

fn installed(manifest: &ModuleManifest) -> InstalledModule {
    InstalledModule {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        enabled: true,
        dependencies: manifest.dependencies.keys().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::publish;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        source_dir: PathBuf,
        modules_dir: PathBuf,
        market: Marketplace,
    }

    fn fixture(manifests: &[ModuleManifest]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let source_dir = dir.path().join("marketplace");
        let modules_dir = dir.path().join("modules");
        for m in manifests {
            let version_dir = publish(&source_dir, m);
            fs::write(version_dir.join("index.js"), format!("// {} {}", m.name, m.version)).unwrap();
        }
        let market = Marketplace::new(
            Arc::new(DirectorySource::new(&source_dir)),
            &modules_dir,
            ConfigStore::new(dir.path().join("nexus.json")),
        );
        Fixture {
            _dir: dir,
            source_dir,
            modules_dir,
            market,
        }
    }

    fn file(f: &Fixture, name: &str) -> String {
        fs::read_to_string(f.modules_dir.join(name).join("index.js")).unwrap()
    }

    #[test]
    fn install_brings_dependencies() {
        let f = fixture(&[
            ModuleManifest::new("database", "1.0.0"),
            ModuleManifest::new("auth", "1.0.0").with_dependency("database", "*"),
        ]);

        let installed = f.market.install("auth", None).unwrap();
        let names: Vec<_> = installed.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["database", "auth"]);

        assert_eq!(file(&f, "auth"), "// auth 1.0.0");
        assert_eq!(f.market.list().unwrap().len(), 2);

        assert!(matches!(
            f.market.install("auth", None),
            Err(MarketplaceError::AlreadyInstalled { .. })
        ));
    }

    #[test]
    fn failed_install_leaves_nothing_behind() {
        let f = fixture(&[
            ModuleManifest::new("database", "1.0.0"),
            ModuleManifest::new("auth", "1.0.0").with_dependency("database", "*"),
        ]);
        // Break the second fetch after the first module was copied
        let mut broken = ModuleManifest::new("auth", "1.0.0").with_dependency("database", "*");
        broken.files = vec!["missing.js".into()];
        publish(&f.source_dir, &broken);

        assert!(f.market.install("auth", None).is_err());
        assert!(!f.modules_dir.join("database").exists());
        assert!(!f.modules_dir.join("auth").exists());
        assert!(f.market.list().unwrap().is_empty());
    }

    #[test]
    fn update_then_rollback() {
        let f = fixture(&[ModuleManifest::new("auth", "1.0.0"), ModuleManifest::new("auth", "2.0.0")]);

        f.market.install("auth", Some("1.0.0")).unwrap();
        let changed = f.market.update("auth", None).unwrap();
        assert_eq!(changed[0].version, "2.0.0");
        assert_eq!(file(&f, "auth"), "// auth 2.0.0");

        let restored = f.market.rollback("auth").unwrap();
        assert_eq!(restored.version, "1.0.0");
        assert_eq!(file(&f, "auth"), "// auth 1.0.0");
        assert_eq!(f.market.list().unwrap()[0].version, "1.0.0");

        assert!(matches!(f.market.rollback("auth"), Err(MarketplaceError::NoBackup(_))));
    }

    #[test]
    fn update_to_same_version_is_a_no_op() {
        let f = fixture(&[ModuleManifest::new("auth", "1.0.0")]);
        f.market.install("auth", None).unwrap();
        assert!(f.market.update("auth", None).unwrap().is_empty());
        assert!(matches!(f.market.rollback("auth"), Err(MarketplaceError::NoBackup(_))));
    }

    #[test]
    fn update_respects_pinned_dependents() {
        let f = fixture(&[
            ModuleManifest::new("core", "1.0.0"),
            ModuleManifest::new("core", "2.0.0"),
            ModuleManifest::new("app", "1.0.0").with_dependency("core", "1.0.0"),
        ]);
        f.market.install("app", None).unwrap();

        assert!(matches!(
            f.market.update("core", Some("2.0.0")),
            Err(MarketplaceError::VersionConflict { ref required_by, .. }) if required_by == "app"
        ));
        assert_eq!(file(&f, "core"), "// core 1.0.0");
    }

    #[test]
    fn rollback_respects_dependents_of_the_new_version() {
        let f = fixture(&[
            ModuleManifest::new("core", "1.0.0"),
            ModuleManifest::new("core", "2.0.0"),
            ModuleManifest::new("app", "1.0.0").with_dependency("core", "2.0.0"),
        ]);
        f.market.install("core", Some("1.0.0")).unwrap();
        f.market.update("core", Some("2.0.0")).unwrap();
        f.market.install("app", None).unwrap();

        assert!(matches!(
            f.market.rollback("core"),
            Err(MarketplaceError::VersionConflict { ref required_by, ref found, .. })
                if required_by == "app" && found == "1.0.0"
        ));
        assert_eq!(file(&f, "core"), "// core 2.0.0");
        let versions: Vec<_> = f.market.list().unwrap().into_iter().map(|m| m.version).collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
    }

    #[test]
    fn rollback_keeps_files_when_config_save_fails() {
        let f = fixture(&[ModuleManifest::new("auth", "1.0.0"), ModuleManifest::new("auth", "2.0.0")]);
        f.market.install("auth", Some("1.0.0")).unwrap();
        f.market.update("auth", None).unwrap();

        // A directory where the temp file goes makes the save fail
        let tmp = f.modules_dir.parent().unwrap().join("nexus.json.tmp");
        fs::create_dir_all(&tmp).unwrap();

        assert!(f.market.rollback("auth").is_err());
        assert_eq!(file(&f, "auth"), "// auth 2.0.0");
        assert_eq!(f.market.list().unwrap()[0].version, "2.0.0");

        fs::remove_dir_all(&tmp).unwrap();
        assert_eq!(f.market.rollback("auth").unwrap().version, "1.0.0");
        assert_eq!(file(&f, "auth"), "// auth 1.0.0");
    }

    #[test]
    fn uninstall_refuses_while_in_use() {
        let f = fixture(&[
            ModuleManifest::new("database", "1.0.0"),
            ModuleManifest::new("auth", "1.0.0").with_dependency("database", "*"),
        ]);
        f.market.install("auth", None).unwrap();

        match f.market.uninstall("database") {
            Err(MarketplaceError::InUse { dependents, .. }) => assert_eq!(dependents, vec!["auth"]),
            other => panic!("unexpected: {:?}", other),
        }

        f.market.uninstall("auth").unwrap();
        assert!(!f.modules_dir.join("auth").exists());
        f.market.uninstall("database").unwrap();
        assert!(f.market.list().unwrap().is_empty());

        assert!(matches!(f.market.uninstall("auth"), Err(MarketplaceError::NotInstalled(_))));
    }

    #[test]
    fn rollback_restores_an_uninstalled_module() {
        let f = fixture(&[ModuleManifest::new("auth", "1.0.0")]);
        f.market.install("auth", None).unwrap();
        f.market.uninstall("auth").unwrap();

        f.market.rollback("auth").unwrap();
        assert_eq!(file(&f, "auth"), "// auth 1.0.0");
        assert_eq!(f.market.list().unwrap()[0].name, "auth");
    }

    #[test]
    fn plan_does_not_install() {
        let f = fixture(&[
            ModuleManifest::new("database", "1.0.0"),
            ModuleManifest::new("auth", "1.0.0").with_dependency("database", "*"),
        ]);
        assert_eq!(f.market.plan("auth", None).unwrap().names(), vec!["database", "auth"]);
        assert!(f.market.list().unwrap().is_empty());
    }
}
