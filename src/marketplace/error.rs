use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Module '{name}' not found in source{}", version.as_deref().map(|v| format!(" (version {})", v)).unwrap_or_default())]
    ModuleNotFound { name: String, version: Option<String> },

    #[error("Module '{module}' depends on '{dependency}', which is not available")]
    MissingDependency { module: String, dependency: String },

    #[error("Version conflict for '{module}': '{required_by}' requires {required}, but {found} is selected")]
    VersionConflict {
        module: String,
        required: String,
        found: String,
        required_by: String,
    },

    #[error("Circular dependency between: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Module '{0}' is not installed")]
    NotInstalled(String),

    #[error("Module '{name}' {version} is already installed")]
    AlreadyInstalled { name: String, version: String },

    #[error("Module '{name}' is required by: {}", dependents.join(", "))]
    InUse { name: String, dependents: Vec<String> },

    #[error("No backup available for '{0}'")]
    NoBackup(String),

    #[error("Invalid manifest {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config store error: {0}")]
    Config(String),
}

impl MarketplaceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MarketplaceError::Io {
            path: path.into(),
            source,
        }
    }
}
