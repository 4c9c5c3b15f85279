//! Named application modules, constructed on first use.
//!
//! Factories are registered explicitly at startup; nothing registers itself.
//! `get` runs a module's factory at most once and hands out the shared
//! instance afterwards. A factory that fails leaves the slot empty so a
//! later `get` can try again.

mod builtin;

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub use builtin::MODULE_VERSION;

pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        MODULE_VERSION
    }

    /// Status and settings worth showing to an operator; never secrets
    fn describe(&self) -> Value;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Module already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Module '{name}' failed to initialize: {reason}")]
    Initialization { name: String, reason: String },
}

type Factory = Box<dyn Fn() -> Result<Arc<dyn Module>, RegistryError> + Send + Sync>;

struct Slot {
    factory: Factory,
    instance: OnceCell<Arc<dyn Module>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Default)]
pub struct ModuleRegistry {
    slots: RwLock<BTreeMap<String, Arc<Slot>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Arc<dyn Module>, RegistryError> + Send + Sync + 'static,
    {
        self.insert(
            name,
            Slot {
                factory: Box::new(factory),
                instance: OnceCell::new(),
            },
        )
    }

    /// Register something that already exists; it counts as loaded
    pub fn register_instance(&self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        let name = module.name().to_string();
        let instance = OnceCell::new();
        let _ = instance.set(module.clone());

        self.insert(
            &name,
            Slot {
                factory: Box::new(move || Ok(module.clone())),
                instance,
            },
        )
    }

    fn insert(&self, name: &str, slot: Slot) -> Result<(), RegistryError> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        if slots.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        slots.insert(name.to_string(), Arc::new(slot));
        tracing::debug!("Registered module '{}'", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Module>, RegistryError> {
        let slot = {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            slots
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?
        };

        // The registry lock is released; a slow factory only blocks callers of this module
        slot.instance
            .get_or_try_init(|| {
                tracing::info!("Loading module '{}'", name);
                (slot.factory)()
            })
            .cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.get(name).map(|s| s.instance.get().is_some()).unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots.keys().cloned().collect()
    }

    /// Every registered module; only loaded ones are described
    pub fn list(&self) -> Vec<ModuleInfo> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .map(|(name, slot)| match slot.instance.get() {
                Some(module) => ModuleInfo {
                    name: name.clone(),
                    loaded: true,
                    version: Some(module.version().to_string()),
                    details: Some(module.describe()),
                },
                None => ModuleInfo {
                    name: name.clone(),
                    loaded: false,
                    version: None,
                    details: None,
                },
            })
            .collect()
    }
}
