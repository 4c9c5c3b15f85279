//! Dependency resolution for marketplace modules.
//!
//! Dependencies are collected breadth-first through a [`ModuleSource`], one
//! version per module name. The install order is a topological sort of the
//! resulting graph (Kahn's algorithm), dependencies first, with ties broken
//! by name so the same graph always yields the same order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use crate::marketplace::error::MarketplaceError;
use crate::marketplace::manifest::{version_matches, ModuleManifest};
use crate::marketplace::source::ModuleSource;

#[derive(Debug, Clone)]
pub struct Resolution {
    /// Modules in install order (dependencies first)
    pub order: Vec<ModuleManifest>,
}

impl Resolution {
    pub fn names(&self) -> Vec<String> {
        self.order.iter().map(|m| m.name.clone()).collect()
    }
}

pub fn resolve(root: &ModuleManifest, source: &dyn ModuleSource) -> Result<Resolution, MarketplaceError> {
    resolve_against(root, source, &BTreeMap::new())
}

/// Like [`resolve`], but modules in `installed` keep their installed version
pub fn resolve_against(
    root: &ModuleManifest,
    source: &dyn ModuleSource,
    installed: &BTreeMap<String, ModuleManifest>,
) -> Result<Resolution, MarketplaceError> {
    let mut selected: BTreeMap<String, ModuleManifest> = BTreeMap::new();
    selected.insert(root.name.clone(), root.clone());

    let mut pending: VecDeque<String> = VecDeque::from([root.name.clone()]);
    while let Some(name) = pending.pop_front() {
        let manifest = selected[&name].clone();

        for (dep, requirement) in &manifest.dependencies {
            if let Some(existing) = selected.get(dep) {
                if !version_matches(requirement, &existing.version) {
                    return Err(MarketplaceError::VersionConflict {
                        module: dep.clone(),
                        required: requirement.clone(),
                        found: existing.version.clone(),
                        required_by: name.clone(),
                    });
                }
                continue;
            }

            if let Some(current) = installed.get(dep) {
                if !version_matches(requirement, &current.version) {
                    return Err(MarketplaceError::VersionConflict {
                        module: dep.clone(),
                        required: requirement.clone(),
                        found: current.version.clone(),
                        required_by: name.clone(),
                    });
                }
                selected.insert(dep.clone(), current.clone());
                pending.push_back(dep.clone());
                continue;
            }

            let dep_manifest = source.select(dep, requirement).map_err(|e| match e {
                MarketplaceError::ModuleNotFound { .. } => MarketplaceError::MissingDependency {
                    module: name.clone(),
                    dependency: format!("{} {}", dep, requirement),
                },
                other => other,
            })?;

            debug!("{} requires {} {} -> {}", name, dep, requirement, dep_manifest.version);
            selected.insert(dep.clone(), dep_manifest);
            pending.push_back(dep.clone());
        }
    }

    let names = topological_sort(&selected)?;
    let order = names
        .into_iter()
        .filter_map(|name| selected.remove(&name))
        .collect();

    Ok(Resolution { order })
}

fn topological_sort(modules: &BTreeMap<String, ModuleManifest>) -> Result<Vec<String>, MarketplaceError> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, manifest) in modules {
        in_degree.insert(name.as_str(), manifest.dependencies.len());
        for dep in manifest.dependencies.keys() {
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(modules.len());
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());

        for &dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if order.len() != modules.len() {
        let blocked: BTreeSet<&str> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name)
            .collect();
        // Modules that only wait on a cycle are blocked but not part of it
        let cycle: Vec<String> = blocked
            .iter()
            .filter(|name| reaches_itself(name, modules, &blocked))
            .map(|name| name.to_string())
            .collect();
        return Err(MarketplaceError::CircularDependency(cycle));
    }

    Ok(order)
}

/// True if following dependencies from `start` inside `within` leads back to it
fn reaches_itself(start: &str, modules: &BTreeMap<String, ModuleManifest>, within: &BTreeSet<&str>) -> bool {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut stack: Vec<&str> = vec![start];

    while let Some(name) = stack.pop() {
        let Some(manifest) = modules.get(name) else {
            continue;
        };
        for dep in manifest.dependencies.keys() {
            let dep = dep.as_str();
            if dep == start {
                return true;
            }
            if within.contains(dep) && seen.insert(dep) {
                stack.push(dep);
            }
        }
    }
    false
}
