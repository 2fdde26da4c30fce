//! Service Registry
//!
//! Maps service names to the services that extensions expose, together with
//! where each one came from. Seeded with the built-in hub entry.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{ExtensionDefinition, ServiceHandle};

/// Where a registered service came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Package name (last component of the package path)
    pub package: String,
    pub path: String,
    pub version: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Provenance {
    /// Provenance for a service registered by `definition`
    pub fn of(definition: &ExtensionDefinition) -> Self {
        Self {
            package: definition.name().to_string(),
            path: definition.package_path.clone(),
            version: definition.version.clone(),
            registered_at: Utc::now(),
        }
    }
}

/// A registered service
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    pub service: ServiceHandle,
    /// `None` only for built-in services
    pub provenance: Option<Provenance>,
}

/// Service registry
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceEntry>,
    packages: BTreeMap<String, Vec<String>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with one built-in service
    pub fn with_builtin(name: impl Into<String>, service: ServiceHandle) -> Self {
        let mut registry = Self::new();
        registry.services.insert(
            name.into(),
            ServiceEntry {
                service,
                provenance: None,
            },
        );
        registry
    }

    /// Get a service by name
    pub fn get(&self, name: &str) -> Option<&ServiceHandle> {
        self.services.get(name).map(|entry| &entry.service)
    }

    /// Get a service and its provenance
    pub fn entry(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.get(name)
    }

    pub fn provenance(&self, name: &str) -> Option<&Provenance> {
        self.services
            .get(name)
            .and_then(|entry| entry.provenance.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Whether the service was seeded rather than registered by an extension
    pub fn is_builtin(&self, name: &str) -> bool {
        self.services
            .get(name)
            .is_some_and(|entry| entry.provenance.is_none())
    }

    /// Registered service names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Service names registered by a package, in registration order
    pub fn services_of(&self, package: &str) -> &[String] {
        self.packages
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Package names that registered at least one service
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Create the per-package index entry if absent
    pub(crate) fn ensure_package(&mut self, package: &str) {
        if !self.packages.contains_key(package) {
            self.packages.insert(package.to_string(), Vec::new());
        }
    }

    /// Register a service, overwriting any previous entry of the same name
    pub(crate) fn set(&mut self, name: &str, service: ServiceHandle, provenance: Provenance) {
        let names = self.packages.entry(provenance.package.clone()).or_default();
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }

        self.services.insert(
            name.to_string(),
            ServiceEntry {
                service,
                provenance: Some(provenance),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provenance(path: &str) -> Provenance {
        let mut definition = ExtensionDefinition::new(path);
        definition.version = Some("1.2.3".into());
        Provenance::of(&definition)
    }

    #[test]
    fn test_builtin_has_no_provenance() {
        let registry = ServiceRegistry::with_builtin("hub", ServiceHandle::new(()));
        assert!(registry.contains("hub"));
        assert!(registry.is_builtin("hub"));
        assert!(registry.provenance("hub").is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.packages().count(), 0);
    }

    #[test]
    fn test_set_records_provenance_and_package_index() {
        let mut registry = ServiceRegistry::new();
        registry.set("math", ServiceHandle::new(1u8), provenance("./plugins/math"));
        registry.set("stats", ServiceHandle::new(2u8), provenance("./plugins/math"));

        let provenance = registry.provenance("math").unwrap();
        assert_eq!(provenance.package, "math");
        assert_eq!(provenance.path, "./plugins/math");
        assert_eq!(provenance.version.as_deref(), Some("1.2.3"));
        assert!(!registry.is_builtin("math"));

        assert_eq!(registry.services_of("math"), ["math", "stats"]);
        assert!(registry.services_of("unknown").is_empty());
        assert_eq!(registry.names(), vec!["math", "stats"]);
    }

    #[test]
    fn test_set_overwrites_without_duplicating_index() {
        let mut registry = ServiceRegistry::new();
        let first = ServiceHandle::new(1u8);
        let second = ServiceHandle::new(2u8);

        registry.set("math", first.clone(), provenance("math"));
        registry.set("math", second.clone(), provenance("math"));

        assert!(registry.get("math").unwrap().same_service(&second));
        assert!(!registry.get("math").unwrap().same_service(&first));
        assert_eq!(registry.services_of("math"), ["math"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ensure_package_creates_empty_index() {
        let mut registry = ServiceRegistry::new();
        registry.ensure_package("worker");
        registry.ensure_package("worker");
        assert_eq!(registry.packages().collect::<Vec<_>>(), vec!["worker"]);
        assert!(registry.services_of("worker").is_empty());
        assert!(registry.is_empty());
    }
}
