//! Extension Type Definitions

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Definition validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Extension is missing the class handle {0}")]
    MissingClass(String),

    #[error("Extension is missing its package path {0}")]
    MissingPackagePath(String),

    #[error("Extension \"{package_path}\" declares an empty service name in its {field} list")]
    EmptyServiceName {
        package_path: String,
        field: &'static str,
    },
}

pub type DefinitionResult<T> = Result<T, DefinitionError>;

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// An opaque, shareable bag of functionality registered under a service name.
///
/// Consumers recover the concrete type with [`ServiceHandle::downcast`].
#[derive(Clone)]
pub struct ServiceHandle(Arc<dyn Any + Send + Sync>);

impl ServiceHandle {
    /// Wrap a value as a service
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wrap an already shared value without another allocation
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Get the service as its concrete type
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }

    /// Check the concrete type of the service
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Whether both handles point at the same service instance
    pub fn same_service(&self, other: &ServiceHandle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceHandle(..)")
    }
}

/// Services exposed by one extension, keyed by service name
pub type ServiceMap = HashMap<String, ServiceHandle>;

// ─────────────────────────────────────────────────────────────────────────────
// Extension contract
// ─────────────────────────────────────────────────────────────────────────────

/// The contract every loaded extension satisfies.
///
/// `on_app_ready` runs after the whole application fires `ready`;
/// `destroy` runs when the application is torn down. Both default to no-ops.
pub trait Extension: Send + Sync {
    /// Services this extension exposes, keyed by the names it declared in `provides`
    fn services(&self) -> ServiceMap;

    fn on_app_ready(&self) {}

    fn destroy(&self) {}
}

/// A constructible class handle for one extension.
///
/// The handle may come from in-process code or from a sandbox; the
/// orchestrator only ever calls `construct`.
pub trait ExtensionFactory: Send + Sync {
    fn construct(
        &self,
        definition: &ExtensionDefinition,
        imports: Imports,
    ) -> anyhow::Result<Arc<dyn Extension>>;
}

impl<F> ExtensionFactory for F
where
    F: Fn(&ExtensionDefinition, Imports) -> anyhow::Result<Arc<dyn Extension>> + Send + Sync,
{
    fn construct(
        &self,
        definition: &ExtensionDefinition,
        imports: Imports,
    ) -> anyhow::Result<Arc<dyn Extension>> {
        self(definition, imports)
    }
}

/// Shared class handle
pub type ExtensionClass = Arc<dyn ExtensionFactory>;

/// Whether an extension runs with full privileges.
///
/// `Dynamic` is evaluated when the extension is loaded, not when declared.
#[derive(Clone, Default)]
pub enum Trust {
    Trusted,
    #[default]
    Untrusted,
    Dynamic(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Trust {
    /// Create a trust indicator decided at load time
    pub fn dynamic(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(predicate))
    }

    /// Evaluate the trust indicator
    pub fn evaluate(&self) -> bool {
        match self {
            Self::Trusted => true,
            Self::Untrusted => false,
            Self::Dynamic(predicate) => predicate(),
        }
    }
}

impl From<bool> for Trust {
    fn from(trusted: bool) -> Self {
        if trusted { Self::Trusted } else { Self::Untrusted }
    }
}

impl fmt::Debug for Trust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trusted => f.write_str("Trusted"),
            Self::Untrusted => f.write_str("Untrusted"),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Definitions
// ─────────────────────────────────────────────────────────────────────────────

/// One configured extension, as handed over by the loading collaborator
#[derive(Clone)]
pub struct ExtensionDefinition {
    /// Path-like identifier; its last component names the package
    pub package_path: String,
    /// Package version, recorded as service provenance
    pub version: Option<String>,
    /// Opaque configuration passed to the constructor
    pub config: serde_json::Value,
    /// Service names this extension needs, in declaration order
    pub consumes: Vec<String>,
    /// Service names this extension registers, in declaration order
    pub provides: Vec<String>,
    /// Trust indicator
    pub trust: Trust,
    /// Constructible class handle
    pub class: Option<ExtensionClass>,
    /// Set once the definition passed validation
    pub checked: bool,
}

impl ExtensionDefinition {
    /// Create an empty definition for a package path
    pub fn new(package_path: impl Into<String>) -> Self {
        Self {
            package_path: package_path.into(),
            version: None,
            config: json!({}),
            consumes: Vec::new(),
            provides: Vec::new(),
            trust: Trust::default(),
            class: None,
            checked: false,
        }
    }

    /// Start a fluent builder
    pub fn builder(package_path: impl Into<String>) -> super::builders::ExtensionDefinitionBuilder {
        super::builders::ExtensionDefinitionBuilder::new(package_path)
    }

    /// Package name: the last component of the package path
    pub fn name(&self) -> &str {
        Path::new(&self.package_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.package_path)
    }

    /// Check the fields the orchestrator relies on
    pub fn validate(&self) -> DefinitionResult<()> {
        if self.package_path.trim().is_empty() {
            return Err(DefinitionError::MissingPackagePath(self.summary().to_string()));
        }

        if self.class.is_none() {
            return Err(DefinitionError::MissingClass(self.summary().to_string()));
        }

        for (field, names) in [("provides", &self.provides), ("consumes", &self.consumes)] {
            if names.iter().any(|name| name.trim().is_empty()) {
                return Err(DefinitionError::EmptyServiceName {
                    package_path: self.package_path.clone(),
                    field,
                });
            }
        }

        Ok(())
    }

    /// JSON summary used in diagnostics
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "packagePath": self.package_path,
            "version": self.version,
            "provides": self.provides,
            "consumes": self.consumes,
            "hasClass": self.class.is_some(),
        })
    }
}

impl fmt::Debug for ExtensionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDefinition")
            .field("package_path", &self.package_path)
            .field("version", &self.version)
            .field("config", &self.config)
            .field("consumes", &self.consumes)
            .field("provides", &self.provides)
            .field("trust", &self.trust)
            .field("class", &self.class.as_ref().map(|_| ".."))
            .field("checked", &self.checked)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Imports
// ─────────────────────────────────────────────────────────────────────────────

/// Services injected into an extension's constructor.
///
/// A consumed name whose provider has not registered is recorded as missing
/// instead of aborting the load pass.
#[derive(Debug, Clone, Default)]
pub struct Imports {
    services: HashMap<String, ServiceHandle>,
    missing: Vec<String>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, service: ServiceHandle) {
        self.services.insert(name.into(), service);
    }

    pub fn mark_missing(&mut self, name: impl Into<String>) {
        self.missing.push(name.into());
    }

    pub fn get(&self, name: &str) -> Option<&ServiceHandle> {
        self.services.get(name)
    }

    /// Get an import as its concrete type
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.services.get(name).and_then(|service| service.downcast::<T>())
    }

    /// Get an import as its concrete type, failing with a readable error
    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        let service = self
            .services
            .get(name)
            .ok_or_else(|| anyhow!("missing import \"{}\"", name))?;

        service.downcast::<T>().ok_or_else(|| {
            anyhow!(
                "import \"{}\" is not a {}",
                name,
                std::any::type_name::<T>()
            )
        })
    }

    /// Consumed names that had no registered provider
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loaded instances
// ─────────────────────────────────────────────────────────────────────────────

/// A live extension instance created during a load pass
#[derive(Clone)]
pub struct LoadedExtension {
    instance_id: Uuid,
    definition: ExtensionDefinition,
    instance: Arc<dyn Extension>,
    loaded_at: DateTime<Utc>,
}

impl LoadedExtension {
    pub fn new(definition: ExtensionDefinition, instance: Arc<dyn Extension>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            definition,
            instance,
            loaded_at: Utc::now(),
        }
    }

    /// Unique per construction; a re-instantiated extension gets a new ID
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn definition(&self) -> &ExtensionDefinition {
        &self.definition
    }

    pub fn instance(&self) -> &Arc<dyn Extension> {
        &self.instance
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("instance_id", &self.instance_id)
            .field("package_path", &self.definition.package_path)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}
