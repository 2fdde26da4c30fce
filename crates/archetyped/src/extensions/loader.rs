//! Extension Loader
//!
//! Turns extension manifests into definitions the orchestrator can load.
//! Locating and loading an extension's code is delegated to a
//! [`ClassResolver`]; the loader decides trust and assembles the definition.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{ExtensionClass, ExtensionDefinition, Trust};

/// Loader errors
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to resolve extension \"{package_path}\": {message}")]
    Resolve {
        package_path: String,
        message: String,
    },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
}

pub type LoaderResult<T> = Result<T, LoaderError>;

/// Declarative description of one extension, as found in host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    pub package_path: String,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    /// Overrides the loader default when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted: Option<bool>,
}

impl ExtensionManifest {
    pub fn new(package_path: impl Into<String>) -> Self {
        Self {
            package_path: package_path.into(),
            ..Default::default()
        }
    }

    /// Parse a manifest from JSON
    pub fn from_json(json: &str) -> LoaderResult<Self> {
        serde_json::from_str(json).map_err(|e| LoaderError::InvalidManifest(e.to_string()))
    }
}

/// Produces the class handle for a manifest.
///
/// `trusted` is the trust decision already taken for this load; an
/// implementation runs untrusted code isolated from the host.
pub trait ClassResolver {
    fn resolve(&self, manifest: &ExtensionManifest, trusted: bool) -> anyhow::Result<ExtensionClass>;
}

/// Extension loader configuration
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Trust applied to manifests that do not say
    pub default_trust: bool,
}

/// Extension loader
pub struct ExtensionLoader<R> {
    resolver: R,
    config: LoaderConfig,
}

impl<R: ClassResolver> ExtensionLoader<R> {
    /// Create a loader with default configuration
    pub fn new(resolver: R) -> Self {
        Self::with_config(resolver, LoaderConfig::default())
    }

    pub fn with_config(resolver: R, config: LoaderConfig) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load one manifest under an explicit trust indicator.
    ///
    /// A dynamic indicator is evaluated here, once per load.
    pub fn load(&self, manifest: &ExtensionManifest, trust: &Trust) -> LoaderResult<ExtensionDefinition> {
        if manifest.package_path.trim().is_empty() {
            return Err(LoaderError::InvalidManifest("missing packagePath".into()));
        }

        let trusted = trust.evaluate();
        debug!(package = %manifest.package_path, trusted, "Resolving extension class");

        let class = self
            .resolver
            .resolve(manifest, trusted)
            .map_err(|e| LoaderError::Resolve {
                package_path: manifest.package_path.clone(),
                message: format!("{:#}", e),
            })?;

        let mut definition = ExtensionDefinition::new(manifest.package_path.clone());
        definition.version = manifest.version.clone();
        definition.config = if manifest.config.is_null() {
            serde_json::json!({})
        } else {
            manifest.config.clone()
        };
        definition.consumes = manifest.consumes.clone();
        definition.provides = manifest.provides.clone();
        definition.trust = Trust::from(trusted);
        definition.class = Some(class);
        Ok(definition)
    }

    /// Load every manifest, using each manifest's own trust flag or the default
    pub fn load_all(&self, manifests: &[ExtensionManifest]) -> LoaderResult<Vec<ExtensionDefinition>> {
        manifests
            .iter()
            .map(|manifest| {
                let trust = Trust::from(manifest.trusted.unwrap_or(self.config.default_trust));
                self.load(manifest, &trust).inspect_err(|e| {
                    warn!(package = %manifest.package_path, error = %e, "Extension failed to load");
                })
            })
            .collect()
    }
}
