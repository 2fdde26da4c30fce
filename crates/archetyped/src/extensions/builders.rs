//! Fluent Builder APIs for Extension Definitions
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use archetyped::extensions::{Extension, ServiceHandle, ServiceMap};
//! use archetyped::extensions::builders::ExtensionDefinitionBuilder;
//!
//! struct Math;
//!
//! impl Extension for Math {
//!     fn services(&self) -> ServiceMap {
//!         ServiceMap::from([("math".to_string(), ServiceHandle::new(()))])
//!     }
//! }
//!
//! let definition = ExtensionDefinitionBuilder::new("./extensions/math")
//!     .version("1.0.0")
//!     .provide("math")
//!     .trusted(true)
//!     .class_fn(|_definition, _imports| Ok(Arc::new(Math)))
//!     .build();
//!
//! assert_eq!(definition.name(), "math");
//! ```

use std::sync::Arc;

use super::types::{
    DefinitionResult, Extension, ExtensionClass, ExtensionDefinition, ExtensionFactory, Imports,
    Trust,
};

/// Builder for creating `ExtensionDefinition` instances with fluent API
#[derive(Debug, Clone)]
pub struct ExtensionDefinitionBuilder {
    definition: ExtensionDefinition,
}

impl ExtensionDefinitionBuilder {
    /// Create a new definition builder
    ///
    /// # Arguments
    /// * `package_path` - Path-like identifier (e.g., "./extensions/calculator")
    pub fn new(package_path: impl Into<String>) -> Self {
        Self {
            definition: ExtensionDefinition::new(package_path),
        }
    }

    /// Set the package version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.definition.version = Some(version.into());
        self
    }

    /// Set the configuration passed to the constructor
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.definition.config = config;
        self
    }

    /// Add a provided service name (duplicates are ignored)
    pub fn provide(mut self, service: impl Into<String>) -> Self {
        let service = service.into();
        if !self.definition.provides.contains(&service) {
            self.definition.provides.push(service);
        }
        self
    }

    /// Add multiple provided service names
    pub fn provides(self, services: impl IntoIterator<Item = impl Into<String>>) -> Self {
        services.into_iter().fold(self, |builder, service| builder.provide(service))
    }

    /// Add a consumed service name (duplicates are ignored)
    pub fn consume(mut self, service: impl Into<String>) -> Self {
        let service = service.into();
        if !self.definition.consumes.contains(&service) {
            self.definition.consumes.push(service);
        }
        self
    }

    /// Add multiple consumed service names
    pub fn consumes(self, services: impl IntoIterator<Item = impl Into<String>>) -> Self {
        services.into_iter().fold(self, |builder, service| builder.consume(service))
    }

    /// Mark the extension as trusted or untrusted
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.definition.trust = Trust::from(trusted);
        self
    }

    /// Set the trust indicator
    pub fn trust(mut self, trust: Trust) -> Self {
        self.definition.trust = trust;
        self
    }

    /// Set the class handle
    pub fn class(mut self, class: ExtensionClass) -> Self {
        self.definition.class = Some(class);
        self
    }

    /// Set the class handle from a factory value
    pub fn factory(self, factory: impl ExtensionFactory + 'static) -> Self {
        self.class(Arc::new(factory))
    }

    /// Set the class handle from a constructor closure
    pub fn class_fn<F, E>(self, constructor: F) -> Self
    where
        F: Fn(&ExtensionDefinition, Imports) -> anyhow::Result<Arc<E>> + Send + Sync + 'static,
        E: Extension + 'static,
    {
        self.factory(
            move |definition: &ExtensionDefinition,
                  imports: Imports|
                  -> anyhow::Result<Arc<dyn Extension>> {
                let extension: Arc<dyn Extension> = constructor(definition, imports)?;
                Ok(extension)
            },
        )
    }

    /// Build the definition without validating it
    pub fn build(self) -> ExtensionDefinition {
        self.definition
    }

    /// Try to build, returning error on validation failure
    pub fn try_build(self) -> DefinitionResult<ExtensionDefinition> {
        self.definition.validate()?;
        Ok(self.definition)
    }
}
