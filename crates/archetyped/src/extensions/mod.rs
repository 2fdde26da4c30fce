//! Extension System
//!
//! The pieces the orchestrator is built from: the extension contract, the
//! dependency graph resolver, the service registry, lifecycle hooks, the event
//! bus and the loader interface.
//!
//! # Builders
//!
//! Use the fluent builder to declare an extension:
//!
//! ```rust
//! use std::sync::Arc;
//! use archetyped::extensions::{Extension, ExtensionDefinition, ServiceMap};
//!
//! struct Worker;
//!
//! impl Extension for Worker {
//!     fn services(&self) -> ServiceMap {
//!         ServiceMap::new()
//!     }
//! }
//!
//! let worker = ExtensionDefinition::builder("./extensions/worker")
//!     .consume("hub")
//!     .class_fn(|_definition, _imports| Ok(Arc::new(Worker)))
//!     .try_build()
//!     .unwrap();
//!
//! assert!(worker.provides.is_empty());
//! ```

mod types;
mod registry;
mod hooks;
mod loader;
pub mod builders;
pub mod events;
pub mod graph;

// Re-export public types
pub use types::{
    DefinitionError, DefinitionResult, Extension, ExtensionClass, ExtensionDefinition,
    ExtensionFactory, Imports, LoadedExtension, ServiceHandle, ServiceMap, Trust,
};

pub use registry::{Provenance, ServiceEntry, ServiceRegistry};
pub use hooks::{LifecycleHooks, LifecyclePhase};
pub use loader::{
    ClassResolver, ExtensionLoader, ExtensionManifest, LoaderConfig, LoaderError, LoaderResult,
};

pub use builders::ExtensionDefinitionBuilder;
pub use events::{AppEvent, ErrorEvent, EventBus, EventKind, Hub, Listener, SubscriptionId};
pub use graph::{DependencyGraph, GraphError, GraphResult, Resolution, resolve_definitions};
