//! Archetyped - Extension Orchestration Core
//!
//! Loads a set of extensions that declare the services they provide and
//! consume, in an order where every provider comes before its consumers.
//!
//! # Modules
//!
//! - **extensions** - extension contract, dependency graph, service registry,
//!   lifecycle hooks, events and the loader interface
//! - **app** - the `Archetyped` orchestrator and `create_app`
//! - **config** - orchestrator options
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use archetyped::{Archetyped, AppEvent, EventKind};
//! use archetyped::extensions::{Extension, ExtensionDefinition, ServiceHandle, ServiceMap};
//!
//! struct Math;
//!
//! impl Extension for Math {
//!     fn services(&self) -> ServiceMap {
//!         ServiceMap::from([("math".to_string(), ServiceHandle::new(40u32))])
//!     }
//! }
//!
//! let math = ExtensionDefinition::builder("./extensions/math")
//!     .provide("math")
//!     .class_fn(|_definition, _imports| Ok(Arc::new(Math)))
//!     .build();
//!
//! let mut app = Archetyped::new(vec![math]).unwrap();
//! app.on(EventKind::Ready, |event| {
//!     if let AppEvent::Ready(app) = event {
//!         assert!(app.services().contains("math"));
//!     }
//! });
//! app.start();
//!
//! let math = app.services().get("math").unwrap().downcast::<u32>().unwrap();
//! assert_eq!(*math + 2, 42);
//! ```

pub mod extensions;

mod app;
mod config;
mod error;

pub use app::{Archetyped, create_app};
pub use config::{AppConfig, ConfigValidationError, HotPlugStrategy};
pub use error::{AppError, AppResult};

pub use extensions::{AppEvent, ErrorEvent, EventBus, EventKind, Hub};
