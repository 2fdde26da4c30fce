//! Application Orchestrator
//!
//! `Archetyped` owns the cumulative definition list, the service registry,
//! the lifecycle hooks and the event bus, and drives load passes over them.
//!
//! A load pass instantiates every resolved definition in order, injecting the
//! services its `consumes` names from the registry, registers what it
//! `provides`, and finishes with `ready`. Failures inside a pass never abort
//! it: they are reported through the `error` event and the pass moves on.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, HotPlugStrategy};
use crate::error::{AppError, AppResult};
use crate::extensions::{
    AppEvent, DependencyGraph, ErrorEvent, EventBus, EventKind, ExtensionDefinition, GraphError,
    Hub, Imports, LifecycleHooks, LifecyclePhase, LoadedExtension, Provenance, ServiceHandle,
    ServiceRegistry, SubscriptionId,
};

/// The extension orchestrator
pub struct Archetyped {
    config: AppConfig,
    /// Every definition ever passed in, in arrival order
    definitions: Vec<ExtensionDefinition>,
    /// Indices into `definitions` in load order
    order: Vec<usize>,
    /// `definitions` projected through `order`
    extensions: Vec<ExtensionDefinition>,
    /// Resolution failure waiting for `start()` to report it
    pending_error: Option<GraphError>,
    registry: ServiceRegistry,
    hooks: LifecycleHooks,
    /// Instances of the most recent pass
    loaded: Vec<LoadedExtension>,
    /// Instances kept across passes, keyed by definition slot
    reusable: HashMap<usize, LoadedExtension>,
    events: Arc<EventBus>,
    hub: Hub,
    started: bool,
}

impl Archetyped {
    /// Create an application with default configuration
    pub fn new(definitions: Vec<ExtensionDefinition>) -> AppResult<Self> {
        Self::with_config(definitions, AppConfig::default())
    }

    /// Create an application.
    ///
    /// Definitions are validated and resolved here, but nothing is
    /// instantiated and no event fires until [`start`](Self::start), unless
    /// `config.auto_start` is set.
    pub fn with_config(
        mut definitions: Vec<ExtensionDefinition>,
        config: AppConfig,
    ) -> AppResult<Self> {
        config.validate()?;
        check_definitions(&mut definitions)?;

        let events = Arc::new(EventBus::new());
        let hub = Hub::new(events.clone());
        let registry =
            ServiceRegistry::with_builtin(config.hub_service.clone(), ServiceHandle::new(hub.clone()));

        let mut app = Self {
            config,
            definitions,
            order: Vec::new(),
            extensions: Vec::new(),
            pending_error: None,
            registry,
            hooks: LifecycleHooks::new(),
            loaded: Vec::new(),
            reusable: HashMap::new(),
            events,
            hub,
            started: false,
        };
        app.pending_error = app.resolve();

        info!(
            definitions = app.definitions.len(),
            resolved = app.extensions.len(),
            "Created application"
        );

        if app.config.auto_start {
            app.start();
        }

        Ok(app)
    }

    /// Run the first load pass.
    ///
    /// Reports a pending resolution failure as an `error` event first. Does
    /// nothing once the application has started.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        if let Some(error) = self.pending_error.take() {
            self.emit_resolution_error(error);
        }
        self.run_pass();
    }

    /// Hot-plug more extensions.
    ///
    /// The whole cumulative set is resolved again and a full pass runs. If a
    /// new definition fails validation nothing is added.
    pub fn load(&mut self, mut definitions: Vec<ExtensionDefinition>) -> AppResult<()> {
        check_definitions(&mut definitions)?;

        info!(count = definitions.len(), "Loading additional extensions");
        self.definitions.extend(definitions);

        // A load supersedes a first pass that never ran.
        self.started = true;
        self.pending_error = None;

        if let Some(error) = self.resolve() {
            self.emit_resolution_error(error);
        }
        self.run_pass();
        Ok(())
    }

    /// Run every queued destroy hook, then forget all queued hooks.
    ///
    /// Returns how many hooks ran.
    pub fn destroy(&mut self) -> usize {
        let count = self.hooks.run(LifecyclePhase::Destroy);
        self.hooks.clear();
        self.reusable.clear();
        info!(count, "Destroyed application");
        count
    }

    /// Subscribe to one kind of application event
    pub fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(&AppEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(kind, listener)
    }

    /// Resolved definitions in load order; empty after a failed resolution
    pub fn extensions(&self) -> &[ExtensionDefinition] {
        &self.extensions
    }

    /// Every definition passed in so far
    pub fn definitions(&self) -> &[ExtensionDefinition] {
        &self.definitions
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Instances created or reused by the most recent pass
    pub fn loaded(&self) -> &[LoadedExtension] {
        &self.loaded
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Load pass
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve the cumulative definition list, returning the failure if any
    fn resolve(&mut self) -> Option<GraphError> {
        let graph = DependencyGraph::new(&self.definitions)
            .with_builtins([self.config.hub_service.as_str()]);
        match graph.resolve() {
            Ok(order) => {
                self.extensions = order.iter().map(|&i| self.definitions[i].clone()).collect();
                self.order = order;
                debug!(count = self.order.len(), "Resolved load order");
                None
            }
            Err(e) => {
                error!(service = e.service(), error = %e, "Dependency resolution failed");
                self.order.clear();
                self.extensions.clear();
                Some(e)
            }
        }
    }

    fn run_pass(&mut self) {
        self.loaded.clear();

        for index in self.order.clone() {
            if let Some(loaded) = self.load_extension(index) {
                self.register(&loaded);
                self.loaded.push(loaded);
            }
        }

        info!(
            loaded = self.loaded.len(),
            services = self.registry.len(),
            "Application ready"
        );
        self.events.emit(&AppEvent::Ready(&*self));
        self.hooks.run(LifecyclePhase::AppReady);
    }

    /// Instantiate (or reuse) the definition at `index`
    fn load_extension(&mut self, index: usize) -> Option<LoadedExtension> {
        let reuse = self.config.hot_plug == HotPlugStrategy::ReuseExisting;
        if reuse {
            if let Some(existing) = self.reusable.get(&index) {
                debug!(package = existing.name(), "Reusing extension instance");
                return Some(existing.clone());
            }
        }

        let definition = self.definitions[index].clone();
        let Some(class) = definition.class.clone() else {
            self.emit_error(ErrorEvent::Instantiation {
                message: "definition has no class".into(),
                definition,
            });
            return None;
        };

        let imports = self.imports_for(&definition);
        match class.construct(&definition, imports) {
            Ok(instance) => {
                debug!(package = definition.name(), "Instantiated extension");
                self.hooks.push(instance.clone());
                let loaded = LoadedExtension::new(definition, instance);
                if reuse {
                    self.reusable.insert(index, loaded.clone());
                }
                Some(loaded)
            }
            Err(e) => {
                error!(package = %definition.package_path, error = %e, "Extension constructor failed");
                self.emit_error(ErrorEvent::Instantiation {
                    message: format!("{:#}", e),
                    definition,
                });
                None
            }
        }
    }

    /// Collect the services a definition consumes from the registry
    fn imports_for(&self, definition: &ExtensionDefinition) -> Imports {
        let mut imports = Imports::new();
        for name in &definition.consumes {
            match self.registry.get(name) {
                Some(service) => imports.insert(name.clone(), service.clone()),
                None => {
                    warn!(package = definition.name(), service = %name, "Consumed service is not registered");
                    imports.mark_missing(name.clone());
                }
            }
        }
        imports
    }

    /// Register the services an instance declared in `provides`
    fn register(&mut self, loaded: &LoadedExtension) {
        let definition = loaded.definition();
        if definition.provides.is_empty() {
            return;
        }

        let package = definition.name();
        self.registry.ensure_package(package);
        let services = loaded.instance().services();

        for name in &definition.provides {
            let Some(service) = services.get(name) else {
                warn!(package, service = %name, "Extension did not expose a declared service");
                self.emit_error(ErrorEvent::ServiceContract {
                    service: name.clone(),
                    package: package.to_string(),
                    extension: loaded.clone(),
                });
                continue;
            };

            self.registry
                .set(name, service.clone(), Provenance::of(definition));
            debug!(package, service = %name, "Registered service");
            self.events.emit(&AppEvent::Service {
                name,
                service,
                extension: loaded,
            });
        }

        self.events.emit(&AppEvent::Extension(loaded));
    }

    fn emit_resolution_error(&self, error: GraphError) {
        self.emit_error(ErrorEvent::Resolution {
            extensions: Vec::new(),
            error,
        });
    }

    fn emit_error(&self, event: ErrorEvent) {
        self.events.emit(&AppEvent::Error(&event));
    }
}

impl fmt::Debug for Archetyped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetyped")
            .field("config", &self.config)
            .field("definitions", &self.definitions.len())
            .field("order", &self.order)
            .field("services", &self.registry.names())
            .field("hooks", &self.hooks)
            .field("started", &self.started)
            .finish()
    }
}

/// Validate the definitions that have not been checked yet
fn check_definitions(definitions: &mut [ExtensionDefinition]) -> AppResult<()> {
    for definition in definitions.iter_mut().filter(|d| !d.checked) {
        definition.validate()?;
        definition.checked = true;
    }
    Ok(())
}

/// Create and start an application, failing on the first error.
///
/// The app is always started here, whatever `auto_start` says. If the first
/// pass emits an `error` event, destroy hooks run and the error is returned.
pub fn create_app(
    definitions: Vec<ExtensionDefinition>,
    config: AppConfig,
) -> AppResult<Archetyped> {
    let mut app = Archetyped::with_config(definitions, config.with_auto_start(false))?;

    let first_error = Arc::new(Mutex::new(None::<String>));
    let sink = first_error.clone();
    let subscription = app.events().once(EventKind::Error, move |event| {
        if let AppEvent::Error(error) = event {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
        }
    });

    app.start();
    app.events().unsubscribe(subscription);

    let first_error = first_error
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(message) = first_error {
        error!(error = %message, "Application failed to start");
        app.destroy();
        return Err(AppError::startup(message));
    }

    Ok(app)
}
