//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use archetyped::extensions::{Extension, ExtensionDefinition, ServiceHandle, ServiceMap};
use archetyped::{AppEvent, Archetyped, ErrorEvent};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Entries starting with `prefix`
pub fn entries_with(log: &Log, prefix: &str) -> Vec<String> {
    entries(log)
        .into_iter()
        .filter(|entry| entry.starts_with(prefix))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

pub struct MathService;

impl MathService {
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }
}

pub struct CalculatorService {
    math: Arc<MathService>,
}

impl CalculatorService {
    pub fn sum(&self, values: &[i64]) -> i64 {
        values.iter().fold(0, |total, &value| self.math.add(total, value))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// Exposes a fixed service map and records its lifecycle calls
pub struct Recording {
    name: String,
    services: ServiceMap,
    log: Log,
}

impl Recording {
    pub fn new<'a>(
        name: &str,
        services: impl IntoIterator<Item = (&'a str, ServiceHandle)>,
        log: &Log,
    ) -> Self {
        log.lock().unwrap().push(format!("construct:{}", name));
        Self {
            name: name.to_string(),
            services: services
                .into_iter()
                .map(|(service, handle)| (service.to_string(), handle))
                .collect(),
            log: log.clone(),
        }
    }
}

impl Extension for Recording {
    fn services(&self) -> ServiceMap {
        self.services.clone()
    }

    fn on_app_ready(&self) {
        self.log.lock().unwrap().push(format!("ready:{}", self.name));
    }

    fn destroy(&self) {
        self.log.lock().unwrap().push(format!("destroy:{}", self.name));
    }
}

pub fn math(log: &Log) -> ExtensionDefinition {
    let log = log.clone();
    ExtensionDefinition::builder("./extensions/math")
        .version("1.0.0")
        .provide("math")
        .class_fn(move |_definition, _imports| {
            Ok(Arc::new(Recording::new(
                "math",
                [("math", ServiceHandle::new(MathService))],
                &log,
            )))
        })
        .build()
}

pub fn calculator(log: &Log) -> ExtensionDefinition {
    let log = log.clone();
    ExtensionDefinition::builder("./extensions/calculator")
        .consume("math")
        .provide("calculator")
        .class_fn(move |_definition, imports| {
            let math = imports.require::<MathService>("math")?;
            Ok(Arc::new(Recording::new(
                "calculator",
                [("calculator", ServiceHandle::new(CalculatorService { math }))],
                &log,
            )))
        })
        .build()
}

/// Provides each name as a `String` service holding the name itself
pub fn provider(
    path: &str,
    consumes: &[&str],
    provides: &'static [&'static str],
    log: &Log,
) -> ExtensionDefinition {
    let log = log.clone();
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    ExtensionDefinition::builder(path)
        .consumes(consumes.iter().copied())
        .provides(provides.iter().copied())
        .class_fn(move |_definition, _imports| {
            let services = provides
                .iter()
                .map(|service| (*service, ServiceHandle::new(service.to_string())));
            Ok(Arc::new(Recording::new(&name, services, &log)))
        })
        .build()
}

/// A definition whose constructor always fails
pub fn failing(path: &str, provides: &'static [&'static str]) -> ExtensionDefinition {
    ExtensionDefinition::builder(path)
        .provides(provides.iter().copied())
        .class_fn(|_definition, _imports| {
            Err::<Arc<Recording>, _>(anyhow::anyhow!("constructor exploded"))
        })
        .build()
}

// ─────────────────────────────────────────────────────────────────────────────
// Event recording
// ─────────────────────────────────────────────────────────────────────────────

/// Record every event as `kind` or `kind:subject`
pub fn record_events(app: &Archetyped) -> Log {
    let log = new_log();
    let sink = log.clone();
    app.events().subscribe_all(move |event| {
        let entry = match event {
            AppEvent::Ready(_) => "ready".to_string(),
            AppEvent::Service { name, .. } => format!("service:{}", name),
            AppEvent::Extension(extension) => format!("extension:{}", extension.name()),
            AppEvent::Error(_) => "error".to_string(),
        };
        sink.lock().unwrap().push(entry);
    });
    log
}

/// Keep a copy of every error event
pub fn record_errors(app: &Archetyped) -> Arc<Mutex<Vec<ErrorEvent>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    app.events().subscribe_all(move |event| {
        if let AppEvent::Error(error) = event {
            sink.lock().unwrap().push((*error).clone());
        }
    });
    errors
}

/// Record the registered service names at every `ready`
pub fn record_ready_services(app: &Archetyped) -> Arc<Mutex<Vec<Vec<String>>>> {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = snapshots.clone();
    app.events().subscribe_all(move |event| {
        if let AppEvent::Ready(app) = event {
            let names: Vec<String> = app.services().names().into_iter().map(String::from).collect();
            sink.lock().unwrap().push(names);
        }
    });
    snapshots
}
