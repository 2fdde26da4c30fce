//! Application Events
//!
//! Typed, synchronous publish/subscribe for the orchestrator's lifecycle
//! notifications. Listeners run in subscription order, against a snapshot of
//! the subscriptions present when the event is emitted, so a listener may
//! subscribe or unsubscribe while it runs. The lock guards the listener list
//! only; listeners are called after it is released.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::graph::GraphError;
use super::types::{ExtensionDefinition, LoadedExtension, ServiceHandle};
use crate::app::Archetyped;

// ─────────────────────────────────────────────────────────────────────────────
// Event Types
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of application event, used to pick listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Ready,
    Service,
    Extension,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Ready => write!(f, "ready"),
            EventKind::Service => write!(f, "service"),
            EventKind::Extension => write!(f, "extension"),
            EventKind::Error => write!(f, "error"),
        }
    }
}

/// An event as delivered to listeners
#[derive(Debug, Clone, Copy)]
pub enum AppEvent<'a> {
    /// A load pass completed
    Ready(&'a Archetyped),
    /// A service was registered
    Service {
        name: &'a str,
        service: &'a ServiceHandle,
        extension: &'a LoadedExtension,
    },
    /// An extension with declared services finished registering
    Extension(&'a LoadedExtension),
    /// A non-fatal failure
    Error(&'a ErrorEvent),
}

impl AppEvent<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            AppEvent::Ready(_) => EventKind::Ready,
            AppEvent::Service { .. } => EventKind::Service,
            AppEvent::Extension(_) => EventKind::Extension,
            AppEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Failures reported through the `error` event
#[derive(Debug, Clone, Error)]
pub enum ErrorEvent {
    /// The definition set could not be ordered; nothing from it was loaded
    #[error("{error}")]
    Resolution {
        /// Always empty: a failed resolution yields no order
        extensions: Vec<ExtensionDefinition>,
        error: GraphError,
    },

    #[error("Failed to instantiate extension \"{}\": {message}", .definition.package_path)]
    Instantiation {
        definition: ExtensionDefinition,
        message: String,
    },

    /// The extension declared a service it did not expose
    #[error("Service \"{service}\" is missing in package \"{package}\"")]
    ServiceContract {
        service: String,
        package: String,
        extension: LoadedExtension,
    },
}

impl ErrorEvent {
    /// The definition the failure belongs to, if any
    pub fn definition(&self) -> Option<&ExtensionDefinition> {
        match self {
            Self::Resolution { .. } => None,
            Self::Instantiation { definition, .. } => Some(definition),
            Self::ServiceContract { extension, .. } => Some(extension.definition()),
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Bus
// ─────────────────────────────────────────────────────────────────────────────

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Shared listener callback
pub type Listener = Arc<dyn Fn(&AppEvent<'_>) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every kind
    kind: Option<EventKind>,
    once: bool,
    listener: Listener,
}

impl Subscription {
    fn matches(&self, kind: EventKind) -> bool {
        self.kind.is_none_or(|wanted| wanted == kind)
    }
}

/// Synchronous event bus
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for one kind of event
    pub fn subscribe(
        &self,
        kind: EventKind,
        listener: impl Fn(&AppEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add(Some(kind), false, Arc::new(listener))
    }

    /// Listen for every event
    pub fn subscribe_all(
        &self,
        listener: impl Fn(&AppEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add(None, false, Arc::new(listener))
    }

    /// Listen for the next event of one kind only
    pub fn once(
        &self,
        kind: EventKind,
        listener: impl Fn(&AppEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add(Some(kind), true, Arc::new(listener))
    }

    /// Remove a subscription; returns whether it was present
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver an event to the listeners subscribed right now
    pub fn emit(&self, event: &AppEvent<'_>) {
        let kind = event.kind();
        let targets: Vec<Arc<Subscription>> = {
            let mut subscriptions = self.lock();
            let targets: Vec<_> = subscriptions
                .iter()
                .filter(|subscription| subscription.matches(kind))
                .cloned()
                .collect();
            subscriptions.retain(|subscription| !(subscription.once && subscription.matches(kind)));
            targets
        };

        for subscription in targets {
            (subscription.listener)(event);
        }
    }

    fn add(&self, kind: Option<EventKind>, once: bool, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Arc::new(Subscription {
            id,
            kind,
            once,
            listener,
        }));
        id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Subscription>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hub
// ─────────────────────────────────────────────────────────────────────────────

/// The built-in service that gives extensions access to application events
#[derive(Debug, Clone)]
pub struct Hub {
    bus: Arc<EventBus>,
}

impl Hub {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(&AppEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(kind, listener)
    }

    pub fn once(
        &self,
        kind: EventKind,
        listener: impl Fn(&AppEvent<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.once(kind, listener)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}
