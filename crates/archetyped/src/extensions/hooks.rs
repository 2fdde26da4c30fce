//! Extension Lifecycle Hooks
//!
//! Ordered callback lists for the two application-wide lifecycle phases.
//! One entry is queued per successfully instantiated extension, in
//! instantiation order.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::Extension;

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle Phase
// ─────────────────────────────────────────────────────────────────────────────

/// Phase at which queued hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// After the application fires `ready`
    AppReady,
    /// When the application is destroyed
    Destroy,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::AppReady => write!(f, "app_ready"),
            LifecyclePhase::Destroy => write!(f, "destroy"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook Lists
// ─────────────────────────────────────────────────────────────────────────────

/// On-ready and destroy hooks queued by load passes
#[derive(Default)]
pub struct LifecycleHooks {
    on_ready: Vec<Arc<dyn Extension>>,
    destroy: Vec<Arc<dyn Extension>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an instance in both lists
    pub fn push(&mut self, extension: Arc<dyn Extension>) {
        self.on_ready.push(extension.clone());
        self.destroy.push(extension);
    }

    /// Run every hook queued for `phase` in order, returning how many ran
    pub fn run(&self, phase: LifecyclePhase) -> usize {
        let hooks = match phase {
            LifecyclePhase::AppReady => &self.on_ready,
            LifecyclePhase::Destroy => &self.destroy,
        };

        for extension in hooks {
            match phase {
                LifecyclePhase::AppReady => extension.on_app_ready(),
                LifecyclePhase::Destroy => extension.destroy(),
            }
        }

        debug!(%phase, count = hooks.len(), "Ran lifecycle hooks");
        hooks.len()
    }

    pub fn len(&self, phase: LifecyclePhase) -> usize {
        match phase {
            LifecyclePhase::AppReady => self.on_ready.len(),
            LifecyclePhase::Destroy => self.destroy.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_ready.is_empty() && self.destroy.is_empty()
    }

    pub fn clear(&mut self) {
        self.on_ready.clear();
        self.destroy.clear();
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_ready", &self.on_ready.len())
            .field("destroy", &self.destroy.len())
            .finish()
    }
}
