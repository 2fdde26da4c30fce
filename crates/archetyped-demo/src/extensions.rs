//! Demo extensions: `math` and a `calculator` built on top of it.

use std::sync::Arc;

use archetyped::extensions::{Extension, ExtensionDefinition, ServiceHandle, ServiceMap};
use serde_json::json;
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// Arithmetic primitives
#[derive(Debug)]
pub struct Math;

impl Math {
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    pub fn multiply(&self, a: i64, b: i64) -> i64 {
        a * b
    }
}

/// Chained calculations over the `math` service
#[derive(Debug)]
pub struct Calculator {
    math: Arc<Math>,
}

impl Calculator {
    /// Begin a calculation at `value`
    pub fn start(&self, value: i64) -> Calculation {
        Calculation {
            math: self.math.clone(),
            value,
        }
    }
}

/// A running calculation
#[derive(Debug)]
pub struct Calculation {
    math: Arc<Math>,
    value: i64,
}

impl Calculation {
    pub fn add(mut self, value: i64) -> Self {
        self.value = self.math.add(self.value, value);
        self
    }

    pub fn times(mut self, value: i64) -> Self {
        self.value = self.math.multiply(self.value, value);
        self
    }

    pub fn equals(self) -> i64 {
        self.value
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extensions
// ─────────────────────────────────────────────────────────────────────────────

struct MathExtension {
    math: Arc<Math>,
}

impl Extension for MathExtension {
    fn services(&self) -> ServiceMap {
        ServiceMap::from([("math".to_string(), ServiceHandle::from_arc(self.math.clone()))])
    }

    fn on_app_ready(&self) {
        info!(package = "math", "Extension ready");
    }

    fn destroy(&self) {
        info!(package = "math", "Extension destroyed");
    }
}

struct CalculatorExtension {
    calculator: Arc<Calculator>,
}

impl Extension for CalculatorExtension {
    fn services(&self) -> ServiceMap {
        ServiceMap::from([(
            "calculator".to_string(),
            ServiceHandle::from_arc(self.calculator.clone()),
        )])
    }

    fn destroy(&self) {
        info!(package = "calculator", "Extension destroyed");
    }
}

pub fn math() -> ExtensionDefinition {
    ExtensionDefinition::builder("./extensions/math")
        .version("1.0.0")
        .provide("math")
        .trusted(true)
        .class_fn(|_definition, _imports| {
            Ok(Arc::new(MathExtension {
                math: Arc::new(Math),
            }))
        })
        .build()
}

pub fn calculator() -> ExtensionDefinition {
    ExtensionDefinition::builder("./extensions/calculator")
        .version("1.0.0")
        .config(json!({ "precision": 0 }))
        .consume("math")
        .provide("calculator")
        .trusted(true)
        .class_fn(|_definition, imports| {
            let math = imports.require::<Math>("math")?;
            Ok(Arc::new(CalculatorExtension {
                calculator: Arc::new(Calculator { math }),
            }))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculation_chain() {
        let calculator = Calculator {
            math: Arc::new(Math),
        };
        assert_eq!(calculator.start(2).add(3).times(4).equals(), 20);
    }

    #[test]
    fn test_definitions_are_valid() {
        assert!(math().validate().is_ok());
        assert!(calculator().validate().is_ok());
        assert_eq!(calculator().consumes, vec!["math"]);
    }
}
