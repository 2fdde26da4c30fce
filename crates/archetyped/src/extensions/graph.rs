//! Dependency Resolution
//!
//! Orders extension definitions so that the provider of every service is
//! instantiated before any extension that consumes it.
//!
//! The graph maps each provided service name to the consumes list of the
//! definition that provides it. Services whose provider consumes nothing are
//! resolved up front; the rest are resolved by a depth-first walk in the order
//! the services were declared. The resolved service order is then projected
//! back onto definition indices, keeping the first position of each provider.
//!
//! ```rust
//! use archetyped::extensions::{DependencyGraph, ExtensionDefinition};
//!
//! let mut math = ExtensionDefinition::new("math");
//! math.provides = vec!["math".into()];
//!
//! let mut calculator = ExtensionDefinition::new("calculator");
//! calculator.consumes = vec!["math".into()];
//! calculator.provides = vec!["calculator".into()];
//!
//! let order = DependencyGraph::new(&[calculator, math]).resolve().unwrap();
//! assert_eq!(order, vec![1, 0]);
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use super::types::ExtensionDefinition;

/// Errors that can occur while resolving the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Duplicate extension provided for \"{service}\"")]
    DuplicateProvider { service: String },

    #[error("Missing provider for \"{service}\" required by \"{consumer}\"")]
    MissingProvider { service: String, consumer: String },

    #[error("Circular dependency detected at \"{service}\": \"{dependency}\" is still being resolved")]
    CircularDependency { service: String, dependency: String },
}

impl GraphError {
    /// The service name the error is about
    pub fn service(&self) -> &str {
        match self {
            Self::DuplicateProvider { service }
            | Self::MissingProvider { service, .. }
            | Self::CircularDependency { service, .. } => service,
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Outcome of resolving a definition list: either ordered definitions or an error
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Definitions in load order; empty when `error` is set
    pub extensions: Vec<ExtensionDefinition>,
    pub error: Option<GraphError>,
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Resolve definitions into load order
pub fn resolve_definitions(definitions: &[ExtensionDefinition]) -> Resolution {
    match DependencyGraph::new(definitions).resolve() {
        Ok(order) => Resolution {
            extensions: order.into_iter().map(|i| definitions[i].clone()).collect(),
            error: None,
        },
        Err(error) => Resolution {
            extensions: Vec::new(),
            error: Some(error),
        },
    }
}

/// Dependency graph over a list of extension definitions
pub struct DependencyGraph<'a> {
    definitions: &'a [ExtensionDefinition],
    builtins: HashSet<&'a str>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(definitions: &'a [ExtensionDefinition]) -> Self {
        Self {
            definitions,
            builtins: HashSet::new(),
        }
    }

    /// Treat `names` as services that are always available.
    ///
    /// Consuming a built-in never fails; providing one is a duplicate.
    pub fn with_builtins(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.builtins.extend(names);
        self
    }

    /// Resolve the graph into definition indices in load order.
    ///
    /// Definitions that provide nothing cannot be depended upon; they are
    /// placed after every provider, in input order.
    pub fn resolve(&self) -> GraphResult<Vec<usize>> {
        let mut walk = Walk::build(self.definitions, &self.builtins)?;

        for node in 0..walk.nodes.len() {
            if walk.resolved[node] {
                continue;
            }
            walk.visit(node)?;
        }

        let mut order = walk.project();

        for (index, definition) in self.definitions.iter().enumerate() {
            if !definition.provides.is_empty() {
                continue;
            }
            if let Some(missing) = definition
                .consumes
                .iter()
                .find(|service| !walk.is_available(service))
            {
                return Err(GraphError::MissingProvider {
                    service: missing.clone(),
                    consumer: definition.package_path.clone(),
                });
            }
            order.push(index);
        }

        debug!(count = order.len(), "Resolved dependency graph");
        Ok(order)
    }
}

/// A provided service and the consumes list of its provider
struct Node<'a> {
    service: &'a str,
    consumes: &'a [String],
    provider: usize,
}

/// Working sets for one resolution; rebuilt on every call
struct Walk<'a, 'g> {
    builtins: &'g HashSet<&'a str>,
    nodes: Vec<Node<'a>>,
    lookup: HashMap<&'a str, usize>,
    resolved: Vec<bool>,
    in_progress: Vec<bool>,
    /// Node indices in the order they became resolved
    order: Vec<usize>,
}

impl<'a, 'g> Walk<'a, 'g> {
    fn build(
        definitions: &'a [ExtensionDefinition],
        builtins: &'g HashSet<&'a str>,
    ) -> GraphResult<Self> {
        let mut walk = Walk {
            builtins,
            nodes: Vec::new(),
            lookup: HashMap::new(),
            resolved: Vec::new(),
            in_progress: Vec::new(),
            order: Vec::new(),
        };

        for (provider, definition) in definitions.iter().enumerate() {
            for service in &definition.provides {
                if walk.is_available(service) {
                    return Err(GraphError::DuplicateProvider {
                        service: service.clone(),
                    });
                }

                let node = walk.nodes.len();
                walk.lookup.insert(service.as_str(), node);
                walk.nodes.push(Node {
                    service: service.as_str(),
                    consumes: &definition.consumes,
                    provider,
                });

                let leaf = definition.consumes.is_empty();
                walk.resolved.push(leaf);
                walk.in_progress.push(false);
                if leaf {
                    walk.order.push(node);
                }
            }
        }

        Ok(walk)
    }

    /// Depth-first walk from `root` using an explicit stack of
    /// (node, next consumed position) frames.
    fn visit(&mut self, root: usize) -> GraphResult<()> {
        self.enter(root)?;
        let mut stack = vec![(root, 0usize)];

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let consumes = self.nodes[node].consumes;

            if cursor == consumes.len() {
                stack.pop();
                self.in_progress[node] = false;
                self.resolved[node] = true;
                self.order.push(node);
                continue;
            }
            frame.1 += 1;

            let dependency = consumes[cursor].as_str();
            if self.builtins.contains(dependency) {
                continue;
            }
            let Some(&child) = self.lookup.get(dependency) else {
                return Err(GraphError::MissingProvider {
                    service: dependency.to_string(),
                    consumer: self.nodes[node].service.to_string(),
                });
            };

            if self.in_progress[child] {
                return Err(GraphError::CircularDependency {
                    service: self.nodes[node].service.to_string(),
                    dependency: dependency.to_string(),
                });
            }

            if self.resolved[child] {
                continue;
            }

            self.enter(child)?;
            stack.push((child, 0));
        }

        Ok(())
    }

    fn is_available(&self, service: &str) -> bool {
        self.builtins.contains(service) || self.lookup.contains_key(service)
    }

    fn enter(&mut self, node: usize) -> GraphResult<()> {
        // A leaf is resolved during construction; reaching one here means two
        // providers collapsed onto the same node.
        if self.nodes[node].consumes.is_empty() && self.resolved[node] {
            return Err(GraphError::DuplicateProvider {
                service: self.nodes[node].service.to_string(),
            });
        }
        self.in_progress[node] = true;
        Ok(())
    }

    /// Provider indices in resolution order, each provider once
    fn project(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.order
            .iter()
            .map(|&node| self.nodes[node].provider)
            .filter(|provider| seen.insert(*provider))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(consumes: &[&str], provides: &[&str]) -> ExtensionDefinition {
        let mut definition = ExtensionDefinition::new(format!("ext-{}", provides.join("-")));
        definition.consumes = consumes.iter().map(|s| s.to_string()).collect();
        definition.provides = provides.iter().map(|s| s.to_string()).collect();
        definition
    }

    fn assert_providers_first(definitions: &[ExtensionDefinition], order: &[usize]) {
        let position = |service: &str| {
            order
                .iter()
                .position(|&i| definitions[i].provides.iter().any(|p| p == service))
                .unwrap()
        };
        for (at, &index) in order.iter().enumerate() {
            for consumed in &definitions[index].consumes {
                assert!(position(consumed) < at, "{consumed} must load before {index}");
            }
        }
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(DependencyGraph::new(&[]).resolve().unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_resolve_simple_case() {
        let deps = vec![def(&[], &["A"]), def(&["A"], &["B"])];
        assert_eq!(DependencyGraph::new(&deps).resolve().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_consumer_declared_before_provider() {
        let deps = vec![def(&["A"], &["B"]), def(&[], &["A"])];
        assert_eq!(DependencyGraph::new(&deps).resolve().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_reject_simple_circular_dependency() {
        let deps = vec![def(&["B"], &["A"]), def(&["A"], &["B"])];
        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert_eq!(
            err,
            GraphError::CircularDependency {
                service: "B".into(),
                dependency: "A".into(),
            }
        );
    }

    #[test]
    fn test_resolve_slightly_more_complex_case() {
        let deps = vec![
            def(&[], &["A"]),
            def(&["A", "C"], &["B"]),
            def(&["A"], &["C"]),
            def(&["B"], &["D"]),
        ];
        let order = DependencyGraph::new(&deps).resolve().unwrap();
        assert_eq!(order, vec![0, 2, 1, 3]);
        assert_providers_first(&deps, &order);
    }

    #[test]
    fn test_reject_longer_cycle() {
        let deps = vec![
            def(&[], &["A"]),
            def(&["A", "C"], &["B"]),
            def(&["A", "D"], &["C"]),
            def(&["B"], &["D"]),
        ];
        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert!(matches!(err, GraphError::CircularDependency { .. }));

        let resolution = resolve_definitions(&deps);
        assert!(resolution.extensions.is_empty());
        assert!(!resolution.is_ok());
    }

    #[test]
    fn test_reject_duplicate_provider() {
        let deps = vec![
            def(&[], &["A"]),
            def(&["A", "C"], &["B"]),
            def(&["A"], &["C"]),
            def(&["A"], &["B"]),
        ];
        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert_eq!(err, GraphError::DuplicateProvider { service: "B".into() });
    }

    #[test]
    fn test_duplicate_provider_wins_over_missing_provider() {
        let deps = vec![def(&["nowhere"], &["A"]), def(&["nowhere"], &["A"])];
        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert!(matches!(err, GraphError::DuplicateProvider { .. }));
    }

    #[test]
    fn test_reject_missing_provider() {
        let deps = vec![def(&[], &["A"]), def(&["A", "Z"], &["B"])];
        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingProvider {
                service: "Z".into(),
                consumer: "B".into(),
            }
        );
        assert_eq!(err.service(), "Z");
    }

    #[test]
    fn test_ordered_set_of_dependencies() {
        let deps = vec![
            def(&[], &["A"]),
            def(&[], &["B"]),
            def(&["D", "F"], &["C"]),
            def(&["A", "B"], &["D"]),
            def(&["A", "D"], &["E"]),
            def(&["B"], &["F"]),
        ];
        let order = DependencyGraph::new(&deps).resolve().unwrap();
        assert_eq!(order, vec![0, 1, 3, 5, 2, 4]);
        assert_providers_first(&deps, &order);
    }

    #[test]
    fn test_ordered_set_with_late_leaf() {
        let deps = vec![
            def(&[], &["A"]),
            def(&["D", "F"], &["C"]),
            def(&[], &["B"]),
            def(&["A", "B"], &["D"]),
            def(&["A", "D"], &["E"]),
            def(&["E"], &["F"]),
        ];
        assert_eq!(DependencyGraph::new(&deps).resolve().unwrap(), vec![0, 2, 3, 4, 5, 1]);
    }

    #[test]
    fn test_resolve_multiple_providers() {
        let deps = vec![
            def(&[], &["A"]),
            def(&["D", "F"], &["C", "Z"]),
            def(&[], &["B", "Y"]),
            def(&["A", "B"], &["D", "X"]),
            def(&["A", "D"], &["E"]),
            def(&["E"], &["F"]),
        ];
        let order = DependencyGraph::new(&deps).resolve().unwrap();
        assert_eq!(order, vec![0, 2, 3, 4, 5, 1]);
        assert_providers_first(&deps, &order);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let deps = vec![
            def(&["D", "F"], &["C"]),
            def(&[], &["A"]),
            def(&["A"], &["D"]),
            def(&["D"], &["F"]),
        ];
        let graph = DependencyGraph::new(&deps);
        let first = graph.resolve().unwrap();
        assert_eq!(first, graph.resolve().unwrap());
        assert_providers_first(&deps, &first);
    }

    #[test]
    fn test_definitions_without_provides_load_last() {
        let deps = vec![def(&["A"], &[]), def(&[], &["A"]), def(&[], &[])];
        assert_eq!(DependencyGraph::new(&deps).resolve().unwrap(), vec![1, 0, 2]);

        let deps = vec![def(&["Z"], &[]), def(&[], &["A"])];
        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert!(matches!(err, GraphError::MissingProvider { ref consumer, .. } if consumer == "ext-"));
    }

    #[test]
    fn test_builtins_are_always_resolvable() {
        let deps = vec![def(&["hub", "A"], &["B"]), def(&["hub"], &["A"]), def(&["hub"], &[])];
        let graph = DependencyGraph::new(&deps).with_builtins(["hub"]);
        assert_eq!(graph.resolve().unwrap(), vec![1, 0, 2]);

        let err = DependencyGraph::new(&deps).resolve().unwrap_err();
        assert_eq!(err.service(), "hub");

        let deps = vec![def(&[], &["hub"])];
        let err = DependencyGraph::new(&deps).with_builtins(["hub"]).resolve().unwrap_err();
        assert_eq!(err, GraphError::DuplicateProvider { service: "hub".into() });
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut deps = vec![def(&[], &["s0"])];
        for i in 1..20_000 {
            let consumed = format!("s{}", i - 1);
            let provided = format!("s{}", i);
            deps.push(def(&[consumed.as_str()], &[provided.as_str()]));
        }
        deps.reverse();

        let order = DependencyGraph::new(&deps).resolve().unwrap();
        assert_eq!(order.len(), deps.len());
        assert_eq!(order[0], deps.len() - 1);
        assert_eq!(order[order.len() - 1], 0);
    }

    #[test]
    fn test_resolve_definitions_returns_clones_in_order() {
        let deps = vec![def(&["A"], &["B"]), def(&[], &["A"])];
        let resolution = resolve_definitions(&deps);
        assert!(resolution.is_ok());
        let provided: Vec<_> = resolution
            .extensions
            .iter()
            .map(|d| d.provides[0].as_str())
            .collect();
        assert_eq!(provided, vec!["A", "B"]);
    }
}
