use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::{builder::Configuration, errors::Chain, reference::ServiceKey};

/// Construction subgraph of a configuration
///
/// Edges only follow factory arguments. Setters run once their instance exists,
/// so they can never block construction and are only checked for existence.
pub struct DependencyGraph<'a> {
    configuration: &'a Configuration,
    map: BTreeMap<&'a ServiceKey, Vec<&'a ServiceKey>>,
}
impl<'a> DependencyGraph<'a> {
    pub fn new(configuration: &'a Configuration) -> Self {
        let map = configuration
            .descriptors()
            .map(|descriptor| (descriptor.reference(), descriptor.factory_refs().collect()))
            .collect();

        Self { configuration, map }
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut errors = Vec::new();

        // Dangling references, sorted so reports are stable
        let mut descriptors: Vec<_> = self.configuration.descriptors().collect();
        descriptors.sort_by(|a, b| a.reference().cmp(b.reference()));
        for descriptor in descriptors {
            for reference in descriptor.factory_refs().chain(descriptor.setter_refs()) {
                if !self.configuration.contains(reference) {
                    errors.push(DependencyGraphError::MissingReference {
                        reference: reference.clone(),
                        required_by: descriptor.reference().clone(),
                    });
                }
            }
        }

        let mut checked = HashSet::new();
        for service in self.map.keys().copied() {
            let mut dependency_chain = Vec::new();
            check_recurse(self, &mut checked, &mut errors, &mut dependency_chain, service);
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse<'a>(
            graph: &DependencyGraph<'a>,
            checked: &mut HashSet<&'a ServiceKey>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<&'a ServiceKey>,
            service: &'a ServiceKey,
        ) {
            // Circular Dependency Check
            if let Some(position) = dependency_chain.iter().position(|key| *key == service) {
                let mut cycle: Vec<ServiceKey> = dependency_chain[position..]
                    .iter()
                    .map(|key| (*key).clone())
                    .collect();
                cycle.push(service.clone()); // Close the cycle

                errors.push(DependencyGraphError::CircularDependency {
                    chain: Chain(cycle),
                });
                return;
            }

            // Skip other checks if already checked
            if !checked.insert(service) {
                return;
            };

            // Missing services were already reported
            let Some(dependencies) = graph.map.get(service) else {
                return;
            };

            dependency_chain.push(service);
            for dependency in dependencies {
                check_recurse(graph, checked, errors, dependency_chain, *dependency);
            }
            dependency_chain.pop();
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{reference}' but it is not registered")]
    MissingReference {
        reference: ServiceKey,
        required_by: ServiceKey,
    },
    #[error("A Circular Dependency exists through factory arguments {chain} - Consider injecting one of them with a setter")]
    CircularDependency { chain: Chain },
}
impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "The service configuration has {} unresolvable issue(s):",
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "\n- {error}")?;
        }
        Ok(())
    }
}

/// Everything wrong with a configuration, reported together
#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
