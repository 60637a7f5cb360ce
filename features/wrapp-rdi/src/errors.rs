use std::sync::Arc;

use thiserror::Error;

use crate::{
    dependency_graph::DependencyGraphErrors,
    invoker::Signature,
    reference::ServiceKey,
    types::{DynError, TypeInfo},
};

/// Errors while assembling a [crate::Configuration]
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    #[error("A Service has been registered twice: '{0}'")]
    Duplicate(ServiceKey),
}

/// Errors while creating a [crate::ServiceContainer]
#[derive(Error, Debug, Clone)]
pub enum CreateError {
    /// There are issues with the dependency graph
    #[error(transparent)]
    DependencyGraph(#[from] DependencyGraphErrors),
    /// A factory or setter could not be bound to an operation
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Errors when binding a declared operation to something invocable
#[derive(Error, Debug, Clone)]
pub enum BindError {
    #[error("'{service}' cannot be bound - no operation matches {signature}")]
    NoSuchOperation {
        service: ServiceKey,
        signature: Signature,
    },
    #[error("'{service}' cannot be bound - {signature} returns '{actual}' but '{declared}' was declared")]
    ReturnTypeMismatch {
        service: ServiceKey,
        signature: Signature,
        declared: TypeInfo,
        actual: TypeInfo,
    },
}

/// Errors raised by a bound operation itself, before any user code runs
#[derive(Error, Debug, Clone)]
pub enum InvokeError {
    #[error("Expected {expected} arguments but got {actual}")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("Argument {position} must be '{expected}' but is '{actual}'")]
    ArgumentType {
        position: usize,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Target must be '{expected}' but is '{actual}'")]
    TargetType {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors while resolving a service
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// The factory of a service failed
    #[error("Factory for '{service}' failed through {chain} - error: {error}")]
    Instantiation {
        service: ServiceKey,
        chain: Chain,
        error: Arc<DynError>,
    },
    /// A setter of a service failed
    #[error("Setter '{setter}' of '{service}' failed through {chain} - error: {error}")]
    Injection {
        service: ServiceKey,
        setter: String,
        chain: Chain,
        error: Arc<DynError>,
    },
    /// Resolution would never terminate
    #[error("Circular instantiation through {chain} - Consider making a service on the cycle a singleton")]
    CircularInstantiation { chain: Chain },
    /// The chain of nested resolutions grew past the configured limit
    #[error("Resolution depth limit of {limit} reached through {chain} - Raise ContainerSettings::max_resolution_depth if the graph is really this deep")]
    DepthExceeded { limit: usize, chain: Chain },
    /// The required service is not known
    #[error("The required service '{0}' is not registered.")]
    NotRegistered(ServiceKey),

    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}
impl ResolveError {
    /// The chain of services which led to this error, if any
    pub fn chain(&self) -> Option<&Chain> {
        match self {
            ResolveError::Instantiation { chain, .. }
            | ResolveError::Injection { chain, .. }
            | ResolveError::CircularInstantiation { chain }
            | ResolveError::DepthExceeded { chain, .. } => Some(chain),
            ResolveError::NotRegistered(_) | ResolveError::DowncastFailed { .. } => None,
        }
    }
}

/// Services visited from the top-level request down to a failure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain(pub Vec<ServiceKey>);
impl Chain {
    pub fn keys(&self) -> &[ServiceKey] {
        &self.0
    }
}
impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(ServiceKey::name).collect();
        write!(f, "[{}]", names.join(" -> "))
    }
}
