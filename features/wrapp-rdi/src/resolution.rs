use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    descriptor::SetterMethod,
    errors::{Chain, ResolveError},
    invoker::BoundSetter,
    reference::ServiceKey,
    types::Instance,
};

static NEXT_RESOLUTION_ID: AtomicU64 = AtomicU64::new(0);

/// Identifies one top-level request and everything it resolves on the way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResolutionId(u64);

struct Link {
    key: ServiceKey,
    singleton: bool,
}

/// The remaining setters of a service, waiting until a singleton they depend on is published
///
/// The first setter injects that singleton. The rest follow it so setters keep their
/// declaration order.
pub(crate) struct DeferredSetters {
    /// The service owning the setters
    pub service: ServiceKey,
    pub target: Instance,
    pub setters: Vec<SetterMethod>,
    /// Same order as `setters`
    pub bound: Vec<BoundSetter>,
    waits_for: ServiceKey,
}

/// State of a single top-level resolution
///
/// Nested resolutions run one after the other, so a single chain describes
/// the path from the requested service down to the one currently resolving.
pub(crate) struct Resolution {
    id: ResolutionId,
    chain: Vec<Link>,
    max_depth: usize,
    deferred: Vec<DeferredSetters>,
}
impl Resolution {
    pub fn new(max_depth: usize) -> Self {
        Self {
            id: ResolutionId(NEXT_RESOLUTION_ID.fetch_add(1, Ordering::Relaxed)),
            chain: Vec::new(),
            max_depth,
            deferred: Vec::new(),
        }
    }

    pub fn id(&self) -> ResolutionId {
        self.id
    }

    /// Pushes `key` onto the chain, unless resolving it again would never end
    /// or the chain already is at its depth limit
    ///
    /// Re-entering a service is runaway when it is an unpublished singleton, which
    /// is still waiting for its own factory arguments, or when only prototypes
    /// were visited since it was last entered, so nothing can break the cycle.
    pub fn enter(&mut self, key: &ServiceKey, singleton: bool) -> Result<(), ResolveError> {
        if self.chain.len() >= self.max_depth {
            tracing::warn!(
                "Resolution exceeded the maximum depth of {} at {key}",
                self.max_depth
            );
            return Err(ResolveError::DepthExceeded {
                limit: self.max_depth,
                chain: self.chain_with(key),
            });
        }

        if let Some(position) = self.chain.iter().rposition(|link| &link.key == key) {
            let runaway = singleton || self.chain[position..].iter().all(|link| !link.singleton);
            if runaway {
                return Err(ResolveError::CircularInstantiation {
                    chain: self.chain_with(key),
                });
            }
        }

        self.chain.push(Link {
            key: key.clone(),
            singleton,
        });
        Ok(())
    }

    pub fn leave(&mut self) {
        self.chain.pop();
    }

    /// Whether `key` is a singleton this resolution is currently constructing
    pub fn is_constructing(&self, key: &ServiceKey) -> bool {
        self.chain
            .iter()
            .any(|link| link.singleton && &link.key == key)
    }

    pub fn chain(&self) -> Chain {
        Chain(self.chain.iter().map(|link| link.key.clone()).collect())
    }

    pub fn chain_with(&self, key: &ServiceKey) -> Chain {
        let mut chain = self.chain();
        chain.0.push(key.clone());
        chain
    }

    pub fn defer(
        &mut self,
        waits_for: &ServiceKey,
        service: &ServiceKey,
        target: &Instance,
        setters: &[SetterMethod],
        bound: &[BoundSetter],
    ) {
        tracing::trace!(
            "Deferring {} setter(s) of {service} until {waits_for} is published",
            setters.len()
        );
        self.deferred.push(DeferredSetters {
            service: service.clone(),
            target: target.clone(),
            setters: setters.to_vec(),
            bound: bound.to_vec(),
            waits_for: waits_for.clone(),
        });
    }

    /// Removes and returns the setters waiting for `published`, in the order they were deferred
    pub fn take_deferred(&mut self, published: &ServiceKey) -> Vec<DeferredSetters> {
        let (ready, waiting) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|deferred| &deferred.waits_for == published);
        self.deferred = waiting;
        ready
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }
}
