use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures_channel::oneshot;
use once_cell::sync::OnceCell;

use crate::{
    errors::ResolveError,
    reference::ServiceKey,
    resolution::{Resolution, ResolutionId},
    types::Instance,
};

pub(crate) type CacheResponseSender = oneshot::Sender<Result<Instance, ResolveError>>;
pub(crate) type CacheResponseReceiver = oneshot::Receiver<Result<Instance, ResolveError>>;

/// Write-once store of singleton instances
///
/// Every singleton gets its cell when the container is created. Reading a published
/// instance never takes a lock; the mutex only coordinates constructions in flight.
pub(crate) struct SingletonCache {
    cells: HashMap<ServiceKey, OnceCell<Instance>>,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    constructions: HashMap<ServiceKey, Construction>,
    /// What each waiting resolution is waiting for
    waiting: HashMap<ResolutionId, ServiceKey>,
}

struct Construction {
    owner: ResolutionId,
    waiters: Vec<(ResolutionId, CacheResponseSender)>,
}

/// Outcome of trying to claim a singleton
pub(crate) enum Claim<'a> {
    /// Already published
    Ready(Instance),
    /// The caller must construct and then publish or fail through the guard
    Owner(ConstructionGuard<'a>),
    /// Another resolution is constructing, the receiver yields its outcome
    Wait(CacheResponseReceiver),
}

impl SingletonCache {
    pub fn new(singletons: impl IntoIterator<Item = ServiceKey>) -> Self {
        Self {
            cells: singletons
                .into_iter()
                .map(|key| (key, OnceCell::new()))
                .collect(),
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub fn get(&self, key: &ServiceKey) -> Option<&Instance> {
        self.cells.get(key).and_then(OnceCell::get)
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.get(key).is_some()
    }

    fn lock(&self) -> MutexGuard<'_, InFlight> {
        // The state is only changed in single steps, it can't be left half updated
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Decides who constructs `key`
    ///
    /// Fails if waiting would close a cycle of resolutions waiting on each other.
    pub fn claim(
        &self,
        key: &ServiceKey,
        resolution: &Resolution,
    ) -> Result<Claim<'_>, ResolveError> {
        let Some(cell) = self.cells.get(key) else {
            return Err(ResolveError::NotRegistered(key.clone()));
        };
        if let Some(instance) = cell.get() {
            return Ok(Claim::Ready(instance.clone()));
        }

        let mut in_flight = self.lock();

        // Might have been published while we waited for the lock
        if let Some(instance) = cell.get() {
            return Ok(Claim::Ready(instance.clone()));
        }

        let requester = resolution.id();
        let Some(owner) = in_flight.constructions.get(key).map(|c| c.owner) else {
            in_flight.constructions.insert(
                key.clone(),
                Construction {
                    owner: requester,
                    waiters: Vec::new(),
                },
            );
            return Ok(Claim::Owner(ConstructionGuard {
                cache: self,
                key: key.clone(),
                finished: false,
            }));
        };

        if in_flight.would_deadlock(owner, requester) {
            tracing::warn!("Waiting for {key} would deadlock");
            return Err(ResolveError::CircularInstantiation {
                chain: resolution.chain_with(key),
            });
        }

        let (tx, rx) = oneshot::channel();
        if let Some(construction) = in_flight.constructions.get_mut(key) {
            construction.waiters.push((requester, tx));
        }
        in_flight.waiting.insert(requester, key.clone());

        Ok(Claim::Wait(rx))
    }
}

impl InFlight {
    /// Follows the chain of waits starting at `owner` looking for `requester`
    ///
    /// The waits form no cycle, since no wait closing one is ever registered.
    fn would_deadlock(&self, owner: ResolutionId, requester: ResolutionId) -> bool {
        let mut current = owner;
        loop {
            if current == requester {
                return true;
            }
            let Some(awaited) = self.waiting.get(&current) else {
                return false;
            };
            let Some(construction) = self.constructions.get(awaited) else {
                return false;
            };
            current = construction.owner;
        }
    }

    /// Removes a construction and releases its waiters' wait entries
    fn finish(&mut self, key: &ServiceKey) -> Vec<CacheResponseSender> {
        let Some(construction) = self.constructions.remove(key) else {
            return Vec::new();
        };

        construction
            .waiters
            .into_iter()
            .map(|(waiter, tx)| {
                self.waiting.remove(&waiter);
                tx
            })
            .collect()
    }
}

/// Exclusive right to construct one singleton
///
/// Dropping the guard without publishing or failing releases the waiters,
/// who then compete to construct the singleton themselves.
pub(crate) struct ConstructionGuard<'a> {
    cache: &'a SingletonCache,
    key: ServiceKey,
    finished: bool,
}
impl ConstructionGuard<'_> {
    /// Writes the instance to its cell and hands it to everyone waiting
    pub fn publish(mut self, instance: &Instance) {
        self.finished = true;
        let waiters = {
            let mut in_flight = self.cache.lock();
            if let Some(cell) = self.cache.cells.get(&self.key) {
                if cell.set(instance.clone()).is_err() {
                    tracing::error!("Singleton {} was published twice", self.key);
                }
            }
            in_flight.finish(&self.key)
        };

        tracing::trace!("Published {} to {} waiters", self.key, waiters.len());
        for waiter in waiters {
            // Error can be ignored as it just means the receiver was dropped
            let _ = waiter.send(Ok(instance.clone()));
        }
    }

    /// Hands the failure to everyone waiting, the next request starts over
    pub fn fail(mut self, error: &ResolveError) {
        self.finished = true;
        let waiters = self.cache.lock().finish(&self.key);
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }
}
impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("Construction of {} was abandoned", self.key);
            // Dropping the senders cancels the waiters
            drop(self.cache.lock().finish(&self.key));
        }
    }
}
