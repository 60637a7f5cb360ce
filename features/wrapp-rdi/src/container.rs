use std::{any::type_name, collections::HashMap, fmt::Debug, sync::Arc};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use futures_channel::oneshot;

use crate::{
    builder::Configuration,
    cache::{Claim, SingletonCache},
    dependency_graph::DependencyGraph,
    descriptor::{Injectable, ServiceDescriptor, SetterMethod},
    errors::{CreateError, ResolveError},
    invoker::{BoundFactory, BoundSetter, Invoker},
    reference::{ServiceKey, ServiceReference},
    resolution::Resolution,
    settings::ContainerSettings,
    types::{Instance, Managed},
};

/// Lazily resolved service
///
/// Nothing happens until it is polled. Clones share one evaluation, so every clone
/// observes the same outcome.
pub type ServiceFuture<T> = Shared<BoxFuture<'static, Result<Arc<T>, ResolveError>>>;

/// Operations bound to one service
struct Bindings {
    factory: BoundFactory,
    /// Same order as the descriptor's setters
    setters: Vec<BoundSetter>,
}

/// Container resolving services of a validated [Configuration]
#[derive(Clone)]
pub struct ServiceContainer(Arc<ServiceContainerInner>);
struct ServiceContainerInner {
    configuration: Configuration,
    bindings: HashMap<ServiceKey, Bindings>,
    singletons: SingletonCache,
    settings: ContainerSettings,
}
impl Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut descriptors: Vec<_> = self.0.configuration.descriptors().collect();
        descriptors.sort_by(|a, b| a.reference().cmp(b.reference()));

        let mut map = f.debug_struct("ServiceContainer");
        for descriptor in descriptors {
            let state = if !descriptor.is_singleton() {
                "prototype"
            } else if self.is_cached(descriptor.reference()) {
                "cached"
            } else {
                "pending"
            };
            map.field(descriptor.reference().name(), &state);
        }
        map.finish()
    }
}

impl ServiceContainer {
    /// Validates the configuration and binds every factory and setter
    ///
    /// Fails on references to unregistered services, on cycles through factory
    /// arguments and on operations the invoker cannot bind.
    pub fn create(
        configuration: Configuration,
        invoker: &(impl Invoker + ?Sized),
    ) -> Result<Self, CreateError> {
        Self::create_with(configuration, invoker, ContainerSettings::default())
    }

    pub fn create_with(
        configuration: Configuration,
        invoker: &(impl Invoker + ?Sized),
        settings: ContainerSettings,
    ) -> Result<Self, CreateError> {
        tracing::debug!(
            "Creating service container with {} services",
            configuration.len()
        );

        DependencyGraph::new(&configuration).check()?;

        let mut descriptors: Vec<_> = configuration.descriptors().collect();
        descriptors.sort_by(|a, b| a.reference().cmp(b.reference()));

        let mut bindings = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let service = descriptor.reference();
            let factory = invoker.bind_factory(service, descriptor.factory())?;
            let setters = descriptor
                .setters()
                .iter()
                .map(|setter| invoker.bind_setter(service, setter))
                .collect::<Result<Vec<_>, _>>()?;

            bindings.insert(service.clone(), Bindings { factory, setters });
        }

        let singletons = SingletonCache::new(
            configuration
                .descriptors()
                .filter(|descriptor| descriptor.is_singleton())
                .map(|descriptor| descriptor.reference().clone()),
        );

        tracing::debug!("Service container created");
        Ok(Self(Arc::new(ServiceContainerInner {
            configuration,
            bindings,
            singletons,
            settings,
        })))
    }

    /// Resolves the referenced service
    ///
    /// Every call starts a new evaluation. Singletons are constructed at most once
    /// and shared afterwards, prototypes are constructed on every resolution.
    pub fn get_service<T: Managed>(&self, reference: &ServiceReference<T>) -> ServiceFuture<T> {
        let container = self.clone();
        let key = reference.key().clone();

        async move {
            let mut resolution = Resolution::new(container.0.settings.max_resolution_depth);
            let instance = container.resolve(&key, &mut resolution).await?;
            if resolution.has_deferred() {
                tracing::error!("Resolution of {key} finished with setters still deferred");
            }

            instance
                .downcast::<T>()
                .map_err(|actual_type| ResolveError::DowncastFailed {
                    required_type: type_name::<T>(),
                    actual_type,
                })
        }
        .boxed()
        .shared()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.0.configuration
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.0.settings
    }

    /// Whether the singleton has been published
    pub fn is_cached(&self, key: &ServiceKey) -> bool {
        self.0.singletons.contains(key)
    }

    fn resolve<'a>(
        &'a self,
        key: &'a ServiceKey,
        resolution: &'a mut Resolution,
    ) -> BoxFuture<'a, Result<Instance, ResolveError>> {
        async move {
            let inner = &self.0;
            let (Some(descriptor), Some(bindings)) =
                (inner.configuration.get(key), inner.bindings.get(key))
            else {
                tracing::error!("Tried to resolve an unregistered service: {key}");
                return Err(ResolveError::NotRegistered(key.clone()));
            };
            let singleton = descriptor.is_singleton();

            if singleton {
                if let Some(instance) = inner.singletons.get(key) {
                    tracing::trace!("Resolved {key} from cache");
                    return Ok(instance.clone());
                }
            }

            resolution.enter(key, singleton)?;

            let guard = if singleton {
                loop {
                    match inner.singletons.claim(key, resolution)? {
                        Claim::Ready(instance) => {
                            resolution.leave();
                            return Ok(instance);
                        }
                        Claim::Owner(guard) => break Some(guard),
                        Claim::Wait(rx) => {
                            tracing::trace!("Waiting for the construction of {key} in flight");
                            match rx.await {
                                Ok(result) => {
                                    resolution.leave();
                                    return result;
                                }
                                // Owner was dropped, compete again
                                Err(oneshot::Canceled) => continue,
                            }
                        }
                    }
                }
            } else {
                None
            };

            let produced = self
                .instantiate(key, descriptor, bindings, resolution)
                .await;

            let instance = match (produced, guard) {
                (Ok(instance), Some(guard)) => {
                    // Published before the setters run, so cycles through setters find it
                    guard.publish(&instance);
                    self.apply_deferred(key, resolution).await?;
                    instance
                }
                (Ok(instance), None) => instance,
                (Err(error), Some(guard)) => {
                    guard.fail(&error);
                    return Err(error);
                }
                (Err(error), None) => return Err(error),
            };

            self.inject(
                key,
                &instance,
                descriptor.setters(),
                &bindings.setters,
                resolution,
            )
            .await?;

            resolution.leave();
            Ok(instance)
        }
        .boxed()
    }

    async fn resolve_injectable(
        &self,
        injectable: &Injectable,
        resolution: &mut Resolution,
    ) -> Result<Instance, ResolveError> {
        match injectable {
            Injectable::Value(value) => Ok(value.clone()),
            Injectable::Ref(key) => self.resolve(key, resolution).await,
        }
    }

    /// Resolves the factory arguments in order and invokes the factory
    async fn instantiate(
        &self,
        key: &ServiceKey,
        descriptor: &ServiceDescriptor,
        bindings: &Bindings,
        resolution: &mut Resolution,
    ) -> Result<Instance, ResolveError> {
        let declared = descriptor.factory().args();
        let mut args = Vec::with_capacity(declared.len());
        for injectable in declared {
            args.push(self.resolve_injectable(injectable, resolution).await?);
        }

        let instance = (bindings.factory)(args)
            .await
            .map_err(|error| ResolveError::Instantiation {
                service: key.clone(),
                chain: resolution.chain(),
                error: Arc::new(error),
            })?;

        tracing::debug!("Constructed instance of {key}");
        Ok(instance)
    }

    /// Runs the setters in declaration order
    ///
    /// Once a setter injects a singleton this resolution is still constructing, it and
    /// every setter after it are deferred until that singleton is published.
    async fn inject(
        &self,
        service: &ServiceKey,
        target: &Instance,
        setters: &[SetterMethod],
        bound: &[BoundSetter],
        resolution: &mut Resolution,
    ) -> Result<(), ResolveError> {
        for (position, (setter, apply)) in setters.iter().zip(bound).enumerate() {
            if let Injectable::Ref(dependency) = setter.arg() {
                if resolution.is_constructing(dependency) && !self.is_cached(dependency) {
                    resolution.defer(
                        dependency,
                        service,
                        target,
                        &setters[position..],
                        &bound[position..],
                    );
                    return Ok(());
                }
            }

            let value = self.resolve_injectable(setter.arg(), resolution).await?;
            apply_setter(service, setter.name(), apply, target, value, resolution).await?;
        }

        Ok(())
    }

    /// Resumes the setters which were waiting for `published`
    async fn apply_deferred(
        &self,
        published: &ServiceKey,
        resolution: &mut Resolution,
    ) -> Result<(), ResolveError> {
        for deferred in resolution.take_deferred(published) {
            self.inject(
                &deferred.service,
                &deferred.target,
                &deferred.setters,
                &deferred.bound,
                resolution,
            )
            .await?;
        }

        Ok(())
    }
}

async fn apply_setter(
    service: &ServiceKey,
    setter: &str,
    apply: &BoundSetter,
    target: &Instance,
    value: Instance,
    resolution: &Resolution,
) -> Result<(), ResolveError> {
    apply(target.clone(), value)
        .await
        .map_err(|error| ResolveError::Injection {
            service: service.clone(),
            setter: setter.to_string(),
            chain: resolution.chain(),
            error: Arc::new(error),
        })?;

    tracing::trace!("Applied setter '{setter}' of {service}");
    Ok(())
}
