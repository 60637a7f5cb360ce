use std::collections::HashMap;

use crate::{
    descriptor::ServiceDescriptor, errors::ConfigurationError, reference::ServiceKey,
};

//////////////////////////////////////////////////////////////////////
///
/// Resolving services happens in three steps.
/// 1. The ConfigurationBuilder where one registers all service descriptors
/// 2. The ServiceContainer validating and binding the configuration
/// 3. Resolution of individual services on demand

/// Immutable graph of all registered services
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    services: HashMap<ServiceKey, ServiceDescriptor>,
}
impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn get(&self, key: &ServiceKey) -> Option<&ServiceDescriptor> {
        self.services.get(key)
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.services.contains_key(key)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[derive(Default)]
pub struct ConfigurationBuilder {
    /// Registered descriptors, in registration order
    registered_services: Vec<ServiceDescriptor>,
}
impl ConfigurationBuilder {
    pub fn new() -> Self {
        ConfigurationBuilder {
            registered_services: Vec::new(),
        }
    }

    pub fn register_service(mut self, descriptor: ServiceDescriptor) -> Self {
        self.registered_services.push(descriptor);
        self
    }

    pub fn build(self) -> Result<Configuration, ConfigurationError> {
        let mut services = HashMap::with_capacity(self.registered_services.len());
        for descriptor in self.registered_services {
            let key = descriptor.reference().clone();
            if services.insert(key.clone(), descriptor).is_some() {
                return Err(ConfigurationError::Duplicate(key));
            }
        }

        Ok(Configuration { services })
    }
}
