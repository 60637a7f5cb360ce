use crate::{
    reference::{ServiceKey, ServiceReference},
    types::{Instance, Managed, TypeInfo},
};

/// Source of the value for a single argument slot
#[derive(Debug, Clone)]
pub enum Injectable {
    /// A literal, always resolves to itself
    Value(Instance),
    /// Another service, resolved through the container
    Ref(ServiceKey),
}
impl Injectable {
    pub fn value<T: Managed>(value: T) -> Self {
        Self::Value(Instance::new(value))
    }

    pub fn reference<T: ?Sized>(reference: &ServiceReference<T>) -> Self {
        Self::Ref(reference.key().clone())
    }

    /// The declared type of the value, or the type of the referenced service
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Injectable::Value(instance) => instance.type_info(),
            Injectable::Ref(key) => key.type_info(),
        }
    }

    pub fn as_ref_key(&self) -> Option<&ServiceKey> {
        match self {
            Injectable::Value(_) => None,
            Injectable::Ref(key) => Some(key),
        }
    }
}

/// How the raw instance of a service gets produced
#[derive(Debug, Clone)]
pub enum FactoryMethod {
    /// Constructor-style invocation on the service's own type
    Constructor { args: Vec<Injectable> },
    /// A named factory, which may deliver its product asynchronously
    NamedFactory {
        name: String,
        return_type: TypeInfo,
        args: Vec<Injectable>,
    },
}
impl Default for FactoryMethod {
    fn default() -> Self {
        Self::Constructor { args: Vec::new() }
    }
}
impl FactoryMethod {
    pub fn constructor(args: impl IntoIterator<Item = Injectable>) -> Self {
        Self::Constructor {
            args: args.into_iter().collect(),
        }
    }

    /// A named factory declared to return `R`
    ///
    /// Use [crate::types::Deferred] as `R` for factories that complete asynchronously.
    pub fn static_factory<R: ?Sized + 'static>(
        name: impl Into<String>,
        args: impl IntoIterator<Item = Injectable>,
    ) -> Self {
        Self::NamedFactory {
            name: name.into(),
            return_type: TypeInfo::of::<R>(),
            args: args.into_iter().collect(),
        }
    }

    pub fn args(&self) -> &[Injectable] {
        match self {
            FactoryMethod::Constructor { args } => args,
            FactoryMethod::NamedFactory { args, .. } => args,
        }
    }
}

/// One post-construction mutation call
#[derive(Debug, Clone)]
pub struct SetterMethod {
    name: String,
    arg: Injectable,
}
impl SetterMethod {
    pub fn new(name: impl Into<String>, arg: Injectable) -> Self {
        Self {
            name: name.into(),
            arg,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg(&self) -> &Injectable {
        &self.arg
    }
}

/// Full recipe for one service
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    reference: ServiceKey,
    factory: FactoryMethod,
    setters: Vec<SetterMethod>,
    singleton: bool,
}
impl ServiceDescriptor {
    pub fn builder<T: ?Sized>(reference: &ServiceReference<T>) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder {
            reference: reference.key().clone(),
            factory: FactoryMethod::default(),
            setters: Vec::new(),
            singleton: true,
        }
    }

    pub fn reference(&self) -> &ServiceKey {
        &self.reference
    }

    pub fn factory(&self) -> &FactoryMethod {
        &self.factory
    }

    pub fn setters(&self) -> &[SetterMethod] {
        &self.setters
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Services required as factory arguments
    pub fn factory_refs(&self) -> impl Iterator<Item = &ServiceKey> {
        self.factory.args().iter().filter_map(Injectable::as_ref_key)
    }

    /// Services required by setters
    pub fn setter_refs(&self) -> impl Iterator<Item = &ServiceKey> {
        self.setters
            .iter()
            .filter_map(|setter| setter.arg.as_ref_key())
    }
}

pub struct ServiceDescriptorBuilder {
    reference: ServiceKey,
    factory: FactoryMethod,
    setters: Vec<SetterMethod>,
    singleton: bool,
}
impl ServiceDescriptorBuilder {
    pub fn factory_method(mut self, factory: FactoryMethod) -> Self {
        self.factory = factory;
        self
    }

    pub fn add_setter(mut self, name: impl Into<String>, arg: Injectable) -> Self {
        self.setters.push(SetterMethod::new(name, arg));
        self
    }

    /// Services are singletons unless stated otherwise
    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        ServiceDescriptor {
            reference: self.reference,
            factory: self.factory,
            setters: self.setters,
            singleton: self.singleton,
        }
    }
}
