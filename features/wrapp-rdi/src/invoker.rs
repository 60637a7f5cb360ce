use std::{
    borrow::Cow,
    collections::HashMap,
    convert::Infallible,
    future::{self, Future},
    sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    descriptor::{FactoryMethod, Injectable, SetterMethod},
    errors::{BindError, InvokeError},
    reference::ServiceKey,
    types::{Deferred, DynError, Instance, Managed, TypeInfo},
};

/// Factory bound to a concrete operation, takes the resolved arguments in declaration order
pub type BoundFactory =
    Arc<dyn Fn(Vec<Instance>) -> BoxFuture<'static, Result<Instance, DynError>> + Send + Sync>;

/// Setter bound to a concrete operation, takes the target instance and the resolved value
pub type BoundSetter =
    Arc<dyn Fn(Instance, Instance) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;

/// Turns declared factories and setters into invocable operations
///
/// Binding happens once while the container is created, so no lookup by name
/// happens while services are resolved.
pub trait Invoker {
    fn bind_factory(
        &self,
        service: &ServiceKey,
        factory: &FactoryMethod,
    ) -> Result<BoundFactory, BindError>;

    fn bind_setter(
        &self,
        service: &ServiceKey,
        setter: &SetterMethod,
    ) -> Result<BoundSetter, BindError>;
}

/// Owner type, operation name and parameter types of an operation
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Signature {
    pub owner: TypeInfo,
    /// None for constructors
    pub name: Option<Cow<'static, str>>,
    pub params: Vec<TypeInfo>,
}
impl Signature {
    fn constructor(owner: TypeInfo, params: Vec<TypeInfo>) -> Self {
        Self {
            owner,
            name: None,
            params,
        }
    }

    fn named(owner: TypeInfo, name: impl Into<Cow<'static, str>>, params: Vec<TypeInfo>) -> Self {
        Self {
            owner,
            name: Some(name.into()),
            params,
        }
    }

    fn of_args(owner: TypeInfo, name: Option<&str>, args: &[Injectable]) -> Self {
        Self {
            owner,
            name: name.map(|name| Cow::Owned(name.to_string())),
            params: args.iter().map(Injectable::type_info).collect(),
        }
    }
}
impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|param| param.type_name).collect();
        match &self.name {
            Some(name) => write!(f, "'{}::{}({})'", self.owner, name, params.join(", ")),
            None => write!(f, "'{}::<constructor>({})'", self.owner, params.join(", ")),
        }
    }
}

/// Anything callable with a fixed list of `Arc` arguments
///
/// Implemented for functions and closures taking up to six `Arc<T>` parameters.
pub trait Callable<Args>: Send + Sync + 'static {
    type Output;

    /// Parameter types, in order
    fn signature() -> Vec<TypeInfo>;

    /// Downcasts the arguments and calls through
    fn call(&self, args: Vec<Instance>) -> Result<Self::Output, InvokeError>;
}

fn next_arg<T: Managed>(
    args: &mut impl Iterator<Item = (usize, Instance)>,
    expected: usize,
    actual: usize,
) -> Result<Arc<T>, InvokeError> {
    let (position, instance) = args
        .next()
        .ok_or(InvokeError::ArgumentCount { expected, actual })?;

    instance
        .downcast::<T>()
        .map_err(|actual| InvokeError::ArgumentType {
            position,
            expected: std::any::type_name::<T>(),
            actual,
        })
}

macro_rules! impl_callable ({ $($param:ident)* } => {
    impl<Func, Out, $($param: Managed,)*> Callable<($($param,)*)> for Func
    where
        Func: Fn($(Arc<$param>),*) -> Out + Send + Sync + 'static,
    {
        type Output = Out;

        fn signature() -> Vec<TypeInfo> {
            vec![$(TypeInfo::of::<$param>()),*]
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        fn call(&self, args: Vec<Instance>) -> Result<Out, InvokeError> {
            let expected = <Self as Callable<($($param,)*)>>::signature().len();
            let actual = args.len();
            if actual != expected {
                return Err(InvokeError::ArgumentCount { expected, actual });
            }

            let mut args = args.into_iter().enumerate();
            $(
                let $param = next_arg::<$param>(&mut args, expected, actual)?;
            )*
            Ok((self)($($param),*))
        }
    }
});

impl_callable! {}
impl_callable! { T1 }
impl_callable! { T1 T2 }
impl_callable! { T1 T2 T3 }
impl_callable! { T1 T2 T3 T4 }
impl_callable! { T1 T2 T3 T4 T5 }
impl_callable! { T1 T2 T3 T4 T5 T6 }

struct FactoryOperation {
    /// Declared return type, [Deferred] for asynchronous factories
    returns: TypeInfo,
    factory: BoundFactory,
}

/// [Invoker] backed by explicitly registered functions
///
/// Constructors and named factories are registered on the type they produce,
/// setters on the type they mutate.
///
/// # Example
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use wrapp_rdi::InvokerRegistry;
///
/// #[derive(Default)]
/// struct Greeter {
///     name: Mutex<String>,
/// }
///
/// let registry = InvokerRegistry::new()
///     .default_constructor::<Greeter>()
///     .setter("setName", |greeter: &Greeter, name: Arc<String>| {
///         *greeter.name.lock().unwrap() = name.to_string();
///     });
/// ```
#[derive(Default)]
pub struct InvokerRegistry {
    factories: HashMap<Signature, FactoryOperation>,
    setters: HashMap<Signature, BoundSetter>,
}
impl InvokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor of `T`
    pub fn constructor<T, Args, F>(self, constructor: F) -> Self
    where
        T: Managed,
        F: Callable<Args, Output = T>,
    {
        let signature = Signature::constructor(TypeInfo::of::<T>(), F::signature());
        let factory: BoundFactory = Arc::new(move |args| {
            let produced = constructor
                .call(args)
                .map(Instance::new)
                .map_err(DynError::from);
            future::ready(produced).boxed()
        });

        self.insert_factory(signature, TypeInfo::of::<T>(), factory)
    }

    /// Registers the zero argument constructor `T::default`
    pub fn default_constructor<T: Managed + Default>(self) -> Self {
        self.constructor::<T, (), _>(T::default)
    }

    /// Registers a named factory which returns its `T` synchronously
    pub fn factory<T, E, Args, F>(self, name: &'static str, factory: F) -> Self
    where
        T: Managed,
        E: Into<DynError>,
        F: Callable<Args, Output = Result<T, E>>,
    {
        let signature = Signature::named(TypeInfo::of::<T>(), name, F::signature());
        let factory: BoundFactory = Arc::new(move |args| {
            let produced: Result<Instance, DynError> = match factory.call(args) {
                Ok(result) => result.map(Instance::new).map_err(Into::into),
                Err(error) => Err(error.into()),
            };
            future::ready(produced).boxed()
        });

        self.insert_factory(signature, TypeInfo::of::<T>(), factory)
    }

    /// Registers a named factory which delivers its `T` asynchronously
    ///
    /// Its declared return type is [Deferred<T>].
    pub fn async_factory<T, E, Fut, Args, F>(self, name: &'static str, factory: F) -> Self
    where
        T: Managed,
        E: Into<DynError>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        F: Callable<Args, Output = Fut>,
    {
        let signature = Signature::named(TypeInfo::of::<T>(), name, F::signature());
        let factory: BoundFactory = Arc::new(move |args| match factory.call(args) {
            Ok(pending) => async move {
                pending
                    .await
                    .map(Instance::new)
                    .map_err(Into::<DynError>::into)
            }
            .boxed(),
            Err(error) => future::ready(Err(DynError::from(error))).boxed(),
        });

        self.insert_factory(signature, TypeInfo::of::<Deferred<T>>(), factory)
    }

    /// Registers an infallible setter on `T`
    pub fn setter<T, V, F>(self, name: &'static str, setter: F) -> Self
    where
        T: Managed,
        V: Managed,
        F: Fn(&T, Arc<V>) + Send + Sync + 'static,
    {
        self.try_setter(name, move |target: &T, value: Arc<V>| {
            setter(target, value);
            Ok::<_, Infallible>(())
        })
    }

    /// Registers a setter on `T` which may fail
    pub fn try_setter<T, V, E, F>(self, name: &'static str, setter: F) -> Self
    where
        T: Managed,
        V: Managed,
        E: Into<DynError>,
        F: Fn(&T, Arc<V>) -> Result<(), E> + Send + Sync + 'static,
    {
        let signature = Signature::named(TypeInfo::of::<T>(), name, vec![TypeInfo::of::<V>()]);
        let bound: BoundSetter = Arc::new(move |target, value| {
            let applied = downcast_setter_args::<T, V>(&target, &value)
                .map_err(DynError::from)
                .and_then(|(target, value)| setter(&target, value).map_err(Into::into));
            future::ready(applied).boxed()
        });

        self.insert_setter(signature, bound)
    }

    /// Registers a setter on `T` which completes asynchronously
    pub fn async_setter<T, V, E, Fut, F>(self, name: &'static str, setter: F) -> Self
    where
        T: Managed,
        V: Managed,
        E: Into<DynError>,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        F: Fn(Arc<T>, Arc<V>) -> Fut + Send + Sync + 'static,
    {
        let signature = Signature::named(TypeInfo::of::<T>(), name, vec![TypeInfo::of::<V>()]);
        let bound: BoundSetter = Arc::new(move |target, value| {
            match downcast_setter_args::<T, V>(&target, &value) {
                Ok((target, value)) => {
                    let pending = setter(target, value);
                    async move { pending.await.map_err(Into::<DynError>::into) }.boxed()
                }
                Err(error) => future::ready(Err(DynError::from(error))).boxed(),
            }
        });

        self.insert_setter(signature, bound)
    }

    fn insert_factory(mut self, signature: Signature, returns: TypeInfo, factory: BoundFactory) -> Self {
        if self.factories.contains_key(&signature) {
            tracing::warn!("Replacing previously registered factory {signature}");
        }
        self.factories
            .insert(signature, FactoryOperation { returns, factory });
        self
    }

    fn insert_setter(mut self, signature: Signature, setter: BoundSetter) -> Self {
        if self.setters.contains_key(&signature) {
            tracing::warn!("Replacing previously registered setter {signature}");
        }
        self.setters.insert(signature, setter);
        self
    }
}

fn downcast_setter_args<T: Managed, V: Managed>(
    target: &Instance,
    value: &Instance,
) -> Result<(Arc<T>, Arc<V>), InvokeError> {
    let target = target
        .downcast::<T>()
        .map_err(|actual| InvokeError::TargetType {
            expected: std::any::type_name::<T>(),
            actual,
        })?;
    let value = value
        .downcast::<V>()
        .map_err(|actual| InvokeError::ArgumentType {
            position: 0,
            expected: std::any::type_name::<V>(),
            actual,
        })?;

    Ok((target, value))
}

impl Invoker for InvokerRegistry {
    fn bind_factory(
        &self,
        service: &ServiceKey,
        factory: &FactoryMethod,
    ) -> Result<BoundFactory, BindError> {
        let (signature, declared) = match factory {
            FactoryMethod::Constructor { args } => (
                Signature::of_args(service.type_info(), None, args),
                None,
            ),
            FactoryMethod::NamedFactory {
                name,
                return_type,
                args,
            } => (
                Signature::of_args(service.type_info(), Some(name), args),
                Some(*return_type),
            ),
        };

        let Some(operation) = self.factories.get(&signature) else {
            return Err(BindError::NoSuchOperation {
                service: service.clone(),
                signature,
            });
        };

        if let Some(declared) = declared {
            if declared != operation.returns {
                return Err(BindError::ReturnTypeMismatch {
                    service: service.clone(),
                    signature,
                    declared,
                    actual: operation.returns,
                });
            }
        }

        Ok(operation.factory.clone())
    }

    fn bind_setter(
        &self,
        service: &ServiceKey,
        setter: &SetterMethod,
    ) -> Result<BoundSetter, BindError> {
        let signature = Signature::of_args(
            service.type_info(),
            Some(setter.name()),
            std::slice::from_ref(setter.arg()),
        );

        self.setters
            .get(&signature)
            .cloned()
            .ok_or(BindError::NoSuchOperation {
                service: service.clone(),
                signature,
            })
    }
}
