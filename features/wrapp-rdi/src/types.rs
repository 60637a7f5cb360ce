use std::{
    any::{Any, TypeId},
    fmt::Debug,
    marker::PhantomData,
    sync::Arc,
};

/// Boxed cause of a failed factory or setter
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Bound for everything the container stores or passes to an operation
///
/// Resolutions may hop between runtime threads, and published singletons are read
/// from any of them.
pub trait Managed: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Managed for T {}

/// A service instance or literal argument with its concrete type erased
#[derive(Clone)]
pub struct Instance {
    info: TypeInfo,
    value: Arc<dyn Any + Send + Sync>,
}
impl Instance {
    pub fn new<T: Managed>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared value without reallocating it
    pub fn from_arc<T: Managed>(value: Arc<T>) -> Self {
        Self {
            info: TypeInfo::of::<T>(),
            value,
        }
    }

    /// The type the instance was created as
    pub fn type_info(&self) -> TypeInfo {
        self.info
    }

    /// Recovers the typed handle, or reports the name of the actual type
    pub fn downcast<T: Managed>(&self) -> Result<Arc<T>, &'static str> {
        self.value
            .clone()
            .downcast::<T>()
            .map_err(|_| self.info.type_name)
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Runtime tag of a concrete type
///
/// Ordered by name first, so sorted listings read alphabetically.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Return type tag of a named factory which delivers its `T` asynchronously
///
/// Used with [crate::FactoryMethod::static_factory] to select a factory registered through
/// [crate::InvokerRegistry::async_factory].
pub struct Deferred<T: ?Sized>(PhantomData<fn() -> T>);
