use std::{fmt::Debug, marker::PhantomData, sync::Arc};

use crate::types::{Managed, TypeInfo};

/// Untyped identity of a service: its name and the type it is declared as
///
/// Two keys with the same name and type are interchangeable.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceKey {
    name: Arc<str>,
    type_info: TypeInfo,
}
impl ServiceKey {
    pub fn new(name: impl Into<Arc<str>>, type_info: TypeInfo) -> Self {
        Self {
            name: name.into(),
            type_info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }
}
impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Typed handle to a service, used to register and to look it up
pub struct ServiceReference<T: ?Sized> {
    key: ServiceKey,
    _type: PhantomData<fn() -> T>,
}
impl<T: Managed> ServiceReference<T> {
    pub fn of(name: impl Into<Arc<str>>) -> Self {
        Self {
            key: ServiceKey::new(name, TypeInfo::of::<T>()),
            _type: PhantomData,
        }
    }
}
impl<T: ?Sized> ServiceReference<T> {
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }
}
impl<T: ?Sized> Clone for ServiceReference<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _type: PhantomData,
        }
    }
}
impl<T: ?Sized> Debug for ServiceReference<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ServiceReference").field(&self.key).finish()
    }
}
impl<T: ?Sized> PartialEq for ServiceReference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<T: ?Sized> Eq for ServiceReference<T> {}
impl<T: ?Sized> From<&ServiceReference<T>> for ServiceKey {
    fn from(reference: &ServiceReference<T>) -> Self {
        reference.key.clone()
    }
}
