//! Wrapp RDI resolves services described by a declarative configuration.
//!
//! Wrapp RDI is split into three major parts:
//! 1. [Configuration]: Named service descriptors, each saying how a service is produced
//!    (a [FactoryMethod]), how it is completed afterwards (setters) and whether it is
//!    a singleton or a prototype
//! 2. [Invoker]: Binds the declared factories and setters to real functions,
//!    [InvokerRegistry] is the provided implementation
//! 3. [ServiceContainer]: Validates the configuration once and then resolves services
//!    lazily, constructing every singleton at most once even under concurrent requests
//!
//! Singletons are published before their setters run, so services may reference each
//! other through setters. Cycles through factory arguments are rejected when the
//! container is created.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use futures::executor::block_on;
//! use wrapp_rdi::{
//!     Configuration, FactoryMethod, Injectable, InvokerRegistry, ServiceContainer,
//!     ServiceDescriptor, ServiceReference,
//! };
//!
//! struct Repository {
//!     url: Arc<String>,
//! }
//!
//! struct Service {
//!     repository: Arc<Repository>,
//!     retries: Mutex<u32>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repository = ServiceReference::<Repository>::of("repository");
//! let service = ServiceReference::<Service>::of("service");
//!
//! let configuration = Configuration::builder()
//!     .register_service(
//!         ServiceDescriptor::builder(&repository)
//!             .factory_method(FactoryMethod::constructor([Injectable::value(
//!                 String::from("db://local"),
//!             )]))
//!             .build(),
//!     )
//!     .register_service(
//!         ServiceDescriptor::builder(&service)
//!             .factory_method(FactoryMethod::constructor([Injectable::reference(
//!                 &repository,
//!             )]))
//!             .add_setter("setRetries", Injectable::value(3_u32))
//!             .singleton(false)
//!             .build(),
//!     )
//!     .build()?;
//!
//! let invoker = InvokerRegistry::new()
//!     .constructor(|url: Arc<String>| Repository { url })
//!     .constructor(|repository: Arc<Repository>| Service {
//!         repository,
//!         retries: Mutex::new(0),
//!     })
//!     .setter("setRetries", |service: &Service, retries: Arc<u32>| {
//!         *service.retries.lock().unwrap() = *retries;
//!     });
//!
//! let container = ServiceContainer::create(configuration, &invoker)?;
//!
//! let first = block_on(container.get_service(&service))?;
//! let second = block_on(container.get_service(&service))?;
//! assert_eq!(first.repository.url.as_str(), "db://local");
//! assert_eq!(*first.retries.lock().unwrap(), 3);
//! // Prototypes are constructed on every request, their singleton dependency is shared
//! assert!(!Arc::ptr_eq(&first, &second));
//! assert!(Arc::ptr_eq(&first.repository, &second.repository));
//! # Ok(())
//! # }
//! ```

mod builder;
mod cache;
mod container;
mod dependency_graph;
mod descriptor;
mod errors;
mod invoker;
mod reference;
mod resolution;
mod settings;
mod types;

pub use builder::{Configuration, ConfigurationBuilder};
pub use container::{ServiceContainer, ServiceFuture};
pub use dependency_graph::{DependencyGraphError, DependencyGraphErrors};
pub use descriptor::{
    FactoryMethod, Injectable, ServiceDescriptor, ServiceDescriptorBuilder, SetterMethod,
};
pub use errors::{
    BindError, Chain, ConfigurationError, CreateError, InvokeError, ResolveError,
};
pub use invoker::{BoundFactory, BoundSetter, Callable, Invoker, InvokerRegistry, Signature};
pub use reference::{ServiceKey, ServiceReference};
pub use settings::{ContainerSettings, DEFAULT_MAX_RESOLUTION_DEPTH};
pub use types::{Deferred, DynError, Instance, Managed, TypeInfo};
