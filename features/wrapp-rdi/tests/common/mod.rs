#![allow(dead_code)]

use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
};

use tracing_subscriber::EnvFilter;
use wrapp_rdi::{Configuration, InvokerRegistry, ServiceContainer, ServiceReference};

#[derive(Debug, Default)]
pub struct A {
    pub b: Mutex<Option<Arc<B>>>,
    pub value: Mutex<i32>,
}
impl A {
    pub fn with_b(b: Arc<B>) -> Self {
        A {
            b: Mutex::new(Some(b)),
            ..Default::default()
        }
    }

    pub fn with_value(value: Arc<i32>) -> Self {
        A {
            value: Mutex::new(*value),
            ..Default::default()
        }
    }

    pub fn with_b_and_value(b: Arc<B>, value: Arc<i32>) -> Self {
        A {
            b: Mutex::new(Some(b)),
            value: Mutex::new(*value),
        }
    }

    pub fn set_b(&self, b: Arc<B>) {
        *self.b.lock().unwrap() = Some(b);
    }

    pub fn set_value(&self, value: Arc<i32>) {
        *self.value.lock().unwrap() = *value;
    }

    pub fn b(&self) -> Arc<B> {
        self.b.lock().unwrap().clone().expect("b was not injected")
    }

    pub fn value(&self) -> i32 {
        *self.value.lock().unwrap()
    }
}

#[derive(Debug, Default)]
pub struct B {
    pub a: Mutex<Option<Arc<A>>>,
}
impl B {
    pub fn with_a(a: Arc<A>) -> Self {
        B {
            a: Mutex::new(Some(a)),
        }
    }

    pub fn set_a(&self, a: Arc<A>) {
        *self.a.lock().unwrap() = Some(a);
    }

    pub fn a(&self) -> Arc<A> {
        self.a.lock().unwrap().clone().expect("a was not injected")
    }

    pub async fn create(_label: Arc<String>, _value: Arc<i32>) -> Result<B, Infallible> {
        Ok(B::default())
    }
}

pub fn a() -> ServiceReference<A> {
    ServiceReference::of("A")
}

pub fn b() -> ServiceReference<B> {
    ServiceReference::of("B")
}

/// Every operation the A/B configurations use
pub fn registry() -> InvokerRegistry {
    InvokerRegistry::new()
        .default_constructor::<A>()
        .constructor(A::with_b)
        .constructor(A::with_value)
        .constructor(A::with_b_and_value)
        .setter("setB", A::set_b)
        .setter("setValue", A::set_value)
        .default_constructor::<B>()
        .constructor(B::with_a)
        .setter("setA", B::set_a)
        .async_factory("create", B::create)
}

pub fn container(configuration: Configuration) -> ServiceContainer {
    init_tracing();
    ServiceContainer::create(configuration, &registry()).expect("container should be created")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
