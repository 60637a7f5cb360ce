mod common;

use std::{
    convert::Infallible,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use common::{a, b, container, init_tracing, registry, A, B};
use futures::{channel::oneshot, executor::block_on, FutureExt};
use wrapp_rdi::{
    BindError, Configuration, ConfigurationError, ContainerSettings, CreateError, Deferred,
    DependencyGraphError, FactoryMethod, Injectable, InvokerRegistry, ResolveError,
    ServiceContainer, ServiceDescriptor, ServiceReference, DEFAULT_MAX_RESOLUTION_DEPTH,
};

fn create_error(configuration: Configuration) -> CreateError {
    init_tracing();
    ServiceContainer::create(configuration, &registry())
        .err()
        .expect("creation should fail")
}

#[test]
fn resolves_service_without_dependencies() {
    let configuration = Configuration::builder()
        .register_service(ServiceDescriptor::builder(&a()).build())
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    assert!(a.b.lock().unwrap().is_none());
    assert_eq!(a.value(), 0);
}

#[test]
fn factory_self_reference_fails_on_create() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&a())]))
                .build(),
        )
        .build()
        .unwrap();

    let CreateError::DependencyGraph(graph) = create_error(configuration) else {
        panic!("expected a dependency graph error");
    };
    assert_eq!(graph.errors.len(), 1);
    let DependencyGraphError::CircularDependency { chain } = &graph.errors[0] else {
        panic!("expected a circular dependency");
    };
    assert_eq!(chain.to_string(), "[A -> A]");
}

#[test]
fn missing_reference_fails_on_create() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .build()
        .unwrap();

    let CreateError::DependencyGraph(graph) = create_error(configuration) else {
        panic!("expected a dependency graph error");
    };
    assert!(matches!(
        &graph.errors[..],
        [DependencyGraphError::MissingReference { reference, required_by }]
            if reference == b().key() && required_by == a().key()
    ));
}

#[test]
fn missing_setter_reference_fails_on_create() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setB", Injectable::reference(&b()))
                .build(),
        )
        .build()
        .unwrap();

    assert!(matches!(
        create_error(configuration),
        CreateError::DependencyGraph(_)
    ));
}

#[test]
fn injects_dependency_through_factory() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .register_service(ServiceDescriptor::builder(&b()).build())
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    let b = block_on(container.get_service(&b())).unwrap();
    assert!(Arc::ptr_eq(&a.b(), &b));
}

#[test]
fn factory_and_setter_cycle_shares_singleton() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .add_setter("setA", Injectable::reference(&a()))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    assert!(Arc::ptr_eq(&a, &a.b().a()));
}

#[test]
fn factory_and_setter_cycle_resolves_from_either_side() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .add_setter("setA", Injectable::reference(&a()))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let b = block_on(container.get_service(&b())).unwrap();
    let a = block_on(container.get_service(&a())).unwrap();
    assert!(Arc::ptr_eq(&b.a(), &a));
    assert!(Arc::ptr_eq(&a.b(), &b));
}

#[test]
fn setter_cycle_of_singletons_is_consistent() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setB", Injectable::reference(&b()))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .add_setter("setA", Injectable::reference(&a()))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    assert!(Arc::ptr_eq(&a, &a.b().a()));

    let b = block_on(container.get_service(&b())).unwrap();
    assert!(Arc::ptr_eq(&a.b(), &b));
}

#[test]
fn setter_cycle_with_prototype_shares_singleton() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .singleton(false)
                .add_setter("setB", Injectable::reference(&b()))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .add_setter("setA", Injectable::reference(&a()))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let first = block_on(container.get_service(&a())).unwrap();
    assert!(!Arc::ptr_eq(&first, &first.b().a()));
    assert!(Arc::ptr_eq(&first.b(), &first.b().a().b()));

    let second = block_on(container.get_service(&a())).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.b(), &second.b()));
}

#[test]
fn setter_cycle_of_prototypes_fails_at_runtime() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .singleton(false)
                .add_setter("setB", Injectable::reference(&b()))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .singleton(false)
                .add_setter("setA", Injectable::reference(&a()))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let error = block_on(container.get_service(&a())).unwrap_err();
    let ResolveError::CircularInstantiation { chain } = error else {
        panic!("expected circular instantiation, got {error}");
    };
    assert_eq!(chain.to_string(), "[A -> B -> A]");
}

#[test]
fn injects_value_through_factory() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::value(1304_i32)]))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    assert_eq!(a.value(), 1304);
}

#[test]
fn injects_value_through_setter() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setValue", Injectable::value(1304_i32))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    assert_eq!(a.value(), 1304);
}

#[test]
fn injects_reference_and_value_through_factory() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([
                    Injectable::reference(&b()),
                    Injectable::value(1304_i32),
                ]))
                .build(),
        )
        .register_service(ServiceDescriptor::builder(&b()).build())
        .build()
        .unwrap();
    let container = container(configuration);

    let a = block_on(container.get_service(&a())).unwrap();
    assert_eq!(a.value(), 1304);
    assert!(a.b.lock().unwrap().is_some());
}

#[test]
fn resolves_asynchronous_named_factory() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&b())
                .factory_method(FactoryMethod::static_factory::<Deferred<B>>(
                    "create",
                    [
                        Injectable::value(String::from("test")),
                        Injectable::value(1304_i32),
                    ],
                ))
                .build(),
        )
        .build()
        .unwrap();
    let container = container(configuration);

    let b = block_on(container.get_service(&b())).unwrap();
    assert!(b.a.lock().unwrap().is_none());
}

#[test]
fn duplicate_registration_is_rejected() {
    let error = Configuration::builder()
        .register_service(ServiceDescriptor::builder(&a()).build())
        .register_service(ServiceDescriptor::builder(&a()).singleton(false).build())
        .build()
        .unwrap_err();

    let ConfigurationError::Duplicate(key) = error;
    assert_eq!(&key, a().key());
}

#[test]
fn unbindable_operations_fail_on_create() {
    let unknown_constructor = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::value(
                    String::from("1304"),
                )]))
                .build(),
        )
        .build()
        .unwrap();
    assert!(matches!(
        create_error(unknown_constructor),
        CreateError::Bind(BindError::NoSuchOperation { .. })
    ));

    let unknown_setter = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setName", Injectable::value(String::from("a")))
                .build(),
        )
        .build()
        .unwrap();
    assert!(matches!(
        create_error(unknown_setter),
        CreateError::Bind(BindError::NoSuchOperation { .. })
    ));
}

#[test]
fn declared_return_type_must_match() {
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&b())
                .factory_method(FactoryMethod::static_factory::<B>(
                    "create",
                    [
                        Injectable::value(String::from("test")),
                        Injectable::value(1304_i32),
                    ],
                ))
                .build(),
        )
        .build()
        .unwrap();

    assert!(matches!(
        create_error(configuration),
        CreateError::Bind(BindError::ReturnTypeMismatch { .. })
    ));
}

#[test]
fn failing_factory_reports_chain_and_is_retried() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let registry = InvokerRegistry::new()
        .factory("broken", move || {
            counted.fetch_add(1, Ordering::SeqCst);
            Err::<A, _>(io::Error::other("boom"))
        })
        .constructor(B::with_a);

    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::static_factory::<A>("broken", []))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&a())]))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    let error = block_on(container.get_service(&b())).unwrap_err();
    let ResolveError::Instantiation {
        service,
        chain,
        error,
    } = error
    else {
        panic!("expected an instantiation error");
    };
    assert_eq!(&service, a().key());
    assert_eq!(chain.to_string(), "[B -> A]");
    assert_eq!(error.to_string(), "boom");

    // Failures are not cached, the next request starts over
    assert!(block_on(container.get_service(&a())).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!container.is_cached(a().key()));
}

#[test]
fn failing_setter_reports_injection_error() {
    init_tracing();
    let registry = registry().try_setter("checkValue", |_: &A, value: Arc<i32>| {
        if *value < 0 {
            return Err(io::Error::other("negative value"));
        }
        Ok(())
    });

    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setValue", Injectable::value(1_i32))
                .add_setter("checkValue", Injectable::value(-1_i32))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    let error = block_on(container.get_service(&a())).unwrap_err();
    let ResolveError::Injection {
        service, setter, ..
    } = &error
    else {
        panic!("expected an injection error, got {error}");
    };
    assert_eq!(service, a().key());
    assert_eq!(setter, "checkValue");
    assert_eq!(error.chain().unwrap().keys(), [a().key().clone()]);

    // The instance was published before its setters ran
    assert!(container.is_cached(a().key()));
}

#[test]
fn setter_waiting_for_singleton_runs_once_it_is_published() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let registry = registry().constructor(move |b: Arc<B>| {
        counted.fetch_add(1, Ordering::SeqCst);
        A::with_b(b)
    });

    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .add_setter("setA", Injectable::reference(&a()))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    let first = block_on(container.get_service(&a())).unwrap();
    let again = block_on(container.get_service(&a())).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert!(Arc::ptr_eq(&first, &first.b().a()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn handle_is_lazy_and_shares_its_outcome() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let registry = InvokerRegistry::new().constructor(move || {
        counted.fetch_add(1, Ordering::SeqCst);
        A::default()
    });

    let configuration = Configuration::builder()
        .register_service(ServiceDescriptor::builder(&a()).singleton(false).build())
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    let handle = container.get_service(&a());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let first = block_on(handle.clone()).unwrap();
    let second = block_on(handle).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A new request is a new evaluation
    let third = block_on(container.get_service(&a())).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn unregistered_reference_fails_at_runtime() {
    let configuration = Configuration::builder()
        .register_service(ServiceDescriptor::builder(&a()).build())
        .build()
        .unwrap();
    let container = container(configuration);

    let unknown = ServiceReference::<A>::of("unknown");
    assert!(matches!(
        block_on(container.get_service(&unknown)),
        Err(ResolveError::NotRegistered(key)) if &key == unknown.key()
    ));
}

#[test]
fn resolution_depth_is_bounded() {
    init_tracing();
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .singleton(false)
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .register_service(ServiceDescriptor::builder(&b()).singleton(false).build())
        .build()
        .unwrap();
    let container = ServiceContainer::create_with(
        configuration,
        &registry(),
        ContainerSettings::default().with_max_resolution_depth(1),
    )
    .unwrap();

    assert!(block_on(container.get_service(&b())).is_ok());
    assert!(matches!(
        block_on(container.get_service(&a())),
        Err(ResolveError::DepthExceeded { limit: 1, .. })
    ));
}

#[test]
fn debug_lists_singleton_state() {
    let configuration = Configuration::builder()
        .register_service(ServiceDescriptor::builder(&a()).build())
        .register_service(ServiceDescriptor::builder(&b()).singleton(false).build())
        .build()
        .unwrap();
    let container = container(configuration);

    assert_eq!(
        format!("{container:?}"),
        r#"ServiceContainer { A: "pending", B: "prototype" }"#
    );
    block_on(container.get_service(&a())).unwrap();
    assert_eq!(
        format!("{container:?}"),
        r#"ServiceContainer { A: "cached", B: "prototype" }"#
    );
}

#[test]
fn infallible_factory_error_type_is_accepted() {
    init_tracing();
    let registry = InvokerRegistry::new().factory("make", || Ok::<_, Infallible>(B::default()));
    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&b())
                .factory_method(FactoryMethod::static_factory::<B>("make", []))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    assert!(block_on(container.get_service(&b())).is_ok());
}

#[test]
fn setters_keep_declared_order_when_deferred() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (on_a, on_label) = (order.clone(), order.clone());
    let registry = registry()
        .setter("setA", move |b: &B, a: Arc<A>| {
            on_a.lock().unwrap().push("setA");
            b.set_a(a);
        })
        .setter("setLabel", move |_: &B, _: Arc<i32>| {
            on_label.lock().unwrap().push("setLabel");
        });

    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .factory_method(FactoryMethod::constructor([Injectable::reference(&b())]))
                .build(),
        )
        .register_service(
            ServiceDescriptor::builder(&b())
                .add_setter("setA", Injectable::reference(&a()))
                .add_setter("setLabel", Injectable::value(1_i32))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    let first = block_on(container.get_service(&a())).unwrap();
    assert!(Arc::ptr_eq(&first, &first.b().a()));
    assert_eq!(*order.lock().unwrap(), ["setA", "setLabel"]);
}

#[derive(Debug, Default)]
struct Node {
    next: Mutex<Option<Arc<Node>>>,
}

/// Prototypes `n0 -> n1 -> ...` linked through setters, none repeating
fn node_chain(length: usize) -> (ServiceContainer, ServiceReference<Node>) {
    init_tracing();
    let registry = InvokerRegistry::new()
        .default_constructor::<Node>()
        .setter("setNext", |node: &Node, next: Arc<Node>| {
            *node.next.lock().unwrap() = Some(next);
        });

    let nodes: Vec<ServiceReference<Node>> = (0..length)
        .map(|index| ServiceReference::of(format!("n{index}")))
        .collect();
    let mut builder = Configuration::builder();
    for (index, node) in nodes.iter().enumerate() {
        let mut descriptor = ServiceDescriptor::builder(node).singleton(false);
        if let Some(next) = nodes.get(index + 1) {
            descriptor = descriptor.add_setter("setNext", Injectable::reference(next));
        }
        builder = builder.register_service(descriptor.build());
    }

    let container = ServiceContainer::create(builder.build().unwrap(), &registry).unwrap();
    (container, nodes[0].clone())
}

#[test]
fn chain_as_deep_as_the_default_limit_resolves() {
    let (container, head) = node_chain(DEFAULT_MAX_RESOLUTION_DEPTH);

    let mut node = block_on(container.get_service(&head)).unwrap();
    let mut length = 1;
    loop {
        let next = node.next.lock().unwrap().clone();
        let Some(next) = next else { break };
        node = next;
        length += 1;
    }
    assert_eq!(length, DEFAULT_MAX_RESOLUTION_DEPTH);
}

#[test]
fn chain_past_the_default_limit_reports_depth() {
    let (container, head) = node_chain(DEFAULT_MAX_RESOLUTION_DEPTH + 1);

    let error = block_on(container.get_service(&head)).unwrap_err();
    let ResolveError::DepthExceeded { limit, chain } = &error else {
        panic!("expected the depth limit to be reached, got {error}");
    };
    assert_eq!(*limit, DEFAULT_MAX_RESOLUTION_DEPTH);
    assert_eq!(chain.keys().len(), DEFAULT_MAX_RESOLUTION_DEPTH + 1);
    assert!(error.to_string().contains("depth limit"));
}

#[test]
fn async_setter_is_awaited_before_resolution_completes() {
    init_tracing();
    let (open, gate) = oneshot::channel::<()>();
    let gate = gate.shared();
    let registry = registry().async_setter("setLater", move |a: Arc<A>, value: Arc<i32>| {
        let gate = gate.clone();
        async move {
            let _ = gate.await;
            a.set_value(value);
            Ok::<_, Infallible>(())
        }
    });

    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setLater", Injectable::value(1304_i32))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    block_on(async {
        let mut handle = container.get_service(&a());
        assert!(futures::poll!(&mut handle).is_pending());
        // Published before its setters finished
        assert!(container.is_cached(a().key()));

        let _ = open.send(());
        let resolved = handle.await.unwrap();
        assert_eq!(resolved.value(), 1304);
    });
}

#[test]
fn failing_async_setter_reports_injection_error() {
    init_tracing();
    let registry = registry().async_setter("setChecked", |a: Arc<A>, value: Arc<i32>| async move {
        if *value < 0 {
            return Err(io::Error::other("negative value"));
        }
        a.set_value(value);
        Ok(())
    });

    let configuration = Configuration::builder()
        .register_service(
            ServiceDescriptor::builder(&a())
                .add_setter("setChecked", Injectable::value(-1_i32))
                .build(),
        )
        .build()
        .unwrap();
    let container = ServiceContainer::create(configuration, &registry).unwrap();

    let error = block_on(container.get_service(&a())).unwrap_err();
    assert!(matches!(
        error,
        ResolveError::Injection { ref setter, ref error, .. }
            if setter == "setChecked" && error.to_string() == "negative value"
    ));
}
