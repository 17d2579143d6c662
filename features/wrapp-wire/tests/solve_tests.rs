//! Tests for solving merged provider sets into plans

use std::{sync::Arc, thread};

use wrapp_wire::{
    types::{MethodSig, Receiver},
    ErrorKind, Expr, IfaceBinding, Injector, MergeCache, Position, Provider, ProviderSet, SetRegistry,
    Signature, SolveOptions, StepKind, Type, TypeName, TypeUniverse, UnusedPolicy, Value,
};

fn pos(line: u32) -> Position {
    Position::new("app/wire.go", line, 2)
}

fn ty(name: &str) -> Type {
    Type::named("app", name)
}

fn provider(name: &str, line: u32, inputs: Vec<Type>, results: Vec<Type>) -> Provider {
    Provider::from_function("app", name, pos(line), &Signature::new(inputs, results)).unwrap()
}

fn step_names(plan: &wrapp_wire::Plan) -> Vec<String> {
    plan.steps().iter().map(|step| step.name()).collect()
}

#[test]
fn test_every_step_follows_its_inputs() {
    // Layered graph: T{i} needs every T{j} with j < i and (i + j) % 3 == 0
    let types: Vec<Type> = (0..10).map(|i| ty(&format!("T{i}"))).collect();
    let mut builder = ProviderSet::builder("app", pos(1));
    for (i, out) in types.iter().enumerate() {
        let inputs: Vec<Type> = (0..i)
            .filter(|j| (i + j) % 3 == 0)
            .map(|j| types[j].clone())
            .collect();
        builder = builder.add_provider(provider(&format!("New{i}"), 10 + i as u32, inputs, vec![out.clone()]));
    }

    let mut registry = SetRegistry::new();
    let set = registry.insert(builder.build());
    let index = MergeCache::new(&registry).merge(set).unwrap();

    for target in index.outputs() {
        let plan = wrapp_wire::solve(&index, target, None, &SolveOptions::permissive()).unwrap();
        assert_eq!(plan.output().out, *target);

        for (i, step) in plan.steps().iter().enumerate() {
            assert_eq!(step.args.len(), step.inputs.len());
            for (arg, input) in step.args.iter().zip(&step.inputs) {
                assert!(*arg < i, "{} is built after {}", input, step.out);
                assert!(plan.steps()[*arg].produces(input));
            }
        }

        // Each type is built once
        let mut outs: Vec<&Type> = plan.steps().iter().map(|step| &step.out).collect();
        outs.sort();
        outs.dedup();
        assert_eq!(outs.len(), plan.len());
    }
}

#[test]
fn test_db_plan_order_and_effects() {
    let mut registry = SetRegistry::new();
    let set = registry.insert(
        ProviderSet::builder("app", pos(1))
            .add_provider(provider(
                "NewDB",
                10,
                vec![ty("Config")],
                vec![ty("DB"), Type::cleanup(), Type::Error],
            ))
            .add_provider(provider("NewConfig", 20, vec![], vec![ty("Config")]))
            .build(),
    );
    let index = MergeCache::new(&registry).merge(set).unwrap();

    let plan = wrapp_wire::solve(&index, &ty("DB"), None, &SolveOptions::default()).unwrap();
    assert_eq!(step_names(&plan), vec!["app.NewConfig", "app.NewDB"]);
    assert!(plan.is_fallible());
    assert!(plan.has_cleanup());
    assert!(plan.unwind_on_failure(1).is_empty());
    assert_eq!(plan.cleanup_order(), vec![1]);
    assert!(matches!(plan.steps()[0].kind, StepKind::Provider(_)));
}

#[test]
fn test_unwind_runs_in_reverse_construction_order() {
    let mut registry = SetRegistry::new();
    let set = registry.insert(
        ProviderSet::builder("app", pos(1))
            .add_provider(provider("NewConfig", 10, vec![], vec![ty("Config"), Type::cleanup()]))
            .add_provider(provider("NewLogger", 11, vec![ty("Config")], vec![ty("Logger")]))
            .add_provider(provider("NewDB", 12, vec![ty("Logger")], vec![ty("DB"), Type::cleanup()]))
            .add_provider(provider("NewApp", 13, vec![ty("DB")], vec![ty("App"), Type::Error]))
            .build(),
    );
    let index = MergeCache::new(&registry).merge(set).unwrap();

    let plan = wrapp_wire::solve(&index, &ty("App"), None, &SolveOptions::default()).unwrap();
    assert_eq!(plan.unwind_on_failure(3), vec![2, 0]);
    assert_eq!(plan.unwind_on_failure(2), vec![0]);
    assert_eq!(plan.cleanup_order(), vec![2, 0]);
}

#[test]
fn test_solving_an_interface_uses_the_bound_provider() {
    let mut universe = TypeUniverse::new();
    let store = universe.declare_interface(
        TypeName::new("app", "Store"),
        [MethodSig::new("Get", Signature::new([Type::basic("string")], [Type::basic("string")]))],
    );
    let redis = universe.declare_struct(TypeName::new("app", "Redis"), [("Addr", Type::basic("string"))]);
    universe.add_method(
        &TypeName::new("app", "Redis"),
        MethodSig::new("Get", Signature::new([Type::basic("string")], [Type::basic("string")])),
        Receiver::Pointer,
    );

    let mut registry = SetRegistry::new();
    let set = registry.insert(
        ProviderSet::builder("app", pos(1))
            .add_provider(provider("NewRedis", 10, vec![], vec![redis.pointer()]))
            .add_provider(provider("NewApp", 11, vec![store.clone()], vec![ty("App")]))
            .add_binding(IfaceBinding::new(&universe, pos(12), store.clone(), redis.pointer()).unwrap())
            .build(),
    );
    let index = MergeCache::new(&registry).merge(set).unwrap();

    let plan = wrapp_wire::solve(&index, &ty("App"), None, &SolveOptions::default()).unwrap();
    assert_eq!(step_names(&plan), vec!["app.NewRedis", "app.NewApp"]);
    assert_eq!(plan.steps()[0].bound, vec![store.clone()]);
    assert_eq!(plan.step_for(&store).unwrap().out, redis.pointer());
    assert_eq!(plan.steps()[1].inputs, vec![store]);
    assert_eq!(plan.steps()[1].args, vec![0]);
}

#[test]
fn test_values_become_steps() {
    let universe = TypeUniverse::new();
    let options = ty("Options");
    let value = Value::new(
        &universe,
        pos(5),
        Expr::Composite {
            ty: Some(options.clone()),
            elements: vec![Expr::Literal("3".into())],
        },
        options.clone(),
    )
    .unwrap();

    let mut registry = SetRegistry::new();
    let set = registry.insert(
        ProviderSet::builder("app", pos(1))
            .add_value(value)
            .add_provider(provider("NewClient", 10, vec![options], vec![ty("Client")]))
            .build(),
    );
    let index = MergeCache::new(&registry).merge(set).unwrap();

    let plan = wrapp_wire::solve(&index, &ty("Client"), None, &SolveOptions::default()).unwrap();
    assert_eq!(step_names(&plan), vec!["app.Options{3}", "app.NewClient"]);
    assert!(matches!(plan.steps()[0].kind, StepKind::Value(_)));
}

#[test]
fn test_missing_dependencies_are_all_reported() {
    let mut registry = SetRegistry::new();
    let set = registry.insert(
        ProviderSet::builder("app", pos(1))
            .add_provider(provider("NewApp", 10, vec![ty("DB"), ty("Cache")], vec![ty("App")]))
            .add_provider(provider("NewDB", 11, vec![ty("Config")], vec![ty("DB")]))
            .add_provider(provider("NewCache", 12, vec![ty("Config")], vec![ty("Cache")]))
            .build(),
    );
    let index = MergeCache::new(&registry).merge(set).unwrap();

    let errors = wrapp_wire::solve(&index, &ty("App"), None, &SolveOptions::default()).unwrap_err();
    // Config is reported once, through the first requester
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.errors[0].to_string(),
        "app/wire.go:11:2: no provider found for app.Config\nneeded by app.DB in provider \"NewDB\" (app/wire.go:11:2)\nneeded by app.App in provider \"NewApp\" (app/wire.go:10:2)"
    );
}

fn db_set(registry: &mut SetRegistry, injector: &Injector) -> wrapp_wire::SetId {
    let set = injector
        .build_set()
        .add_provider(provider(
            "NewDB",
            10,
            vec![ty("Config")],
            vec![ty("DB"), Type::cleanup(), Type::Error],
        ))
        .build();
    registry.insert(set)
}

#[test]
fn test_injector_arguments_and_effects() {
    let injector = Injector::new(
        "app",
        "initDB",
        pos(30),
        [("cfg", ty("Config"))],
        &[ty("DB"), Type::cleanup(), Type::Error],
    )
    .unwrap();
    let mut registry = SetRegistry::new();
    let set = db_set(&mut registry, &injector);
    let cache = MergeCache::new(&registry);

    let plan = injector.solve(&cache, set, &SolveOptions::default()).unwrap();
    assert_eq!(step_names(&plan), vec!["cfg", "app.NewDB"]);
    assert!(matches!(plan.steps()[0].kind, StepKind::Argument(ref arg) if arg.index == 0));
    assert_eq!(plan.steps()[0].position(), &pos(30));
    assert_eq!(plan.steps()[1].position(), &pos(10));
}

#[test]
fn test_injector_must_allow_step_effects() {
    let injector = Injector::new("app", "initDB", pos(30), [("cfg", ty("Config"))], &[ty("DB")]).unwrap();
    let mut registry = SetRegistry::new();
    let set = db_set(&mut registry, &injector);
    let cache = MergeCache::new(&registry);

    let errors = injector.solve(&cache, set, &SolveOptions::default()).unwrap_err();
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert_eq!(
        messages,
        vec![
            "app/wire.go:10:2: inject initDB: provider for app.DB returns error but injection not allowed to fail",
            "app/wire.go:10:2: inject initDB: provider for app.DB returns cleanup but injection does not return cleanup function",
        ]
    );
}

#[test]
fn test_injector_signature_is_validated() {
    let error = Injector::new(
        "app",
        "initDB",
        pos(30),
        Vec::<(&str, Type)>::new(),
        &[ty("DB"), Type::basic("int")],
    )
    .unwrap_err();
    assert_eq!(
        error.to_string(),
        "app/wire.go:30:2: inject initDB: second return type is int; must be error or func()"
    );
}

#[test]
fn test_unused_arguments_follow_policy() {
    let injector = Injector::new(
        "app",
        "initDB",
        pos(30),
        [("cfg", ty("Config")), ("verbose", Type::basic("bool"))],
        &[ty("DB"), Type::cleanup(), Type::Error],
    )
    .unwrap();
    let mut registry = SetRegistry::new();
    let set = db_set(&mut registry, &injector);
    let cache = MergeCache::new(&registry);

    let errors = injector.solve(&cache, set, &SolveOptions::default()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors.errors[0].kind,
        ErrorKind::Injector { cause, .. } if matches!(**cause, ErrorKind::UnusedArgument { ref name, .. } if name == "verbose")
    ));

    let options = SolveOptions::new().unused_arguments(UnusedPolicy::Allow);
    let plan = injector.solve(&cache, set, &options).unwrap();
    assert_eq!(plan.unused_arguments().len(), 1);
    assert_eq!(plan.unused_arguments()[0].ty(), &Type::basic("bool"));
}

#[test]
fn test_unused_declarations_follow_policy() {
    let mut registry = SetRegistry::new();
    let metrics = registry.insert(
        ProviderSet::builder("app", pos(1))
            .name("Metrics")
            .add_provider(provider("NewMetrics", 5, vec![], vec![ty("Metrics")]))
            .build(),
    );
    let set = registry.insert(
        ProviderSet::builder("app", pos(2))
            .import(metrics, pos(3))
            .add_provider(provider("NewConfig", 10, vec![], vec![ty("Config")]))
            .build(),
    );
    let index = MergeCache::new(&registry).merge(set).unwrap();

    let errors = wrapp_wire::solve(&index, &ty("Config"), None, &SolveOptions::default()).unwrap_err();
    assert_eq!(errors.errors[0].to_string(), "app/wire.go:3:2: unused provider set \"Metrics\"");

    let options = SolveOptions::default().unused_declarations(UnusedPolicy::Allow);
    assert!(wrapp_wire::solve(&index, &ty("Config"), None, &options).is_ok());
}

#[test]
fn test_concurrent_solves_share_one_index() {
    let mut registry = SetRegistry::new();
    let base = registry.insert(
        ProviderSet::builder("app", pos(1))
            .add_provider(provider("NewConfig", 10, vec![], vec![ty("Config")]))
            .add_provider(provider("NewLogger", 11, vec![ty("Config")], vec![ty("Logger")]))
            .build(),
    );
    let sets: Vec<_> = (0..4)
        .map(|i| {
            registry.insert(
                ProviderSet::builder("app", pos(20 + i))
                    .import(base, pos(20 + i))
                    .add_provider(provider("NewApp", 30 + i, vec![ty("Logger")], vec![ty("App")]))
                    .build(),
            )
        })
        .collect();

    let cache = MergeCache::new(&registry);
    let indexes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = sets
            .iter()
            .map(|set| {
                let cache = &cache;
                scope.spawn(move || {
                    let index = cache.merge(*set).unwrap();
                    let plan = wrapp_wire::solve(&index, &ty("App"), None, &SolveOptions::default()).unwrap();
                    assert_eq!(plan.len(), 3);
                    index
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let shared = cache.merge(base).unwrap();
    for index in &indexes {
        match index.source(&ty("Logger")) {
            Some(wrapp_wire::SetSource::Import { index: imported, .. }) => {
                assert!(Arc::ptr_eq(imported, &shared));
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
}
