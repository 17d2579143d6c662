use wrapp_wire::{
    Constructed, DynError, Initiator, Injector, Instance, MergeCache, Position, Provider, SetRegistry,
    Signature, SolveOptions, Type,
};

fn main() {
    let pos = |line| Position::new("guestbook/wire.go", line, 1);
    let config = Type::named("guestbook", "Config");
    let db = Type::named("guestbook", "DB");

    let new_config = Provider::from_function(
        "guestbook",
        "NewConfig",
        pos(10),
        &Signature::new([], [config.clone()]),
    )
    .unwrap();
    let new_db = Provider::from_function(
        "guestbook",
        "NewDB",
        pos(20),
        &Signature::new([config.clone()], [db.clone(), Type::cleanup(), Type::Error]),
    )
    .unwrap();

    let injector = Injector::new(
        "guestbook",
        "initDB",
        pos(30),
        Vec::<(&str, Type)>::new(),
        &[db.clone(), Type::cleanup(), Type::Error],
    )
    .unwrap();

    let mut registry = SetRegistry::new();
    let set = registry.insert(
        injector
            .build_set()
            .add_provider(new_config)
            .add_provider(new_db)
            .build(),
    );

    let cache = MergeCache::new(&registry);
    let plan = match injector.solve(&cache, set, &SolveOptions::default()) {
        Ok(plan) => plan,
        Err(errors) => {
            eprintln!("{errors}");
            return;
        }
    };
    println!("{plan}");

    let initiator = Initiator::new()
        .add_factory(config, |_: Vec<Instance>| async {
            Ok::<_, DynError>(Constructed::new("sqlite://guestbook.db".to_string()))
        })
        .add_factory(db, |inputs: Vec<Instance>| async move {
            let url = inputs[0].downcast::<String>().map_err(|ty| format!("config is {ty}"))?;
            println!("Opening {url}");
            Ok::<_, DynError>(
                Constructed::new(Guestbook(url.to_string()))
                    .with_teardown(|| println!("Closing guestbook")),
            )
        });

    let app = futures::executor::block_on(initiator.initiate(&plan, vec![])).unwrap();
    println!("{:?}", app);
    println!("{}", app.get::<Guestbook>().unwrap().0);
}

struct Guestbook(String);
