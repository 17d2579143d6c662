//! Wrapp Wire computes how to construct a value from a declarative description of providers,
//! the way a compile-time dependency injection generator does.
//!
//! Wrapp Wire is split into three major parts:
//! 1. Provider model: [Provider], [IfaceBinding], [Value] and [ProviderSet], registered in a
//!    [SetRegistry]
//! 2. Merging: [MergeCache] flattens a set and its imports into a [MergedIndex], rejecting
//!    ambiguous and cyclic sets
//! 3. Solving: [solve] and [Injector::solve] turn an index into a [Plan], which [Initiator] can
//!    run in process
//!
//! Every phase collects all errors it can find and returns them together as [Errors].
//!
//! # Examples
//!
//! ```rust
//! use wrapp_wire::{MergeCache, Position, Provider, ProviderSet, SetRegistry, Signature, SolveOptions, Type};
//!
//! let pos = |line| Position::new("app/wire.go", line, 1);
//! let config = Type::named("app", "Config");
//! let db = Type::named("app", "DB");
//!
//! let new_config = Provider::from_function("app", "NewConfig", pos(1), &Signature::new([], [config.clone()]))
//!     .unwrap();
//! let new_db = Provider::from_function(
//!     "app",
//!     "NewDB",
//!     pos(5),
//!     &Signature::new([config], [db.clone(), Type::cleanup(), Type::Error]),
//! )
//! .unwrap();
//!
//! let mut registry = SetRegistry::new();
//! let set = registry.insert(
//!     ProviderSet::builder("app", pos(10))
//!         .add_provider(new_config)
//!         .add_provider(new_db)
//!         .build(),
//! );
//!
//! let cache = MergeCache::new(&registry);
//! let index = cache.merge(set).unwrap();
//! let plan = wrapp_wire::solve(&index, &db, None, &SolveOptions::default()).unwrap();
//!
//! let steps: Vec<String> = plan.steps().iter().map(|step| step.name()).collect();
//! assert_eq!(steps, ["app.NewConfig", "app.NewDB"]);
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod container;
mod cycle;
pub mod dependency_graph;
pub mod errors;
pub mod factories;
pub mod initiator;
pub mod injector;
pub mod plan;
pub mod position;
pub mod provider;
pub mod registry;
pub mod solver;
pub mod types;
pub mod value;

pub use builder::ProviderSetBuilder;
pub use cache::MergeCache;
pub use config::{SolveOptions, UnusedPolicy};
pub use container::{Assembled, Teardowns};
pub use dependency_graph::{MergedIndex, Origin, ProvidedType, SetSource};
pub use errors::{Diagnostic, ErrorCollector, ErrorKind, Errors, InitError, RequireError};
pub use factories::{Constructed, StepFactory, Teardown};
pub use initiator::Initiator;
pub use injector::{Injector, InjectorArg, InjectorArgs, InjectorParam};
pub use plan::{Plan, Step, StepKind};
pub use position::Position;
pub use provider::{Effects, IfaceBinding, OutputSignature, Provider};
pub use registry::{Import, ProviderSet, SetId, SetRegistry};
pub use solver::solve;
pub use types::{DynError, Injectable, Instance, Signature, Type, TypeName, TypeUniverse};
pub use value::{Expr, Value};
