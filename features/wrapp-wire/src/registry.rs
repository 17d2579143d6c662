use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    builder::ProviderSetBuilder,
    errors::{Diagnostic, ErrorCollector, ErrorKind, Errors},
    injector::InjectorArgs,
    position::Position,
    provider::{IfaceBinding, Provider},
    value::Value,
};

/// Handle of a provider set inside a [SetRegistry]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId(usize);

impl SetId {
    pub fn index(self) -> usize {
        self.0
    }
}
impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Import of another provider set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub set: SetId,
    /// Where the import is written
    pub position: Position,
}

/// A named, composable collection of providers, bindings, values and imported sets
#[derive(Debug)]
pub struct ProviderSet {
    /// Position of the call that created the set
    pub position: Position,
    /// Package that declared the set
    pub package: Arc<str>,
    /// Variable name of the set, if it came from a package variable
    pub var_name: Option<Arc<str>>,
    pub providers: Vec<Arc<Provider>>,
    pub bindings: Vec<Arc<IfaceBinding>>,
    pub values: Vec<Arc<Value>>,
    pub imports: Vec<Import>,
    /// Only set for the set an injector builds from
    pub injector_args: Option<Arc<InjectorArgs>>,
}

impl ProviderSet {
    pub fn builder(package: impl Into<Arc<str>>, position: Position) -> ProviderSetBuilder {
        ProviderSetBuilder::new(package.into(), position)
    }

    /// Name used in error messages
    pub fn display_name(&self) -> String {
        match (&self.var_name, &self.injector_args) {
            (Some(name), _) => format!("{name:?}"),
            (None, Some(args)) => format!("injector {:?}", args.name),
            (None, None) => "provider set".to_string(),
        }
    }
}

/// Arena owning every provider set of one generation run
///
/// Sets refer to each other by [SetId]. An id can be reserved before its set is defined, which
/// allows declaring sets in any order.
#[derive(Debug, Default)]
pub struct SetRegistry {
    sets: Vec<Option<Arc<ProviderSet>>>,
}

impl SetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, set: ProviderSet) -> SetId {
        self.sets.push(Some(Arc::new(set)));
        SetId(self.sets.len() - 1)
    }

    /// Reserves an id for a set defined later through [SetRegistry::define]
    pub fn reserve(&mut self) -> SetId {
        self.sets.push(None);
        SetId(self.sets.len() - 1)
    }

    /// Defines a reserved set
    ///
    /// Returns false if the id is unknown or already defined.
    pub fn define(&mut self, id: SetId, set: ProviderSet) -> bool {
        match self.sets.get_mut(id.0) {
            Some(slot @ None) => {
                *slot = Some(Arc::new(set));
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: SetId) -> Option<&Arc<ProviderSet>> {
        self.sets.get(id.0)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Name of a set for error messages
    pub fn describe(&self, id: SetId) -> String {
        match self.get(id) {
            Some(set) if set.var_name.is_some() => set.display_name(),
            _ => format!("provider set {id}"),
        }
    }

    /// Verifies that every set reachable from `root` is defined and no set imports itself
    pub fn check_imports(&self, root: SetId) -> Result<(), Errors> {
        let mut errors = ErrorCollector::new();
        let Some(set) = self.get(root) else {
            errors.add(Diagnostic::new(ErrorKind::UndefinedSet(root)));
            return errors.finish(());
        };

        let mut done = HashSet::new();
        let mut chain = Vec::new();
        check_recurse(self, root, set, &mut done, &mut chain, &mut errors);
        return errors.finish(());

        fn check_recurse(
            registry: &SetRegistry,
            id: SetId,
            set: &ProviderSet,
            done: &mut HashSet<SetId>,
            chain: &mut Vec<SetId>,
            errors: &mut ErrorCollector,
        ) {
            chain.push(id);

            for import in &set.imports {
                // Import Cycle Check
                if let Some(start) = chain.iter().position(|id| *id == import.set) {
                    let mut names: Vec<String> =
                        chain[start..].iter().map(|id| registry.describe(*id)).collect();
                    names.push(registry.describe(import.set));

                    errors.add(Diagnostic::at(
                        import.position.clone(),
                        ErrorKind::ImportCycle { chain: names },
                    ));
                    continue;
                }

                // Skip if already checked
                if !done.insert(import.set) {
                    continue;
                }

                match registry.get(import.set) {
                    Some(next) => check_recurse(registry, import.set, next, done, chain, errors),
                    None => errors.add(Diagnostic::at(
                        import.position.clone(),
                        ErrorKind::UndefinedSet(import.set),
                    )),
                }
            }

            chain.pop();
        }
    }
}
