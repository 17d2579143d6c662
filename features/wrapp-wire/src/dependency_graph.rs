use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    cycle::verify_acyclic,
    errors::{Diagnostic, ErrorCollector, ErrorKind, Errors},
    injector::InjectorArg,
    position::Position,
    provider::{IfaceBinding, Provider},
    registry::{Import, ProviderSet, SetId},
    types::Type,
    value::Value,
};

/// The rule that ends up producing a type
#[derive(Debug, Clone)]
pub enum Origin {
    Provider(Arc<Provider>),
    Value(Arc<Value>),
    Argument(InjectorArg),
}

impl Origin {
    /// True if both point at the same declaration, not just equal ones
    pub fn same_rule(&self, other: &Origin) -> bool {
        match (self, other) {
            (Origin::Provider(a), Origin::Provider(b)) => Arc::ptr_eq(a, b),
            (Origin::Value(a), Origin::Value(b)) => Arc::ptr_eq(a, b),
            (Origin::Argument(a), Origin::Argument(b)) => a.is(b),
            _ => false,
        }
    }

    /// Types that must exist before this rule can run
    pub fn inputs(&self) -> &[Type] {
        match self {
            Origin::Provider(provider) => &provider.inputs,
            Origin::Value(_) | Origin::Argument(_) => &[],
        }
    }

    pub fn name(&self) -> String {
        match self {
            Origin::Provider(provider) => provider.qualified_name(),
            Origin::Value(value) => format!("value {}", value.expr),
            Origin::Argument(arg) => format!("argument {}", arg.param().name),
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Origin::Provider(provider) => &provider.position,
            Origin::Value(value) => &value.position,
            Origin::Argument(arg) => &arg.args.position,
        }
    }
}

/// What a requested type resolves to
#[derive(Debug, Clone)]
pub struct ProvidedType {
    /// The concrete type the origin produces. Differs from the requested type for bound interfaces
    pub ty: Type,
    pub origin: Origin,
}

/// Where a type of a merged set comes from, as far as that set is concerned
#[derive(Debug, Clone)]
pub enum SetSource {
    Provider(Arc<Provider>),
    Binding(Arc<IfaceBinding>),
    Value(Arc<Value>),
    Import {
        set: SetId,
        name: String,
        /// Where the import is written
        position: Position,
        index: Arc<MergedIndex>,
    },
    Argument(InjectorArg),
}

impl SetSource {
    pub fn description(&self) -> String {
        match self {
            SetSource::Provider(provider) if provider.is_struct => {
                format!("struct provider {:?} ({})", provider.name, provider.position)
            }
            SetSource::Provider(provider) => {
                format!("provider {:?} ({})", provider.name, provider.position)
            }
            SetSource::Binding(binding) => format!("Bind ({})", binding.position),
            SetSource::Value(value) => format!("Value ({})", value.position),
            SetSource::Import { name, position, .. } => {
                format!("provider set {name} ({position})")
            }
            SetSource::Argument(arg) => format!(
                "argument {} to injector function {} ({})",
                arg.param().name,
                arg.args.name,
                arg.args.position
            ),
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            SetSource::Provider(provider) => &provider.position,
            SetSource::Binding(binding) => &binding.position,
            SetSource::Value(value) => &value.position,
            SetSource::Import { position, .. } => position,
            SetSource::Argument(arg) => &arg.args.position,
        }
    }

    /// Descriptions from the rule that declares `ty` up to this source
    pub fn trace(&self, ty: &Type) -> Vec<String> {
        let mut lines = match self {
            SetSource::Import { index, .. } => index.trace(ty),
            _ => Vec::new(),
        };
        lines.push(self.description());
        lines
    }
}

/// A provider set flattened into one authoritative source per type
///
/// Built by [MergeCache](crate::cache::MergeCache). Once built it is acyclic and unambiguous.
#[derive(Debug)]
pub struct MergedIndex {
    set: Arc<ProviderSet>,
    providers: BTreeMap<Type, ProvidedType>,
    sources: BTreeMap<Type, SetSource>,
    import_names: BTreeMap<SetId, String>,
}

impl MergedIndex {
    pub fn set(&self) -> &Arc<ProviderSet> {
        &self.set
    }

    pub fn provided(&self, ty: &Type) -> Option<&ProvidedType> {
        self.providers.get(ty)
    }

    pub fn source(&self, ty: &Type) -> Option<&SetSource> {
        self.sources.get(ty)
    }

    /// Every type this set can produce, in type order
    pub fn outputs(&self) -> impl Iterator<Item = &Type> {
        self.providers.keys()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn trace(&self, ty: &Type) -> Vec<String> {
        self.sources
            .get(ty)
            .map(|source| source.trace(ty))
            .unwrap_or_default()
    }

    /// Name of a directly imported set
    pub fn import_name(&self, id: SetId) -> Option<&str> {
        self.import_names.get(&id).map(String::as_str)
    }

    /// Merges `set` on top of its already merged imports
    ///
    /// Local declarations shadow imports, bindings replace producers of their interface and every
    /// remaining duplicate is an error.
    pub(crate) fn build(
        id: SetId,
        set: Arc<ProviderSet>,
        imports: Vec<(Import, String, Result<Arc<MergedIndex>, Errors>)>,
    ) -> Result<Arc<MergedIndex>, Errors> {
        tracing::debug!(
            "Merging {} {id} with {} providers, {} bindings, {} values and {} imports",
            set.display_name(),
            set.providers.len(),
            set.bindings.len(),
            set.values.len(),
            set.imports.len()
        );

        let mut errors = ErrorCollector::new();
        let mut merger = Merger {
            set_name: set.display_name(),
            providers: BTreeMap::new(),
            sources: BTreeMap::new(),
        };

        // Types declared at this level, imports never provide these
        let mut local: BTreeSet<Type> = BTreeSet::new();
        for provider in &set.providers {
            local.extend(provider.outputs.iter().cloned());
        }
        for value in &set.values {
            local.insert(value.out.clone());
        }
        for binding in &set.bindings {
            local.insert(binding.iface.clone());
        }
        if let Some(args) = &set.injector_args {
            local.extend(args.params.iter().map(|param| param.ty.clone()));
        }

        // An import failed to merge, its types are unknown
        let mut failed_import = false;
        let mut import_names = BTreeMap::new();
        for (import, name, result) in imports {
            import_names.insert(import.set, name.clone());

            let index = match result {
                Ok(index) => index,
                Err(import_errors) => {
                    failed_import = true;
                    errors.extend(
                        import_errors
                            .into_iter()
                            .map(|error| error.in_import(name.clone(), import.position.clone())),
                    );
                    continue;
                }
            };

            for (ty, provided) in &index.providers {
                if local.contains(ty) {
                    tracing::debug!("{} shadows {ty} from {name}", merger.set_name);
                    continue;
                }

                let source = SetSource::Import {
                    set: import.set,
                    name: name.clone(),
                    position: import.position.clone(),
                    index: index.clone(),
                };

                if let Some(existing) = merger.providers.get(ty) {
                    // Diamond imports reach the same rule twice
                    if existing.ty == provided.ty && existing.origin.same_rule(&provided.origin) {
                        continue;
                    }
                }

                merger.insert(ty, provided.clone(), source, &mut errors);
            }
        }

        for provider in &set.providers {
            let origin = Origin::Provider(provider.clone());
            for out in &provider.outputs {
                let provided = ProvidedType {
                    ty: out.clone(),
                    origin: origin.clone(),
                };
                merger.insert(out, provided, SetSource::Provider(provider.clone()), &mut errors);
            }
        }

        for value in &set.values {
            let provided = ProvidedType {
                ty: value.out.clone(),
                origin: Origin::Value(value.clone()),
            };
            merger.insert(&value.out, provided, SetSource::Value(value.clone()), &mut errors);
        }

        if let Some(args) = &set.injector_args {
            for arg in args.args() {
                let ty = arg.ty().clone();
                let provided = ProvidedType {
                    ty: ty.clone(),
                    origin: Origin::Argument(arg.clone()),
                };
                merger.insert(&ty, provided, SetSource::Argument(arg), &mut errors);
            }
        }

        let mut bound: BTreeMap<Type, Arc<IfaceBinding>> = BTreeMap::new();
        for binding in &set.bindings {
            if let Some(previous) = bound.get(&binding.iface) {
                errors.add(merger.conflict(
                    &binding.iface,
                    &SetSource::Binding(binding.clone()),
                    &SetSource::Binding(previous.clone()),
                ));
                continue;
            }
            bound.insert(binding.iface.clone(), binding.clone());

            let Some(concrete) = merger.providers.get(&binding.provided).cloned() else {
                if failed_import {
                    tracing::debug!(
                        "Skipping binding of {} to {} after a failed import",
                        binding.provided,
                        binding.iface
                    );
                    continue;
                }
                errors.add(Diagnostic::at(
                    binding.position.clone(),
                    ErrorKind::UnprovidedBinding {
                        concrete: binding.provided.clone(),
                        iface: binding.iface.clone(),
                        set: merger.set_name.clone(),
                    },
                ));
                continue;
            };

            let source = SetSource::Binding(binding.clone());
            match merger.sources.get(&binding.iface) {
                Some(previous @ SetSource::Argument(_)) => {
                    errors.add(merger.conflict(&binding.iface, &source, previous));
                    continue;
                }
                Some(previous) => {
                    tracing::debug!(
                        "Binding of {} replaces {}",
                        binding.iface,
                        previous.description()
                    );
                }
                None => {}
            }

            merger.providers.insert(binding.iface.clone(), concrete);
            merger.sources.insert(binding.iface.clone(), source);
        }

        let Merger {
            providers, sources, ..
        } = merger;
        let providers = errors.finish(providers)?;
        verify_acyclic(&providers)?;

        tracing::debug!("Merged {} into {} types", set.display_name(), providers.len());

        Ok(Arc::new(MergedIndex {
            set,
            providers,
            sources,
            import_names,
        }))
    }
}

struct Merger {
    set_name: String,
    providers: BTreeMap<Type, ProvidedType>,
    sources: BTreeMap<Type, SetSource>,
}

impl Merger {
    /// Inserts a source, reporting it if the type is already taken
    fn insert(
        &mut self,
        ty: &Type,
        provided: ProvidedType,
        source: SetSource,
        errors: &mut ErrorCollector,
    ) {
        if let Some(previous) = self.sources.get(ty) {
            errors.add(self.conflict(ty, &source, previous));
            return;
        }

        self.providers.insert(ty.clone(), provided);
        self.sources.insert(ty.clone(), source);
    }

    fn conflict(&self, ty: &Type, current: &SetSource, previous: &SetSource) -> Diagnostic {
        Diagnostic::at(
            current.position().clone(),
            ErrorKind::MultipleBindings {
                set: self.set_name.clone(),
                ty: ty.clone(),
                current: current.trace(ty),
                previous: previous.trace(ty),
            },
        )
    }
}
