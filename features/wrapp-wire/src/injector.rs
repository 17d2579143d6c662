use std::sync::Arc;

use crate::{
    builder::ProviderSetBuilder,
    cache::MergeCache,
    config::SolveOptions,
    errors::{Diagnostic, ErrorCollector, ErrorKind, Errors},
    plan::Plan,
    position::Position,
    provider::OutputSignature,
    registry::{ProviderSet, SetId},
    solver::solve,
    types::Type,
};

/// A parameter of the function being generated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorParam {
    pub name: Arc<str>,
    pub ty: Type,
}

/// The parameters of an injector function, supplied by its caller instead of being constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorArgs {
    /// Name of the injector function
    pub name: Arc<str>,
    pub params: Vec<InjectorParam>,
    pub position: Position,
}

impl InjectorArgs {
    pub fn new<N: Into<Arc<str>>>(
        name: impl Into<Arc<str>>,
        position: Position,
        params: impl IntoIterator<Item = (N, Type)>,
    ) -> Arc<Self> {
        Arc::new(InjectorArgs {
            name: name.into(),
            params: params
                .into_iter()
                .map(|(name, ty)| InjectorParam {
                    name: name.into(),
                    ty,
                })
                .collect(),
            position,
        })
    }

    /// Every parameter as an [InjectorArg]
    pub fn args(self: &Arc<Self>) -> impl Iterator<Item = InjectorArg> + '_ {
        (0..self.params.len()).map(move |index| InjectorArg {
            args: self.clone(),
            index,
        })
    }
}

/// A single injector argument
#[derive(Debug, Clone)]
pub struct InjectorArg {
    pub args: Arc<InjectorArgs>,
    /// Always a valid index into `args.params`
    pub index: usize,
}

impl InjectorArg {
    pub fn param(&self) -> &InjectorParam {
        &self.args.params[self.index]
    }

    pub fn ty(&self) -> &Type {
        &self.param().ty
    }

    pub fn is(&self, other: &InjectorArg) -> bool {
        Arc::ptr_eq(&self.args, &other.args) && self.index == other.index
    }
}

/// An injector function: builds its output from a provider set and its own arguments
#[derive(Debug, Clone)]
pub struct Injector {
    pub package: Arc<str>,
    pub name: Arc<str>,
    pub position: Position,
    pub args: Arc<InjectorArgs>,
    pub output: OutputSignature,
}

impl Injector {
    /// Validates the injector's result shape with the same rules as providers
    pub fn new<N: Into<Arc<str>>>(
        package: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        position: Position,
        params: impl IntoIterator<Item = (N, Type)>,
        results: &[Type],
    ) -> Result<Injector, Diagnostic> {
        let name: Arc<str> = name.into();
        let output = OutputSignature::from_results(results)
            .map_err(|shape| Diagnostic::new(shape).in_injector(&name, &position))?;

        Ok(Injector {
            package: package.into(),
            args: InjectorArgs::new(name.clone(), position.clone(), params),
            name,
            position,
            output,
        })
    }

    /// Starts the provider set this injector builds from, with its arguments attached
    pub fn build_set(&self) -> ProviderSetBuilder {
        ProviderSet::builder(self.package.clone(), self.position.clone())
            .injector_args(self.args.clone())
    }

    /// Merges `set` and solves for the injector's output
    ///
    /// Every step's effects must be expressible by the injector: a fallible step needs an error
    /// result, a step with a teardown needs a cleanup result.
    pub fn solve(
        &self,
        cache: &MergeCache<'_>,
        set: SetId,
        options: &SolveOptions,
    ) -> Result<Plan, Errors> {
        let prefix = |errors: Errors| Errors {
            errors: errors
                .into_iter()
                .map(|error| error.in_injector(&self.name, &self.position))
                .collect(),
        };

        tracing::debug!("Solving injector {} for {}", self.name, self.output.out);

        let index = cache.merge(set).map_err(prefix)?;
        let plan = solve(&index, &self.output.out, Some(&self.args), options).map_err(prefix)?;

        let mut errors = ErrorCollector::new();
        for step in plan.steps() {
            let position = step.position();
            if step.effects.fallible && !self.output.effects.fallible {
                errors.add(Diagnostic::at(
                    position.clone(),
                    ErrorKind::InjectorCannotFail(step.out.clone()),
                ));
            }
            if step.effects.cleanup && !self.output.effects.cleanup {
                errors.add(Diagnostic::at(
                    position.clone(),
                    ErrorKind::InjectorCannotCleanup(step.out.clone()),
                ));
            }
        }

        errors.finish(plan).map_err(prefix)
    }
}
