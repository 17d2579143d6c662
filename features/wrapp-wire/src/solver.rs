use std::{collections::HashMap, sync::Arc};

use crate::{
    config::{SolveOptions, UnusedPolicy},
    dependency_graph::{MergedIndex, Origin, ProvidedType, SetSource},
    errors::{Diagnostic, ErrorCollector, ErrorKind, Errors},
    injector::{InjectorArg, InjectorArgs},
    plan::{Plan, Step, StepKind},
    provider::Effects,
    types::Type,
};

#[derive(Debug, Clone, Copy)]
enum Slot {
    Built(usize),
    /// Could not be built, the error is already reported
    Failed,
}

/// A requested type and the request that led to it
struct Frame {
    ty: Type,
    up: Option<usize>,
}

struct Solver<'a> {
    index: &'a MergedIndex,
    given: HashMap<Type, InjectorArg>,
    frames: Vec<Frame>,
    steps: Vec<Step>,
    built: HashMap<Type, Slot>,
    errors: ErrorCollector,
}

/// Computes the steps building `target` from `index` and the injector arguments `args`
///
/// Arguments take precedence over the index. Steps are ordered so that each comes after the
/// steps producing its inputs, inputs being visited in the order the rule takes them.
pub fn solve(
    index: &MergedIndex,
    target: &Type,
    args: Option<&Arc<InjectorArgs>>,
    options: &SolveOptions,
) -> Result<Plan, Errors> {
    tracing::debug!("Solving {target} in {}", index.set().display_name());

    let mut solver = Solver {
        index,
        given: given_arguments(args)?,
        frames: Vec::new(),
        steps: Vec::new(),
        built: HashMap::new(),
        errors: ErrorCollector::new(),
    };

    if solver.resolve(target).is_none() {
        let position = match args {
            Some(args) => args.position.clone(),
            None => index.set().position.clone(),
        };
        return Err(Diagnostic::at(position, ErrorKind::NoProviderForOutput(target.clone())).into());
    }

    solver.run(target);

    let Solver {
        given,
        steps,
        built,
        errors,
        ..
    } = solver;
    let steps = errors.finish(steps)?;
    let Some(Slot::Built(output)) = built.get(target).copied() else {
        return Err(Diagnostic::new(ErrorKind::NoProviderForOutput(target.clone())).into());
    };

    tracing::debug!("Solved {target} in {} steps", steps.len());

    let mut errors = ErrorCollector::new();

    let unused_arguments: Vec<InjectorArg> = args
        .into_iter()
        .flat_map(|args| args.args())
        .filter(|arg| {
            !steps
                .iter()
                .any(|step| matches!(&step.kind, StepKind::Argument(used) if used.is(arg)))
        })
        .collect();
    if options.unused_arguments == UnusedPolicy::Deny {
        for arg in &unused_arguments {
            errors.add(Diagnostic::at(
                arg.args.position.clone(),
                ErrorKind::UnusedArgument {
                    name: arg.param().name.to_string(),
                    ty: arg.ty().clone(),
                },
            ));
        }
    }

    if options.unused_declarations == UnusedPolicy::Deny {
        let used: Vec<&SetSource> = built
            .iter()
            .filter(|(ty, slot)| matches!(slot, Slot::Built(_)) && !given.contains_key(*ty))
            .filter_map(|(ty, _)| index.source(ty))
            .collect();
        errors.extend(unused_declarations(index, &used));
    }

    errors.finish(Plan {
        target: target.clone(),
        steps,
        output,
        unused_arguments,
    })
}

fn given_arguments(args: Option<&Arc<InjectorArgs>>) -> Result<HashMap<Type, InjectorArg>, Errors> {
    let mut errors = ErrorCollector::new();
    let mut given = HashMap::new();

    for arg in args.into_iter().flat_map(|args| args.args()) {
        if given.contains_key(arg.ty()) {
            errors.add(Diagnostic::at(
                arg.args.position.clone(),
                ErrorKind::DuplicateArgument(arg.ty().clone()),
            ));
            continue;
        }
        given.insert(arg.ty().clone(), arg);
    }

    errors.finish(given)
}

impl Solver<'_> {
    fn resolve(&self, ty: &Type) -> Option<ProvidedType> {
        match self.given.get(ty) {
            Some(arg) => Some(ProvidedType {
                ty: ty.clone(),
                origin: Origin::Argument(arg.clone()),
            }),
            None => self.index.provided(ty).cloned(),
        }
    }

    fn frame(&mut self, ty: Type, up: Option<usize>) -> usize {
        self.frames.push(Frame { ty, up });
        self.frames.len() - 1
    }

    fn run(&mut self, target: &Type) {
        let root = self.frame(target.clone(), None);
        let mut stack = vec![root];

        while let Some(&current) = stack.last() {
            let ty = self.frames[current].ty.clone();
            if self.built.contains_key(&ty) {
                stack.pop();
                continue;
            }

            let Some(provided) = self.resolve(&ty) else {
                let error = self.missing(current);
                self.errors.add(error);
                self.built.insert(ty, Slot::Failed);
                stack.pop();
                continue;
            };

            // Bound interfaces share the step of their concrete type
            if provided.ty != ty {
                match self.built.get(&provided.ty).copied() {
                    Some(Slot::Built(step)) => {
                        self.steps[step].bound.push(ty.clone());
                        self.built.insert(ty, Slot::Built(step));
                        stack.pop();
                    }
                    Some(Slot::Failed) => {
                        self.built.insert(ty, Slot::Failed);
                        stack.pop();
                    }
                    None => {
                        let frame = self.frame(provided.ty.clone(), Some(current));
                        stack.push(frame);
                    }
                }
                continue;
            }

            let inputs = provided.origin.inputs();
            let pending: Vec<&Type> = inputs
                .iter()
                .filter(|input| !self.built.contains_key(*input))
                .collect();
            if !pending.is_empty() {
                // Reversed so the first input is built first
                for input in pending.into_iter().rev() {
                    let frame = self.frame(input.clone(), Some(current));
                    stack.push(frame);
                }
                continue;
            }

            let mut args = Vec::with_capacity(inputs.len());
            for input in inputs {
                if let Some(Slot::Built(step)) = self.built.get(input) {
                    args.push(*step);
                }
            }
            if args.len() != inputs.len() {
                self.built.insert(ty, Slot::Failed);
                stack.pop();
                continue;
            }

            let (kind, effects) = match &provided.origin {
                Origin::Provider(provider) => (StepKind::Provider(provider.clone()), provider.effects),
                Origin::Value(value) => (StepKind::Value(value.clone()), Effects::default()),
                Origin::Argument(arg) => (StepKind::Argument(arg.clone()), Effects::default()),
            };

            tracing::debug!("Step #{} builds {ty}", self.steps.len());
            self.built.insert(ty.clone(), Slot::Built(self.steps.len()));
            self.steps.push(Step {
                kind,
                out: ty,
                bound: Vec::new(),
                inputs: inputs.to_vec(),
                args,
                effects,
            });
            stack.pop();
        }
    }

    /// Error for a frame nothing provides, listing every request that led to it
    fn missing(&self, frame: usize) -> Diagnostic {
        let mut needed_by = Vec::new();
        let mut position = None;

        let mut up = self.frames[frame].up;
        while let Some(requester) = up {
            let ty = &self.frames[requester].ty;
            let source = match self.given.get(ty) {
                Some(arg) => Some(SetSource::Argument(arg.clone())),
                None => self.index.source(ty).cloned(),
            };

            match source {
                Some(source) => {
                    needed_by.push(format!("{ty} in {}", source.description()));
                    position.get_or_insert_with(|| source.position().clone());
                }
                None => needed_by.push(ty.to_string()),
            }
            up = self.frames[requester].up;
        }

        let kind = ErrorKind::NoProvider {
            ty: self.frames[frame].ty.clone(),
            needed_by,
        };
        match position {
            Some(position) => Diagnostic::at(position, kind),
            None => Diagnostic::new(kind),
        }
    }
}

/// Declarations of the solved set that no used source refers to
fn unused_declarations(index: &MergedIndex, used: &[&SetSource]) -> Vec<Diagnostic> {
    let set = index.set();
    let mut unused = Vec::new();

    for import in &set.imports {
        let is_used = used
            .iter()
            .any(|source| matches!(source, SetSource::Import { set, .. } if *set == import.set));
        if !is_used {
            let name = index
                .import_name(import.set)
                .map(str::to_string)
                .unwrap_or_else(|| import.set.to_string());
            unused.push(Diagnostic::at(import.position.clone(), ErrorKind::UnusedSet(name)));
        }
    }

    for provider in &set.providers {
        let is_used = used
            .iter()
            .any(|source| matches!(source, SetSource::Provider(p) if Arc::ptr_eq(p, provider)));
        if !is_used {
            unused.push(Diagnostic::at(
                provider.position.clone(),
                ErrorKind::UnusedProvider(format!("{:?}", provider.name)),
            ));
        }
    }

    for value in &set.values {
        let is_used = used
            .iter()
            .any(|source| matches!(source, SetSource::Value(v) if Arc::ptr_eq(v, value)));
        if !is_used {
            unused.push(Diagnostic::at(
                value.position.clone(),
                ErrorKind::UnusedValue(value.out.clone()),
            ));
        }
    }

    for binding in &set.bindings {
        let is_used = used
            .iter()
            .any(|source| matches!(source, SetSource::Binding(b) if Arc::ptr_eq(b, binding)));
        if !is_used {
            unused.push(Diagnostic::at(
                binding.position.clone(),
                ErrorKind::UnusedBinding(binding.iface.clone()),
            ));
        }
    }

    unused
}
