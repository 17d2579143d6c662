use std::{fmt, sync::Arc};

use crate::{
    injector::InjectorArg,
    position::Position,
    provider::{Effects, Provider},
    types::Type,
    value::Value,
};

/// How a step obtains its value
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Passed in by the injector's caller
    Argument(InjectorArg),
    /// Evaluates an expression
    Value(Arc<Value>),
    /// Calls a function or fills a struct
    Provider(Arc<Provider>),
}

/// One construction step of a [Plan]
#[derive(Debug, Clone)]
pub struct Step {
    pub kind: StepKind,
    /// The concrete type this step produces
    pub out: Type,
    /// Interfaces resolved to `out` through bindings
    pub bound: Vec<Type>,
    /// Input types in the order the rule takes them
    pub inputs: Vec<Type>,
    /// Index of the step producing each input, 1:1 with `inputs`
    pub args: Vec<usize>,
    pub effects: Effects,
}

impl Step {
    pub fn position(&self) -> &Position {
        match &self.kind {
            StepKind::Argument(arg) => &arg.args.position,
            StepKind::Value(value) => &value.position,
            StepKind::Provider(provider) => &provider.position,
        }
    }

    /// `out` followed by every bound interface
    pub fn outputs(&self) -> impl Iterator<Item = &Type> {
        std::iter::once(&self.out).chain(self.bound.iter())
    }

    pub fn produces(&self, ty: &Type) -> bool {
        self.outputs().any(|out| out == ty)
    }

    pub fn name(&self) -> String {
        match &self.kind {
            StepKind::Argument(arg) => arg.param().name.to_string(),
            StepKind::Value(value) => value.expr.to_string(),
            StepKind::Provider(provider) => provider.qualified_name(),
        }
    }
}

/// A construction order for one target type
///
/// Every step comes after the steps producing its inputs, every type is produced once.
#[derive(Debug, Clone)]
pub struct Plan {
    pub(crate) target: Type,
    pub(crate) steps: Vec<Step>,
    pub(crate) output: usize,
    pub(crate) unused_arguments: Vec<InjectorArg>,
}

impl Plan {
    pub fn target(&self) -> &Type {
        &self.target
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the step producing the target
    pub fn output_index(&self) -> usize {
        self.output
    }

    pub fn output(&self) -> &Step {
        &self.steps[self.output]
    }

    pub fn step_for(&self, ty: &Type) -> Option<&Step> {
        self.steps.iter().find(|step| step.produces(ty))
    }

    /// True if any step may fail
    pub fn is_fallible(&self) -> bool {
        self.steps.iter().any(|step| step.effects.fallible)
    }

    /// True if any step returns a teardown
    pub fn has_cleanup(&self) -> bool {
        self.steps.iter().any(|step| step.effects.cleanup)
    }

    /// Steps whose teardown must run if step `failed` fails, in the order to run them
    pub fn unwind_on_failure(&self, failed: usize) -> Vec<usize> {
        (0..failed.min(self.steps.len()))
            .rev()
            .filter(|i| self.steps[*i].effects.cleanup)
            .collect()
    }

    /// Every step with a teardown, in the order to run them once the output is dropped
    pub fn cleanup_order(&self) -> Vec<usize> {
        self.unwind_on_failure(self.steps.len())
    }

    /// Injector arguments no step uses
    pub fn unused_arguments(&self) -> &[InjectorArg] {
        &self.unused_arguments
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "plan for {}:", self.target)?;
        for (i, step) in self.steps.iter().enumerate() {
            let args: Vec<String> = step.args.iter().map(|arg| format!("#{arg}")).collect();
            write!(f, "  #{i} {} = {}({})", step.out, step.name(), args.join(", "))?;
            if step.effects.cleanup {
                f.write_str(" +cleanup")?;
            }
            if step.effects.fallible {
                f.write_str(" +error")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
