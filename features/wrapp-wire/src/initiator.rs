use std::{collections::HashMap, sync::Arc};

use crate::{
    container::{Assembled, Teardowns},
    errors::InitError,
    factories::{Constructed, StepFactory},
    plan::{Plan, Step, StepKind},
    types::{Instance, Type},
};

/// Runs solved plans in process
///
/// Every provider and value step needs a factory registered for the type it produces. Argument
/// steps take the instance passed at the same index to [Initiator::initiate].
#[derive(Default)]
pub struct Initiator {
    factories: HashMap<Type, Box<dyn StepFactory>>,
}

impl Initiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_factory(mut self, ty: Type, factory: impl StepFactory + 'static) -> Self {
        self.factories.insert(ty, Box::new(factory));
        self
    }

    /// Builds the plan's output step by step
    ///
    /// If a step fails, the teardowns of every step before it run in reverse order before the
    /// error is returned.
    pub async fn initiate(&self, plan: &Plan, args: Vec<Instance>) -> Result<Assembled, InitError> {
        tracing::debug!(
            "Initiating {} in {} steps with {} arguments",
            plan.target(),
            plan.len(),
            args.len()
        );

        let mut values: Vec<Instance> = Vec::with_capacity(plan.len());
        let mut teardowns = Teardowns::new();

        for (i, step) in plan.steps().iter().enumerate() {
            let constructed = match self.construct(step, &values, &args).await {
                Ok(constructed) => constructed,
                Err(error) => {
                    tracing::error!("Step #{i} for {} failed: {error}", step.out);
                    teardowns.run();
                    return Err(error);
                }
            };

            if let Some(teardown) = constructed.teardown {
                if !step.effects.cleanup {
                    tracing::warn!(
                        "{} returned a teardown it does not declare, running it anyway",
                        step.name()
                    );
                }
                teardowns.push(step.out.clone(), teardown);
            }

            tracing::debug!("Constructed {} [{} of {}]", step.out, i + 1, plan.len());
            values.push(constructed.instance);
        }

        let output = values.swap_remove(plan.output_index());
        Ok(Assembled::new(output, teardowns))
    }

    async fn construct(
        &self,
        step: &Step,
        values: &[Instance],
        args: &[Instance],
    ) -> Result<Constructed, InitError> {
        if let StepKind::Argument(arg) = &step.kind {
            return args
                .get(arg.index)
                .cloned()
                .map(Constructed::from)
                .ok_or_else(|| InitError::MissingArgument {
                    index: arg.index,
                    ty: arg.ty().clone(),
                });
        }

        let factory = self
            .factories
            .get(&step.out)
            .ok_or_else(|| InitError::MissingFactory(step.out.clone()))?;

        let inputs = step.args.iter().map(|arg| values[*arg].clone()).collect();
        factory.construct(inputs).await.map_err(|error| {
            if !step.effects.fallible {
                tracing::warn!("{} failed but does not declare an error", step.name());
            }
            InitError::FactoryFailed {
                product: step.out.clone(),
                error: Arc::new(error),
            }
        })
    }
}
