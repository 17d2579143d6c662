use std::future::Future;

use futures::{future::BoxFuture, FutureExt};

use crate::types::{DynError, Injectable, Instance};

/// Cleanup returned next to a constructed value
pub type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// The result of a factory: a value and, optionally, the teardown releasing it
pub struct Constructed {
    pub instance: Instance,
    pub teardown: Option<Teardown>,
}

impl Constructed {
    pub fn new<T: Injectable>(value: T) -> Self {
        Constructed {
            instance: Instance::new(value),
            teardown: None,
        }
    }

    pub fn with_teardown(mut self, teardown: impl FnOnce() + Send + 'static) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }
}
impl From<Instance> for Constructed {
    fn from(instance: Instance) -> Self {
        Constructed {
            instance,
            teardown: None,
        }
    }
}

/// Runs the rule of one plan step
///
/// `inputs` holds the values of the step's inputs, in the order the rule takes them.
pub trait StepFactory: Send + Sync {
    fn construct(&self, inputs: Vec<Instance>) -> BoxFuture<'_, Result<Constructed, DynError>>;
}

// Impl StepFactory for any async closure
impl<F, Fut> StepFactory for F
where
    F: Fn(Vec<Instance>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Constructed, DynError>> + Send + 'static,
{
    fn construct(&self, inputs: Vec<Instance>) -> BoxFuture<'_, Result<Constructed, DynError>> {
        (self)(inputs).boxed()
    }
}
