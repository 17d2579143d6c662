use std::{any::type_name, fmt::Debug, sync::Arc};

use crate::{
    errors::RequireError,
    factories::Teardown,
    types::{Injectable, Instance, Type},
};

/// Teardowns of constructed values, run in reverse order of construction
///
/// Each teardown runs exactly once: through [Teardowns::run] or when dropped.
#[derive(Default)]
pub struct Teardowns {
    stack: Vec<(Type, Teardown)>,
}
impl Debug for Teardowns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stack.iter().map(|(ty, _)| ty))
            .finish()
    }
}

impl Teardowns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ty: Type, teardown: Teardown) {
        self.stack.push((ty, teardown));
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs every pending teardown, newest first
    pub fn run(&mut self) {
        while let Some((ty, teardown)) = self.stack.pop() {
            tracing::debug!("Tearing down {ty}");
            teardown();
        }
    }
}
impl Drop for Teardowns {
    fn drop(&mut self) {
        self.run();
    }
}

/// The output of an initiated plan, together with everything that must be torn down
pub struct Assembled {
    output: Instance,
    teardowns: Teardowns,
}
impl Debug for Assembled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembled")
            .field("output", &self.output.type_name)
            .field("teardowns", &self.teardowns)
            .finish()
    }
}

impl Assembled {
    pub(crate) fn new(output: Instance, teardowns: Teardowns) -> Self {
        Self { output, teardowns }
    }

    /// Attempts to get the output as `T`
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>, RequireError> {
        self.output
            .downcast()
            .map_err(|actual_type| RequireError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    pub fn instance(&self) -> &Instance {
        &self.output
    }

    /// Runs all teardowns now instead of on drop
    pub fn teardown(mut self) {
        self.teardowns.run();
    }

    pub fn into_parts(self) -> (Instance, Teardowns) {
        (self.output, self.teardowns)
    }
}
