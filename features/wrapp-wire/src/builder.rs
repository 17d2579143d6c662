use std::sync::Arc;

use crate::{
    injector::InjectorArgs,
    position::Position,
    provider::{IfaceBinding, Provider},
    registry::{Import, ProviderSet, SetId},
    value::Value,
};

/// Collects the contents of a provider set
///
/// Obtained through [ProviderSet::builder] or [Injector::build_set](crate::injector::Injector::build_set).
pub struct ProviderSetBuilder {
    set: ProviderSet,
}

impl ProviderSetBuilder {
    pub(crate) fn new(package: Arc<str>, position: Position) -> Self {
        ProviderSetBuilder {
            set: ProviderSet {
                position,
                package,
                var_name: None,
                providers: Vec::new(),
                bindings: Vec::new(),
                values: Vec::new(),
                imports: Vec::new(),
                injector_args: None,
            },
        }
    }

    /// Names the set after the variable it is assigned to
    pub fn name(mut self, var_name: impl Into<Arc<str>>) -> Self {
        self.set.var_name = Some(var_name.into());
        self
    }

    pub fn add_provider(mut self, provider: Provider) -> Self {
        self.set.providers.push(Arc::new(provider));
        self
    }

    pub fn add_binding(mut self, binding: IfaceBinding) -> Self {
        self.set.bindings.push(Arc::new(binding));
        self
    }

    pub fn add_value(mut self, value: Value) -> Self {
        self.set.values.push(Arc::new(value));
        self
    }

    /// Imports another set, `position` is where the import is written
    pub fn import(mut self, set: SetId, position: Position) -> Self {
        self.set.imports.push(Import { set, position });
        self
    }

    pub fn injector_args(mut self, args: Arc<InjectorArgs>) -> Self {
        self.set.injector_args = Some(args);
        self
    }

    pub fn build(self) -> ProviderSet {
        self.set
    }
}
