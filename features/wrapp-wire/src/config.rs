/// What to do with declarations a plan never uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnusedPolicy {
    /// Report them as errors
    #[default]
    Deny,
    /// Accept them silently
    Allow,
}

/// Options of a single solve
///
/// ```rust
/// use wrapp_wire::config::{SolveOptions, UnusedPolicy};
///
/// let options = SolveOptions::default().unused_arguments(UnusedPolicy::Allow);
/// assert_eq!(options.unused_declarations, UnusedPolicy::Deny);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveOptions {
    /// Injector arguments no step uses. Allowed ones are still listed by
    /// [Plan::unused_arguments](crate::plan::Plan::unused_arguments)
    pub unused_arguments: UnusedPolicy,
    /// Providers, values, bindings and imports declared directly in the solved set
    pub unused_declarations: UnusedPolicy,
}

impl SolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts anything unused
    pub fn permissive() -> Self {
        SolveOptions {
            unused_arguments: UnusedPolicy::Allow,
            unused_declarations: UnusedPolicy::Allow,
        }
    }

    pub fn unused_arguments(mut self, policy: UnusedPolicy) -> Self {
        self.unused_arguments = policy;
        self
    }

    pub fn unused_declarations(mut self, policy: UnusedPolicy) -> Self {
        self.unused_declarations = policy;
        self
    }
}
