use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    position::Position,
    registry::SetId,
    types::{DynError, NotImplemented, Type},
};

/// Result shapes a provider or injector may not have
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("no return values")]
    NoResults,
    #[error("too many return values")]
    TooManyResults,
    #[error("second return type is {0}; must be error or func()")]
    SecondResult(Type),
    #[error("second return type is {0}; must be func()")]
    SecondNotCleanup(Type),
    #[error("third return type is {0}; must be error")]
    ThirdNotError(Type),
}

/// One step of a dependency cycle: `ty` is produced by `provider` which needs the next type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLink {
    pub ty: Type,
    pub provider: String,
    pub position: Position,
}

/// Everything that can go wrong while building, merging and solving provider sets
#[derive(Error, Debug, Clone)]
pub enum ErrorKind {
    // Shape errors
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("wrong signature for provider {provider}: {shape}")]
    ProviderSignature { provider: String, shape: ShapeError },
    #[error("provider has multiple parameters of type {0}")]
    DuplicateParameter(Type),
    #[error("provider struct has multiple fields of type {0}")]
    DuplicateField(Type),
    #[error("{0} does not name a struct")]
    NotAStruct(Type),
    #[error("argument to Value is too complex: {0}")]
    ValueTooComplex(String),
    #[error("argument to Value may not be an interface value (found {0}); use InterfaceValue instead")]
    InterfaceValue(Type),

    // Binding errors
    #[error("first argument to {call} must be an interface type; found {found}")]
    NotAnInterface { call: &'static str, found: Type },
    #[error("cannot bind interface to itself")]
    SelfBinding,
    #[error("{concrete} does not implement {iface} ({reason})")]
    DoesNotImplement {
        concrete: Type,
        iface: Type,
        reason: NotImplemented,
    },
    #[error("Bind of concrete type {concrete} to interface {iface}, but {set} does not include a provider for {concrete}")]
    UnprovidedBinding {
        concrete: Type,
        iface: Type,
        set: String,
    },

    // Ambiguity errors
    #[error("{set} has multiple bindings for {ty}\ncurrent:\n{}\nprevious:\n{}", render_trace(.current), render_trace(.previous))]
    MultipleBindings {
        set: String,
        ty: Type,
        current: Vec<String>,
        previous: Vec<String>,
    },

    // Cycle errors
    #[error("cycle for {ty}:\n{}{ty}", render_cycle(.chain))]
    Cycle { ty: Type, chain: Vec<CycleLink> },
    #[error("provider set import cycle: {}", .chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },
    #[error("provider set {0} is referenced but was never defined")]
    UndefinedSet(SetId),
    #[error("{set}: {cause}")]
    Import { set: String, cause: Box<Diagnostic> },

    // Resolution errors
    #[error("no provider found for {0}, output of injector")]
    NoProviderForOutput(Type),
    #[error("no provider found for {ty}{}", render_needed_by(.needed_by))]
    NoProvider { ty: Type, needed_by: Vec<String> },

    #[error("injector has multiple arguments of type {0}")]
    DuplicateArgument(Type),

    // Unused declarations
    #[error("unused injector argument {name} of type {ty}")]
    UnusedArgument { name: String, ty: Type },
    #[error("unused provider set {0}")]
    UnusedSet(String),
    #[error("unused provider {0}")]
    UnusedProvider(String),
    #[error("unused value of type {0}")]
    UnusedValue(Type),
    #[error("unused interface binding to type {0}")]
    UnusedBinding(Type),

    // Injector errors
    #[error("provider for {0} returns error but injection not allowed to fail")]
    InjectorCannotFail(Type),
    #[error("provider for {0} returns cleanup but injection does not return cleanup function")]
    InjectorCannotCleanup(Type),
    #[error("inject {injector}: {cause}")]
    Injector {
        injector: String,
        cause: Box<ErrorKind>,
    },
}

fn render_trace(trace: &[String]) -> String {
    trace
        .iter()
        .map(|line| format!("<- {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_cycle(chain: &[CycleLink]) -> String {
    chain
        .iter()
        .map(|link| format!("{} ({} at {}) ->\n", link.ty, link.provider, link.position))
        .collect()
}

fn render_needed_by(needed_by: &[String]) -> String {
    needed_by
        .iter()
        .map(|line| format!("\nneeded by {line}"))
        .collect()
}

/// An error annotated with the best known source position
#[derive(Error, Debug, Clone)]
pub struct Diagnostic {
    pub position: Option<Position>,
    pub kind: ErrorKind,
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(position) => write!(f, "{position}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Diagnostic {
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        Diagnostic {
            position: None,
            kind: kind.into(),
        }
    }

    pub fn at(position: Position, kind: impl Into<ErrorKind>) -> Self {
        Diagnostic {
            position: Some(position),
            kind: kind.into(),
        }
    }

    /// Wraps this error as the cause of a failed import of `set`, located at the importing call
    pub fn in_import(self, set: impl Into<String>, position: Position) -> Self {
        Diagnostic::at(
            position,
            ErrorKind::Import {
                set: set.into(),
                cause: Box::new(self),
            },
        )
    }

    /// Prefixes the error with the injector it was found in
    pub fn in_injector(self, injector: &str, position: &Position) -> Self {
        Diagnostic {
            position: self.position.or_else(|| Some(position.clone())),
            kind: ErrorKind::Injector {
                injector: injector.to_string(),
                cause: Box::new(self.kind),
            },
        }
    }

    /// The innermost error, looking through import wrappers
    pub fn root_cause(&self) -> &Diagnostic {
        match &self.kind {
            ErrorKind::Import { cause, .. } => cause.root_cause(),
            _ => self,
        }
    }
}

/// All errors collected during one phase
#[derive(Error, Debug, Clone)]
pub struct Errors {
    pub errors: Vec<Diagnostic>,
}
impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = Vec::new();
        display.push("The provider graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

impl Errors {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.errors.iter()
    }

    /// Innermost error kinds, useful to match on without caring about import nesting
    pub fn root_kinds(&self) -> impl Iterator<Item = &ErrorKind> {
        self.errors.iter().map(|error| &error.root_cause().kind)
    }
}

impl From<Diagnostic> for Errors {
    fn from(error: Diagnostic) -> Self {
        Errors {
            errors: vec![error],
        }
    }
}

impl IntoIterator for Errors {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Collects errors across independent parts of a phase instead of stopping at the first
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<Diagnostic>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: Diagnostic) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = Diagnostic>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ends the phase: the value if nothing was collected, otherwise every collected error
    pub fn finish<T>(self, value: T) -> Result<T, Errors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(Errors {
                errors: self.errors,
            })
        }
    }
}

/// Errors when trying to require a certain type from an [Assembled](crate::container::Assembled)
#[derive(thiserror::Error, Debug, Clone)]
pub enum RequireError {
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// Errors while initiating a plan
#[derive(thiserror::Error, Debug, Clone)]
pub enum InitError {
    /// A Factory failed to build
    #[error("Factory for '{product}' failed - error: {error:?}")]
    FactoryFailed { product: Type, error: Arc<DynError> },
    /// No factory was registered for a step of the plan
    #[error("No factory registered for '{0}'")]
    MissingFactory(Type),
    /// The caller did not pass an injector argument the plan uses
    #[error("Injector argument {index} of type '{ty}' was not supplied")]
    MissingArgument { index: usize, ty: Type },
}
