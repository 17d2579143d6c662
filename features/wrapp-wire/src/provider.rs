use std::sync::Arc;

use crate::{
    errors::{Diagnostic, ErrorKind, ShapeError},
    position::Position,
    types::{Signature, Type, TypeUniverse},
};

/// Side effects a construction step may have besides producing its value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Effects {
    /// Returns a teardown `func()` next to the value
    pub cleanup: bool,
    /// May fail with an error instead of producing the value
    pub fallible: bool,
}

/// The classified result shape of a provider or injector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSignature {
    pub out: Type,
    pub effects: Effects,
}

impl OutputSignature {
    /// Classifies a result list
    ///
    /// Legal shapes are `T`, `(T, error)`, `(T, func())` and `(T, func(), error)`.
    pub fn from_results(results: &[Type]) -> Result<Self, ShapeError> {
        let (out, effects) = match results {
            [] => return Err(ShapeError::NoResults),
            [out] => (out, Effects::default()),
            [out, Type::Error] => (
                out,
                Effects {
                    cleanup: false,
                    fallible: true,
                },
            ),
            [out, second] if second.is_cleanup() => (
                out,
                Effects {
                    cleanup: true,
                    fallible: false,
                },
            ),
            [_, second] => return Err(ShapeError::SecondResult(second.clone())),
            [out, second, third] => {
                if !second.is_cleanup() {
                    return Err(ShapeError::SecondNotCleanup(second.clone()));
                }
                if *third != Type::Error {
                    return Err(ShapeError::ThirdNotError(third.clone()));
                }
                (
                    out,
                    Effects {
                        cleanup: true,
                        fallible: true,
                    },
                )
            }
            _ => return Err(ShapeError::TooManyResults),
        };

        Ok(OutputSignature {
            out: out.clone(),
            effects,
        })
    }
}

/// A single production rule: a function or a named struct type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// Package the function or struct is declared in
    pub package: Arc<str>,
    pub name: Arc<str>,
    pub position: Position,
    /// Types this provider needs, in the order it takes them
    pub inputs: Vec<Type>,
    pub is_struct: bool,
    /// Field names to populate, 1:1 with `inputs`. Only set for struct providers
    pub fields: Vec<Arc<str>>,
    /// Types this provider produces, never empty
    pub outputs: Vec<Type>,
    /// Always default for struct providers
    pub effects: Effects,
    pub variadic: bool,
}

impl Provider {
    /// Creates a provider for a function with the given signature
    pub fn from_function(
        package: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        position: Position,
        signature: &Signature,
    ) -> Result<Provider, Diagnostic> {
        let package = package.into();
        let name = name.into();

        let output = OutputSignature::from_results(&signature.results).map_err(|shape| {
            Diagnostic::at(
                position.clone(),
                ErrorKind::ProviderSignature {
                    provider: name.to_string(),
                    shape,
                },
            )
        })?;

        if let Some(duplicate) = first_duplicate(&signature.params) {
            return Err(Diagnostic::at(
                position,
                ErrorKind::DuplicateParameter(duplicate.clone()),
            ));
        }

        Ok(Provider {
            package,
            name,
            position,
            inputs: signature.params.clone(),
            is_struct: false,
            fields: Vec::new(),
            outputs: vec![output.out],
            effects: output.effects,
            variadic: signature.variadic,
        })
    }

    /// Creates a provider for a named struct type
    ///
    /// It produces both `T` and `*T`, each field is an input.
    pub fn from_struct(
        universe: &TypeUniverse,
        ty: &Type,
        position: Position,
    ) -> Result<Provider, Diagnostic> {
        let (Some(name), Some(fields)) = (ty.as_named(), universe.struct_fields(ty)) else {
            return Err(Diagnostic::at(position, ErrorKind::NotAStruct(ty.clone())));
        };

        let inputs: Vec<Type> = fields.iter().map(|field| field.ty.clone()).collect();
        if let Some(duplicate) = first_duplicate(&inputs) {
            return Err(Diagnostic::at(
                position,
                ErrorKind::DuplicateField(duplicate.clone()),
            ));
        }

        Ok(Provider {
            package: name.package.clone(),
            name: name.name.clone(),
            position,
            inputs,
            is_struct: true,
            fields: fields.iter().map(|field| field.name.clone()).collect(),
            outputs: vec![ty.clone(), ty.pointer()],
            effects: Effects::default(),
            variadic: false,
        })
    }

    /// `package.Name`
    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }
}

fn first_duplicate(types: &[Type]) -> Option<&Type> {
    types
        .iter()
        .enumerate()
        .find(|(i, ty)| types[..*i].contains(ty))
        .map(|(_, ty)| ty)
}

/// Declares that `provided` should be used whenever `iface` is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfaceBinding {
    pub iface: Type,
    /// Always implements `iface`
    pub provided: Type,
    pub position: Position,
}

impl IfaceBinding {
    pub fn new(
        universe: &TypeUniverse,
        position: Position,
        iface: Type,
        provided: Type,
    ) -> Result<IfaceBinding, Diagnostic> {
        if !universe.is_interface(&iface) {
            return Err(Diagnostic::at(
                position,
                ErrorKind::NotAnInterface {
                    call: "Bind",
                    found: iface,
                },
            ));
        }
        if iface == provided {
            return Err(Diagnostic::at(position, ErrorKind::SelfBinding));
        }
        if let Err(reason) = universe.implements(&provided, &iface) {
            return Err(Diagnostic::at(
                position,
                ErrorKind::DoesNotImplement {
                    concrete: provided,
                    iface,
                    reason,
                },
            ));
        }

        Ok(IfaceBinding {
            iface,
            provided,
            position,
        })
    }
}
