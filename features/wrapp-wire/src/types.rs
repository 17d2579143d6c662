use std::{
    any::Any,
    borrow::Cow,
    collections::HashMap,
    fmt::{self, Display},
    sync::Arc,
};

/// Boxed error returned by factories while a plan is initiated
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Name of a declared type: the package path it lives in and its identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    pub package: Arc<str>,
    pub name: Arc<str>,
}
impl TypeName {
    pub fn new(package: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        TypeName {
            package: package.into(),
            name: name.into(),
        }
    }
}
impl Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// A type as seen by the front end after type checking.
///
/// Two types are identical if and only if their values compare equal. Named types compare by
/// name only, their structure lives in the [TypeUniverse].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// Predeclared basic type such as `int` or `string`
    Basic(Arc<str>),
    Named(TypeName),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(Box<Type>),
    Func(Signature),
    /// Interface literal, methods sorted by name. Build it with [Type::interface].
    Interface(Vec<MethodSig>),
    /// The predeclared `error` interface
    Error,
}

impl Type {
    pub fn basic(name: impl Into<Arc<str>>) -> Type {
        Type::Basic(name.into())
    }

    pub fn named(package: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Type {
        Type::Named(TypeName::new(package, name))
    }

    /// Interface literal with the given methods, in any order
    pub fn interface(methods: impl IntoIterator<Item = MethodSig>) -> Type {
        Type::Interface(sorted_methods(methods))
    }

    /// Pointer to this type
    pub fn pointer(&self) -> Type {
        Type::Pointer(Box::new(self.clone()))
    }

    pub fn slice(&self) -> Type {
        Type::Slice(Box::new(self.clone()))
    }

    /// The teardown type `func()`
    pub fn cleanup() -> Type {
        Type::Func(Signature::default())
    }

    pub fn is_cleanup(&self) -> bool {
        matches!(self, Type::Func(sig) if sig.params.is_empty() && sig.results.is_empty() && !sig.variadic)
    }

    pub fn as_named(&self) -> Option<&TypeName> {
        match self {
            Type::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Basic(name) => f.write_str(name),
            Type::Named(name) => name.fmt(f),
            Type::Pointer(elem) => write!(f, "*{elem}"),
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Map(key, value) => write!(f, "map[{key}]{value}"),
            Type::Chan(elem) => write!(f, "chan {elem}"),
            Type::Func(sig) => write!(f, "func{sig}"),
            Type::Interface(methods) if methods.is_empty() => f.write_str("interface{}"),
            Type::Interface(methods) => {
                let methods: Vec<String> = methods.iter().map(ToString::to_string).collect();
                write!(f, "interface{{ {} }}", methods.join("; "))
            }
            Type::Error => f.write_str("error"),
        }
    }
}

/// Parameter and result types of a function
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    /// The last parameter is a `...T` parameter, stored as `[]T`
    pub variadic: bool,
}
impl Signature {
    pub fn new(params: impl Into<Vec<Type>>, results: impl Into<Vec<Type>>) -> Self {
        Signature {
            params: params.into(),
            results: results.into(),
            variadic: false,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}
impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.params.len().saturating_sub(1);
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, param)| match param {
                Type::Slice(elem) if self.variadic && i == last => format!("...{elem}"),
                param => param.to_string(),
            })
            .collect();
        write!(f, "({})", params.join(", "))?;

        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " {single}"),
            results => {
                let results: Vec<String> = results.iter().map(ToString::to_string).collect();
                write!(f, " ({})", results.join(", "))
            }
        }
    }
}

/// A method as it appears in a method set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSig {
    pub name: Arc<str>,
    pub signature: Signature,
}
impl MethodSig {
    pub fn new(name: impl Into<Arc<str>>, signature: Signature) -> Self {
        MethodSig {
            name: name.into(),
            signature,
        }
    }
}
impl Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

/// Whether a method is declared on `T` or on `*T`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    Value,
    Pointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Arc<str>,
    pub ty: Type,
}

/// Underlying type of a named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Underlying {
    Struct(Vec<Field>),
    Interface(Vec<MethodSig>),
    Other(Type),
}

#[derive(Debug)]
struct NamedDecl {
    underlying: Underlying,
    methods: Vec<(MethodSig, Receiver)>,
}

/// Why a type does not implement an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotImplemented {
    NotAnInterface,
    MissingMethod(MethodSig),
    WrongSignature { want: MethodSig, have: MethodSig },
}
impl Display for NotImplemented {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotImplemented::NotAnInterface => f.write_str("not an interface"),
            NotImplemented::MissingMethod(method) => write!(f, "missing method {}", method.name),
            NotImplemented::WrongSignature { want, have } => {
                write!(f, "wrong type for method {}: have {have}, want {want}", want.name)
            }
        }
    }
}

/// All named types known to one generation run, with their structure and methods
#[derive(Debug, Default)]
pub struct TypeUniverse {
    named: HashMap<TypeName, NamedDecl>,
}

impl TypeUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a named type and returns it.
    ///
    /// Declaring `type A B` where `B` is already known copies `B`'s underlying type, but not its methods.
    pub fn declare(&mut self, name: TypeName, underlying: Underlying) -> Type {
        let inherited = match &underlying {
            Underlying::Other(Type::Named(other)) => {
                self.named.get(other).map(|decl| decl.underlying.clone())
            }
            _ => None,
        };
        let underlying = inherited.unwrap_or(underlying);

        self.named.insert(
            name.clone(),
            NamedDecl {
                underlying,
                methods: Vec::new(),
            },
        );
        Type::Named(name)
    }

    pub fn declare_struct<N: Into<Arc<str>>>(
        &mut self,
        name: TypeName,
        fields: impl IntoIterator<Item = (N, Type)>,
    ) -> Type {
        let fields = fields
            .into_iter()
            .map(|(name, ty)| Field {
                name: name.into(),
                ty,
            })
            .collect();
        self.declare(name, Underlying::Struct(fields))
    }

    pub fn declare_interface(
        &mut self,
        name: TypeName,
        methods: impl IntoIterator<Item = MethodSig>,
    ) -> Type {
        self.declare(name, Underlying::Interface(sorted_methods(methods)))
    }

    /// Adds a method to a declared type
    ///
    /// Returns false if the type was never declared.
    pub fn add_method(&mut self, ty: &TypeName, method: MethodSig, receiver: Receiver) -> bool {
        match self.named.get_mut(ty) {
            Some(decl) => {
                decl.methods.push((method, receiver));
                true
            }
            None => false,
        }
    }

    /// Fields of a named struct type
    pub fn struct_fields(&self, ty: &Type) -> Option<&[Field]> {
        match self.named.get(ty.as_named()?)?.underlying {
            Underlying::Struct(ref fields) => Some(fields),
            _ => None,
        }
    }

    /// Methods required by an interface type, or None if the type is not an interface
    pub fn interface_methods<'a>(&'a self, ty: &'a Type) -> Option<Cow<'a, [MethodSig]>> {
        match ty {
            Type::Interface(methods) => Some(Cow::Borrowed(methods)),
            Type::Error => Some(Cow::Owned(vec![error_method()])),
            Type::Named(name) => match &self.named.get(name)?.underlying {
                Underlying::Interface(methods) => Some(Cow::Borrowed(methods)),
                Underlying::Other(Type::Error) => Some(Cow::Owned(vec![error_method()])),
                Underlying::Other(Type::Interface(methods)) => Some(Cow::Borrowed(methods)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_interface(&self, ty: &Type) -> bool {
        self.interface_methods(ty).is_some()
    }

    /// The method set of a type
    ///
    /// `T` carries its value receiver methods, `*T` all methods of `T`, an interface its own methods.
    pub fn method_set(&self, ty: &Type) -> Vec<MethodSig> {
        if let Some(methods) = self.interface_methods(ty) {
            return methods.into_owned();
        }

        let (name, pointer) = match ty {
            Type::Named(name) => (name, false),
            Type::Pointer(elem) => match elem.as_ref() {
                Type::Named(name) if !self.is_interface(elem) => (name, true),
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };

        let Some(decl) = self.named.get(name) else {
            return Vec::new();
        };
        decl.methods
            .iter()
            .filter(|(_, receiver)| pointer || *receiver == Receiver::Value)
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Checks that `ty` implements the interface `iface`
    pub fn implements(&self, ty: &Type, iface: &Type) -> Result<(), NotImplemented> {
        let Some(required) = self.interface_methods(iface) else {
            return Err(NotImplemented::NotAnInterface);
        };
        let available = self.method_set(ty);

        for want in required.iter() {
            match available.iter().find(|have| have.name == want.name) {
                None => return Err(NotImplemented::MissingMethod(want.clone())),
                Some(have) if have.signature != want.signature => {
                    return Err(NotImplemented::WrongSignature {
                        want: want.clone(),
                        have: have.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Method sets compare equal regardless of declaration order
fn sorted_methods(methods: impl IntoIterator<Item = MethodSig>) -> Vec<MethodSig> {
    let mut methods: Vec<MethodSig> = methods.into_iter().collect();
    methods.sort();
    methods.dedup();
    methods
}

fn error_method() -> MethodSig {
    MethodSig::new("Error", Signature::new([], [Type::basic("string")]))
}

/// We assume that initiation may happen on a multithreaded async runtime
/// So anything constructed needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A value constructed while initiating a plan
#[derive(Clone)]
pub struct Instance {
    pub type_name: &'static str,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Instance {
            type_name: std::any::type_name::<T>(),
            instance: Arc::new(instance),
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.type_name),
        }
    }
}
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> (TypeUniverse, Type, Type) {
        let mut universe = TypeUniverse::new();
        let reader = universe.declare_interface(
            TypeName::new("io", "Reader"),
            [MethodSig::new(
                "Read",
                Signature::new([Type::basic("byte").slice()], [Type::basic("int"), Type::Error]),
            )],
        );
        let file = universe.declare_struct(TypeName::new("os", "File"), [("fd", Type::basic("int"))]);
        (universe, reader, file)
    }

    fn read() -> MethodSig {
        MethodSig::new(
            "Read",
            Signature::new([Type::basic("byte").slice()], [Type::basic("int"), Type::Error]),
        )
    }

    #[test]
    fn display_is_go_like() {
        let sig = Signature::new([Type::basic("string").slice()], [Type::cleanup(), Type::Error]).variadic();
        assert_eq!(Type::Func(sig).to_string(), "func(...string) (func(), error)");
        assert_eq!(Type::named("app", "DB").pointer().to_string(), "*app.DB");
        assert_eq!(
            Type::Map(Box::new(Type::basic("string")), Box::new(Type::basic("int"))).to_string(),
            "map[string]int"
        );
        assert!(Type::cleanup().is_cleanup());
        assert!(!Type::Func(Signature::new([Type::basic("int")], [])).is_cleanup());
    }

    #[test]
    fn pointer_receivers_only_in_pointer_method_set() {
        let (mut universe, reader, file) = universe();
        universe.add_method(file.as_named().unwrap(), read(), Receiver::Pointer);

        assert_eq!(
            universe.implements(&file, &reader),
            Err(NotImplemented::MissingMethod(read()))
        );
        assert_eq!(universe.implements(&file.pointer(), &reader), Ok(()));
    }

    #[test]
    fn value_receivers_in_both_method_sets() {
        let (mut universe, reader, file) = universe();
        universe.add_method(file.as_named().unwrap(), read(), Receiver::Value);

        assert_eq!(universe.implements(&file, &reader), Ok(()));
        assert_eq!(universe.implements(&file.pointer(), &reader), Ok(()));
    }

    #[test]
    fn wrong_signature_is_reported() {
        let (mut universe, reader, file) = universe();
        let bad = MethodSig::new("Read", Signature::new([], [Type::basic("int")]));
        universe.add_method(file.as_named().unwrap(), bad.clone(), Receiver::Value);

        assert_eq!(
            universe.implements(&file, &reader),
            Err(NotImplemented::WrongSignature {
                want: read(),
                have: bad
            })
        );
    }

    #[test]
    fn interfaces_implement_themselves_and_error() {
        let (universe, reader, file) = universe();
        assert_eq!(universe.implements(&reader, &reader), Ok(()));
        assert_eq!(
            universe.implements(&reader, &file),
            Err(NotImplemented::NotAnInterface)
        );
        assert!(universe.is_interface(&Type::Error));
        assert!(universe.struct_fields(&file).is_some());
        assert!(universe.struct_fields(&reader).is_none());
    }

    #[test]
    fn defined_types_copy_underlying_not_methods() {
        let (mut universe, reader, file) = universe();
        universe.add_method(file.as_named().unwrap(), read(), Receiver::Value);
        let my_file = universe.declare(
            TypeName::new("app", "MyFile"),
            Underlying::Other(file.clone()),
        );
        let my_reader = universe.declare(
            TypeName::new("app", "MyReader"),
            Underlying::Other(reader.clone()),
        );

        assert_eq!(universe.struct_fields(&my_file).map(<[Field]>::len), Some(1));
        assert!(universe.implements(&my_file, &reader).is_err());
        assert!(universe.is_interface(&my_reader));
        assert_eq!(universe.implements(&file, &my_reader), Ok(()));
    }

    #[test]
    fn interface_literals_ignore_method_order() {
        let close = MethodSig::new("Close", Signature::new([], [Type::Error]));
        let read_closer = Type::interface([read(), close.clone()]);

        assert_eq!(read_closer, Type::interface([close.clone(), read()]));
        assert_ne!(read_closer, Type::interface([read()]));
        assert_eq!(
            read_closer.to_string(),
            "interface{ Close() error; Read([]byte) (int, error) }"
        );

        let (mut universe, reader, file) = universe();
        universe.add_method(file.as_named().unwrap(), read(), Receiver::Value);
        assert_eq!(universe.implements(&file, &read_closer), Err(NotImplemented::MissingMethod(close)));
        assert_eq!(universe.implements(&file, &Type::interface([read()])), Ok(()));
        assert_eq!(universe.interface_methods(&reader).as_deref(), Some(&[read()][..]));
    }

    #[test]
    fn instance_downcast() {
        let instance = Instance::new(42_u32);
        assert_eq!(*instance.downcast::<u32>().unwrap(), 42);
        assert_eq!(instance.downcast::<String>().unwrap_err(), "u32");
    }
}
