use std::{fmt, sync::Arc};

use crate::{
    errors::{Diagnostic, ErrorKind},
    position::Position,
    types::{Type, TypeUniverse},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    /// `&x`
    Addr,
    /// `<-ch`
    Receive,
}

/// A type-checked expression handed over by the front end
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Basic literal, kept as written
    Literal(String),
    Ident(String),
    Selector {
        base: Box<Expr>,
        field: String,
    },
    Composite {
        ty: Option<Type>,
        elements: Vec<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        base: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
    },
    /// `*x`
    Deref(Box<Expr>),
    TypeAssert {
        base: Box<Expr>,
        ty: Type,
    },
    /// A type used as an expression, e.g. the operand of a conversion
    TypeExpr(Type),
    /// Conversion `T(x)`
    Convert {
        ty: Type,
        arg: Box<Expr>,
    },
    /// Call of anything that is not a type
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    FuncLit,
}

impl Expr {
    /// Walks the expression and names the first construct that can't be evaluated at generation time
    ///
    /// Channel receives, function calls and function literals have observable effects.
    pub fn first_disallowed(&self) -> Option<&'static str> {
        match self {
            Expr::Literal(_) | Expr::Ident(_) | Expr::TypeExpr(_) => None,
            Expr::Unary {
                op: UnaryOp::Receive,
                ..
            } => Some("channel receive"),
            Expr::Call { .. } => Some("function call"),
            Expr::FuncLit => Some("function literal"),
            Expr::Unary { operand: inner, .. }
            | Expr::Selector { base: inner, .. }
            | Expr::Paren(inner)
            | Expr::Deref(inner)
            | Expr::TypeAssert { base: inner, .. }
            | Expr::Convert { arg: inner, .. } => inner.first_disallowed(),
            Expr::KeyValue { key: lhs, value: rhs }
            | Expr::Binary { lhs, rhs, .. }
            | Expr::Index {
                base: lhs,
                index: rhs,
            } => lhs.first_disallowed().or_else(|| rhs.first_disallowed()),
            Expr::Composite { elements, .. } => elements.iter().find_map(Expr::first_disallowed),
            Expr::Slice { base, low, high } => base
                .first_disallowed()
                .or_else(|| low.as_ref().and_then(|low| low.first_disallowed()))
                .or_else(|| high.as_ref().and_then(|high| high.first_disallowed())),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(text) | Expr::Ident(text) => f.write_str(text),
            Expr::Selector { base, field } => write!(f, "{base}.{field}"),
            Expr::Composite { ty, elements } => {
                if let Some(ty) = ty {
                    write!(f, "{ty}")?;
                }
                let elements: Vec<String> = elements.iter().map(ToString::to_string).collect();
                write!(f, "{{{}}}", elements.join(", "))
            }
            Expr::KeyValue { key, value } => write!(f, "{key}: {value}"),
            Expr::Unary { op, operand } => {
                let op = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::BitNot => "^",
                    UnaryOp::Addr => "&",
                    UnaryOp::Receive => "<-",
                };
                write!(f, "{op}{operand}")
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
            Expr::Paren(inner) => write!(f, "({inner})"),
            Expr::Index { base, index } => write!(f, "{base}[{index}]"),
            Expr::Slice { base, low, high } => {
                write!(f, "{base}[")?;
                if let Some(low) = low {
                    write!(f, "{low}")?;
                }
                f.write_str(":")?;
                if let Some(high) = high {
                    write!(f, "{high}")?;
                }
                f.write_str("]")
            }
            Expr::Deref(inner) => write!(f, "*{inner}"),
            Expr::TypeAssert { base, ty } => write!(f, "{base}.({ty})"),
            Expr::TypeExpr(ty) => write!(f, "{ty}"),
            Expr::Convert { ty, arg } => write!(f, "({ty})({arg})"),
            Expr::Call { func, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{func}({})", args.join(", "))
            }
            Expr::FuncLit => f.write_str("func() {...}"),
        }
    }
}

/// A zero-input rule producing one type from an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// Position of the expression
    pub position: Position,
    pub out: Type,
    pub expr: Arc<Expr>,
}

impl Value {
    /// Creates a value of the expression's own type `ty`
    pub fn new(
        universe: &TypeUniverse,
        position: Position,
        expr: Expr,
        ty: Type,
    ) -> Result<Value, Diagnostic> {
        check_expr(&position, &expr)?;
        if universe.is_interface(&ty) {
            return Err(Diagnostic::at(position, ErrorKind::InterfaceValue(ty)));
        }

        Ok(Value {
            position,
            out: ty,
            expr: Arc::new(expr),
        })
    }

    /// Creates a value providing the interface `iface` from an expression of type `provided`
    pub fn interface_value(
        universe: &TypeUniverse,
        position: Position,
        iface: Type,
        expr: Expr,
        provided: Type,
    ) -> Result<Value, Diagnostic> {
        if !universe.is_interface(&iface) {
            return Err(Diagnostic::at(
                position,
                ErrorKind::NotAnInterface {
                    call: "InterfaceValue",
                    found: iface,
                },
            ));
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
        check_expr(&position, &expr)?;

        Ok(Value {
            position,
            out: iface,
            expr: Arc::new(expr),
        })
    }
}

fn check_expr(position: &Position, expr: &Expr) -> Result<(), Diagnostic> {
    match expr.first_disallowed() {
        Some(construct) => Err(Diagnostic::at(
            position.clone(),
            ErrorKind::ValueTooComplex(format!("contains a {construct}")),
        )),
        None => Ok(()),
    }
}
