//! Expression and statement AST nodes

use super::Type;
use serde::{Deserialize, Serialize};

/// A statement, carrying its annotation.
///
/// The annotation parameter `A` is `()` on untyped trees produced by the
/// parser and [`Type`] once the checker has run. On a checked statement the
/// annotation is `none` except for `return` statements (the returned type)
/// and `if` statements whose every branch is guaranteed to return.
///
/// On the wire, `ann` may be omitted: the parser collaborator does not have
/// to emit the field, so it defaults on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub struct Stmt<A> {
    pub kind: StmtKind<A>,
    #[serde(default)]
    pub ann: A,
}

impl Stmt<()> {
    /// An unannotated statement, as the parser collaborator produces them.
    pub fn untyped(kind: StmtKind<()>) -> Self {
        Stmt { kind, ann: () }
    }
}

/// Statement variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub enum StmtKind<A> {
    /// Assignment to a name or an object field
    Assign {
        target: AssignTarget<A>,
        value: Expr<A>,
    },
    /// `if` with an optional `elif` clause and optional `else` body
    If {
        cond: Expr<A>,
        body: Vec<Stmt<A>>,
        elif: Option<ElifClause<A>>,
        orelse: Option<Vec<Stmt<A>>>,
    },
    /// `while` loop
    While { cond: Expr<A>, body: Vec<Stmt<A>> },
    /// `pass`
    Pass,
    /// `return`, with an optional value
    Return(Option<Expr<A>>),
    /// Expression evaluated for effect
    Expr(Expr<A>),
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub enum AssignTarget<A> {
    /// Plain variable name
    Name(String),
    /// `obj.field`
    Field { obj: Expr<A>, field: String },
}

/// The `elif` arm of an `if` statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub struct ElifClause<A> {
    pub cond: Expr<A>,
    pub body: Vec<Stmt<A>>,
}

/// An expression, carrying its annotation. As with [`Stmt`], `ann` defaults
/// when absent from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub struct Expr<A> {
    pub kind: ExprKind<A>,
    #[serde(default)]
    pub ann: A,
}

impl Expr<()> {
    /// An unannotated expression, as the parser collaborator produces them.
    pub fn untyped(kind: ExprKind<()>) -> Self {
        Expr { kind, ann: () }
    }
}

/// Expression variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub enum ExprKind<A> {
    /// Literal constant
    Literal(Literal),
    /// Variable reference
    Id(String),
    /// Unary operation
    Unary { op: UnOp, operand: Box<Expr<A>> },
    /// Binary operation
    Binary {
        op: BinOp,
        left: Box<Expr<A>>,
        right: Box<Expr<A>>,
    },
    /// Parenthesised grouping (transparent)
    Paren(Box<Expr<A>>),
    /// Function or constructor call. After checking, a call to `print` has
    /// been resolved to the type-specific overload name.
    Call { callee: String, args: Vec<Expr<A>> },
    /// Field read: `obj.field`
    GetField { obj: Box<Expr<A>>, field: String },
    /// Method call: `obj.method(args)`
    MethodCall {
        obj: Box<Expr<A>>,
        method: String,
        args: Vec<Expr<A>>,
    },
}

/// Literal constant. Only these may initialize variables and fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Int(i32),
    Bool(bool),
    None,
}

impl Literal {
    /// The type a literal evaluates to.
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Bool(_) => Type::Bool,
            Literal::None => Type::None,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    /// Floor division (`//`)
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    /// Identity comparison (`is`), defined on `none` only
    Is,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "//"),
            BinOp::Mod => write!(f, "%"),
            BinOp::Eq => write!(f, "=="),
            BinOp::Ne => write!(f, "!="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Le => write!(f, "<="),
            BinOp::Gt => write!(f, ">"),
            BinOp::Ge => write!(f, ">="),
            BinOp::Is => write!(f, "is"),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    /// Logical not
    Not,
    /// Negation (`-`)
    Neg,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Not => write!(f, "not"),
            UnOp::Neg => write!(f, "-"),
        }
    }
}
