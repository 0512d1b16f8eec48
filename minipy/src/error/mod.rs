//! Error types and reporting
//!
//! Static errors form a closed kind enumeration with structured fields, so
//! hosts and tests can match on the kind instead of parsing message text.
//! Every kind keeps a fixed message shape. The `TYPE ERROR:` prefix added by
//! [`CompileError`] distinguishes static errors from the `RUNTIME ERROR:`
//! prefix the host attaches when the generated code traps.

use crate::ast::{BinOp, Type, UnOp};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CompileError>;

/// Compile error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("TYPE ERROR: {0}")]
    Type(#[from] TypeError),
}

/// Static type-checking error.
///
/// Checking aborts on the first error encountered; there is no accumulation
/// or recovery pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A type annotation names a class that does not exist
    #[error("Invalid type annotation; there is no class named: {0}")]
    UnknownClass(String),

    /// Two declarations share a name within one scope
    #[error("Duplicate declaration of identifier in same scope: {0}")]
    DuplicateDeclaration(String),

    /// A parameter or local reuses a class name
    #[error("Cannot shadow class name: {0}")]
    ShadowsClass(String),

    /// Value type not assignable where another type was declared
    #[error("Expected type `{expected}`; got type `{actual}`")]
    Mismatch { expected: Type, actual: Type },

    /// Argument type not assignable to the corresponding parameter
    #[error("Expected type `{expected}`; got type `{actual}` in parameter {position}")]
    ParamMismatch {
        expected: Type,
        actual: Type,
        position: usize,
    },

    /// A non-`none` function has no guaranteed return path
    #[error("All paths in this function/method must have a return statement: {0}")]
    MissingReturn(String),

    /// Reference to a name not in scope
    #[error("Not a variable: {0}")]
    NotAVariable(String),

    /// Call to a name that is neither a function nor a class
    #[error("Not a function or class: {0}")]
    NotAFunction(String),

    /// `if`/`while` condition of a non-`bool` type
    #[error("Condition expression cannot be of type `{0}`")]
    ConditionNotBool(Type),

    /// Call with the wrong number of arguments
    #[error("Expected {expected} arguments; got {actual}")]
    WrongArgCount { expected: usize, actual: usize },

    /// Unary operator applied to an unsupported operand type
    #[error("Cannot apply operator `{op}` on type `{operand}`")]
    InvalidUnaryOperand { op: UnOp, operand: Type },

    /// Binary operator applied to an unsupported operand type pair
    #[error("Cannot apply operator `{op}` on types `{left}` and `{right}`")]
    InvalidBinaryOperands { op: BinOp, left: Type, right: Type },

    /// Field access on a type that does not have the field
    #[error("There is no attribute named `{field}` in class `{on}`")]
    UnknownField { on: Type, field: String },

    /// Method call on a type that does not have the method
    #[error("There is no method named `{method}` in class `{on}`")]
    UnknownMethod { on: Type, method: String },

    /// Method whose first parameter is not `self` typed as its own class
    #[error("First parameter of method must be `self` typed as the enclosing class: {0}")]
    MethodNeedsSelf(String),
}
