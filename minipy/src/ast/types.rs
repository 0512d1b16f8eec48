//! Type AST nodes

use serde::{Deserialize, Serialize};

/// Type representation
///
/// Primitives compare structurally; object types compare nominally, by class
/// name. The default is `none`, matching the annotation on statements that
/// produce no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// 32-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// The `None` type
    #[default]
    None,
    /// Instance of a user-defined class
    Object(String),
}

impl Type {
    /// Whether this is an object type.
    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::None => write!(f, "none"),
            Type::Object(name) => write!(f, "{name}"),
        }
    }
}
