//! Abstract Syntax Tree definitions
//!
//! The AST is generic over its annotation: the external parser hands us a
//! `Program<()>`, the type checker produces a fresh `Program<Type>` with
//! every statement and expression annotated. Checked annotations are the only
//! channel of information between the checker and the code generator.

mod expr;
mod types;

pub use expr::*;
pub use types::*;

use serde::{Deserialize, Serialize};

/// A whole program: global variables, functions, classes, and a top-level
/// statement sequence.
///
/// Annotation fields default when omitted from the serialized form, so the
/// parser collaborator can leave them out of untyped trees entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub struct Program<A> {
    pub vars: Vec<VarDef>,
    pub funcs: Vec<FunDef<A>>,
    pub classes: Vec<ClassDef<A>>,
    pub body: Vec<Stmt<A>>,
    /// Annotation of the final top-level statement (`none` for an empty body)
    #[serde(default)]
    pub ann: A,
}

/// Class definition.
///
/// Field order is significant: it fixes the instance memory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub struct ClassDef<A> {
    pub name: String,
    pub fields: Vec<VarDef>,
    pub methods: Vec<FunDef<A>>,
}

impl<A> ClassDef<A> {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&VarDef> {
        self.fields.iter().find(|f| f.var.name == name)
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&FunDef<A>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Function definition. Methods share this representation; a method's first
/// parameter is `self`, typed as the enclosing class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "A: serde::Deserialize<'de> + Default"))]
pub struct FunDef<A> {
    pub name: String,
    pub params: Vec<TypedVar>,
    pub ret: Type,
    /// Local variable initializers, declared before the statement body
    pub inits: Vec<VarDef>,
    pub body: Vec<Stmt<A>>,
}

/// A typed variable bound to a literal initializer. Arbitrary initializer
/// expressions are not representable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDef {
    pub var: TypedVar,
    pub value: Literal,
}

/// Name plus declared type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedVar {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}
