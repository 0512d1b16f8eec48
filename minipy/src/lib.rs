//! minipy compiler library
//!
//! Compiles a statically-typed Python subset (int/bool/none, classes with
//! fields and methods, functions, control flow) to a WebAssembly text module
//! executed by a host-provided linear-memory runtime.
//!
//! The pipeline is one-directional: untyped AST (from an external parser) ->
//! type-annotated AST -> stack-machine instructions -> module text.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod types;

pub use ast::{Program, Type};
pub use error::{CompileError, Result};

/// Check and compile an untyped program in one step.
pub fn compile(program: &Program<()>) -> Result<String> {
    let checked = types::TypeChecker::new().check_program(program)?;
    Ok(codegen::compile(&checked))
}
