//! An interactive compiler and just-in-time evaluator for a small
//! expression-oriented language: numbers, user-defined functions, and
//! user-definable unary/binary operators, with `if`/`for`/`var` control
//! flow over one scalar type (`double`).
//!
//! Each top-level form typed at the REPL is lexed, parsed, lowered to IR,
//! optimized, and either linked into the running JIT session (`def`,
//! `extern`) or compiled and invoked on the spot (a bare expression).

pub mod ast;
pub mod codegen;
pub mod debug;
pub mod error;
pub mod jit;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod registry;
pub mod repl;
pub mod runtime;

/// The type returned by every fallible step of the pipeline: parsing,
/// lowering, verification, and JIT execution. The error is always
/// [error::InterpretationError].
pub type Result<T> = std::result::Result<T, error::InterpretationError>;

/// Re-exports the items most call sites need together.
pub mod prelude {
    pub use crate::ast::{Expr, Function, Prototype};
    pub use crate::error::InterpretationError;
    pub use crate::jit::Jit;
    pub use crate::lexer::{Scanner, Token};
    pub use crate::parser::Parser;
}
