//! Embedded code language
//!
//! Code between template tags is a small JavaScript-like language. The
//! generated steps are realized into one [`Program`] by the [`parser`] and
//! run by the [`interpreter`] against an explicit binding environment.
pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{Expr, Program, Stmt};
pub use interpreter::{Host, Interpreter};
pub use parser::realize;
pub use value::Value;

use std::fmt;
use std::sync::Arc;

/// Host function callable from template code
pub type NativeFn = Arc<dyn Fn(&[Value]) -> crate::Result<Value> + Send + Sync>;

/// Lexing or parsing failure inside a code chunk
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    /// Index into the program's source files
    pub file: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
            file: 0,
        }
    }

    pub fn in_file(mut self, file: usize) -> Self {
        self.file = file;
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}
