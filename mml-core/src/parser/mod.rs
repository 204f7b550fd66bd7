// mml-core/src/parser/mod.rs

pub mod comments;
pub mod compiler;
pub mod diagnostic;
pub mod error;
pub mod tokenizer;

pub use comments::{normalize, strip_comments};
pub use compiler::{compile, compile_clauses, Compiler, CompilerState};
pub use diagnostic::{locate, render_diagnostic, SourceLocation};
pub use error::MmlError;
pub use tokenizer::{Clause, Command, Modifiers, Tokenizer};
