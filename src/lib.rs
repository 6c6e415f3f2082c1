//! codeindex: persistent symbol index and structured query engine
//!
//! Facade over the workspace crates: the core index ([`codeindex_core`]) and
//! the tree-sitter language parsers ([`codeindex_parsers`]).

pub use codeindex_core::*;
pub use codeindex_parsers::{default_registry, JavaParser, PythonParser, RustParser};
