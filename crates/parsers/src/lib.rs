//! Tree-sitter based language parsers for the symbol index

mod java;
mod python;
mod rust;
mod source;

pub use java::JavaParser;
pub use python::PythonParser;
pub use rust::RustParser;

use codeindex_core::ParserRegistry;

/// Registry with every parser this crate ships, Python first and Java last.
pub fn default_registry() -> ParserRegistry {
    ParserRegistry::new()
        .with_parser(Box::new(PythonParser::new()))
        .with_parser(Box::new(RustParser::new()))
        .with_parser(Box::new(JavaParser::new()))
}
