//! Language parser seam

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ParseError;
use crate::model::Symbol;

/// A language-specific symbol extractor.
///
/// `parse` returns every symbol found in one file, with `file_path` either
/// relative to `source_root` or absolute; the indexer normalises both.
pub trait SymbolParser: Send {
    /// Get the parser name
    fn name(&self) -> &str;

    /// File extensions this parser accepts, without the leading dot
    fn supported_extensions(&self) -> &[&'static str];

    /// Called once per indexing run, before any `parse` call.
    fn setup(&mut self, _source_root: &Path, _classpath: &[PathBuf]) -> Result<(), ParseError> {
        Ok(())
    }

    fn parse(&self, path: &Path, source_root: &Path) -> Result<Vec<Symbol>, ParseError>;
}

/// Registry for symbol parsers. Lookup is by extension; the first
/// registered parser claiming an extension wins.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn SymbolParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser
    pub fn register(&mut self, parser: Box<dyn SymbolParser>) {
        debug!(
            "Registered parser {} for {:?}",
            parser.name(),
            parser.supported_extensions()
        );
        self.parsers.push(parser);
    }

    pub fn with_parser(mut self, parser: Box<dyn SymbolParser>) -> Self {
        self.register(parser);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn parser_names(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// Union of all registered extensions, lowercased
    pub fn supported_extensions(&self) -> BTreeSet<String> {
        self.parsers
            .iter()
            .flat_map(|p| p.supported_extensions().iter())
            .map(|ext| ext.to_ascii_lowercase())
            .collect()
    }

    /// Get the parser for a file, matched on its extension
    pub fn parser_for(&self, path: &Path) -> Option<&dyn SymbolParser> {
        let extension = path.extension()?.to_str()?;
        self.parsers
            .iter()
            .find(|p| {
                p.supported_extensions()
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .map(|p| p.as_ref())
    }

    /// Run `setup` on every parser, stopping at the first failure.
    pub fn setup_all(&mut self, source_root: &Path, classpath: &[PathBuf]) -> Result<(), ParseError> {
        for parser in &mut self.parsers {
            parser.setup(source_root, classpath)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.parser_names())
            .finish()
    }
}
