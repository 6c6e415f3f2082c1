//! Symbol Index Core Library
//!
//! This crate provides the symbol model, the SQLite-backed symbol store,
//! the structured query compiler and the indexing orchestrator.

pub mod crawler;
pub mod error;
pub mod indexer;
pub mod model;
pub mod parser;
pub mod query;
pub mod storage;

// Re-export main types
pub use crawler::FileCrawler;
pub use error::{CrawlError, IndexError, InvalidSymbol, ParseError, StoreError};
pub use indexer::{
    CodeIndexer, FailureStage, FileFailure, IndexPhase, IndexProgress, IndexReport,
};
pub use model::{
    SearchRequest, Symbol, SymbolKind, UnknownSymbolKind, DEFAULT_SEARCH_LIMIT, UNKNOWN_LINE,
};
pub use parser::{ParserRegistry, SymbolParser};
pub use query::{compile, CompiledQuery};
pub use storage::{StoreOptions, SymbolStore};
