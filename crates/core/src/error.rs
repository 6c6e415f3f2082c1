use std::path::PathBuf;
use thiserror::Error;

/// Why a symbol was refused before it reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSymbol {
    #[error("symbol name is empty")]
    EmptyName,
    #[error("symbol file path is empty")]
    EmptyFilePath,
    #[error("symbol file path is absolute: {0}")]
    AbsoluteFilePath(String),
    #[error("symbol file path leaves the project root: {0}")]
    ParentDirFilePath(String),
    #[error("line must be >= 1 or -1, got {0}")]
    InvalidLine(i64),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open symbol store: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("failed to configure symbol store: {0}")]
    Pragma(#[source] rusqlite::Error),

    #[error("failed to initialize schema: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("symbol #{index} rejected: {reason}")]
    InvalidSymbol {
        index: usize,
        #[source]
        reason: InvalidSymbol,
    },

    /// Batch insert failed and was rolled back. `rollback` carries the
    /// rollback failure when the rollback itself also failed.
    #[error("failed to save symbols: {source}{}", rollback_suffix(.rollback))]
    Write {
        #[source]
        source: rusqlite::Error,
        rollback: Option<rusqlite::Error>,
    },

    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("failed to close symbol store: {0}")]
    Close(#[source] rusqlite::Error),

    #[error("symbol store is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn rollback_suffix(rollback: &Option<rusqlite::Error>) -> String {
    match rollback {
        Some(err) => format!(" (rollback also failed: {})", err),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid root path: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {} at line {line}", .path.display())]
    Syntax { path: PathBuf, line: usize },

    #[error("parser unavailable: {0}")]
    Language(String),

    #[error("{} is outside project root {}", .path.display(), .root.display())]
    Path { path: PathBuf, root: PathBuf },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
