//! Indexing orchestrator
//!
//! Crawls a project, hands each file to its parser and persists the result
//! one file per transaction. A file that fails to parse, normalise or save
//! is recorded in the report and the run moves on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::crawler::FileCrawler;
use crate::error::{IndexError, ParseError, StoreError};
use crate::model::{has_parent_component, is_absolute_path, SearchRequest, Symbol};
use crate::parser::ParserRegistry;
use crate::storage::SymbolStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    NotStarted,
    Crawling,
    Parsing,
    Saving,
    Complete,
}

impl fmt::Display for IndexPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexPhase::NotStarted => "not started",
            IndexPhase::Crawling => "crawling",
            IndexPhase::Parsing => "parsing",
            IndexPhase::Saving => "saving",
            IndexPhase::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Snapshot handed to progress observers
#[derive(Debug, Clone)]
pub struct IndexProgress {
    pub phase: IndexPhase,
    pub files_processed: usize,
    pub files_total: usize,
    pub current_file: Option<PathBuf>,
}

/// Where in the per-file pipeline a file was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Parse,
    Normalize,
    Save,
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: FailureStage,
    pub reason: String,
}

/// Outcome of one indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub files_discovered: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub symbols_saved: usize,
    pub failures: Vec<FileFailure>,
}

impl IndexReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct CodeIndexer {
    db_path: PathBuf,
    registry: ParserRegistry,
    crawler: FileCrawler,
    phase: IndexPhase,
}

impl CodeIndexer {
    pub fn new(db_path: impl Into<PathBuf>, registry: ParserRegistry) -> Self {
        Self {
            db_path: db_path.into(),
            registry,
            crawler: FileCrawler::new(),
            phase: IndexPhase::NotStarted,
        }
    }

    pub fn with_crawler(mut self, crawler: FileCrawler) -> Self {
        self.crawler = crawler;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Phase reached by the most recent run
    pub fn phase(&self) -> IndexPhase {
        self.phase
    }

    pub fn index(&mut self, root: &Path) -> Result<IndexReport, IndexError> {
        self.index_with_classpath(root, &[])
    }

    pub fn index_with_classpath(
        &mut self,
        root: &Path,
        classpath: &[PathBuf],
    ) -> Result<IndexReport, IndexError> {
        self.index_with_progress(root, classpath, |_| {})
    }

    /// Index every supported file under `root`. `observer` is called once
    /// per file and once when the run completes.
    pub fn index_with_progress<F>(
        &mut self,
        root: &Path,
        classpath: &[PathBuf],
        mut observer: F,
    ) -> Result<IndexReport, IndexError>
    where
        F: FnMut(&IndexProgress),
    {
        let start = Instant::now();
        self.phase = IndexPhase::NotStarted;
        info!("Indexing {} into {}", root.display(), self.db_path.display());

        let extensions = self.registry.supported_extensions();
        if let Err(err) = self.registry.setup_all(root, classpath) {
            warn!("Parser setup failed: {}", err);
        }

        advance(&mut self.phase, IndexPhase::Crawling);
        let files = self.crawler.crawl(root, &extensions)?;

        let store = SymbolStore::open(&self.db_path)?;
        let mut report = IndexReport {
            files_discovered: files.len(),
            ..IndexReport::default()
        };

        for (processed, file) in files.iter().enumerate() {
            self.index_file(&store, root, file, &mut report);
            observer(&IndexProgress {
                phase: self.phase,
                files_processed: processed + 1,
                files_total: files.len(),
                current_file: Some(file.clone()),
            });
        }

        if let Err(err) = store.close() {
            error!("Failed to close symbol store: {}", err);
        }

        advance(&mut self.phase, IndexPhase::Complete);
        observer(&IndexProgress {
            phase: IndexPhase::Complete,
            files_processed: files.len(),
            files_total: files.len(),
            current_file: None,
        });

        info!(
            "Indexed {} of {} files ({} symbols, {} failed) in {:.2?}",
            report.files_indexed,
            report.files_discovered,
            report.symbols_saved,
            report.files_failed,
            start.elapsed()
        );
        Ok(report)
    }

    fn index_file(
        &mut self,
        store: &SymbolStore,
        root: &Path,
        file: &Path,
        report: &mut IndexReport,
    ) {
        let Some(parser) = self.registry.parser_for(file) else {
            report.files_skipped += 1;
            return;
        };

        advance(&mut self.phase, IndexPhase::Parsing);
        debug!("Parsing {} with {}", file.display(), parser.name());
        let symbols = match parser.parse(file, root) {
            Ok(symbols) => symbols,
            Err(err) => return record_failure(report, file, FailureStage::Parse, &err),
        };

        let symbols = match normalize_symbols(symbols, root) {
            Ok(symbols) => symbols,
            Err(err) => return record_failure(report, file, FailureStage::Normalize, &err),
        };

        advance(&mut self.phase, IndexPhase::Saving);
        match store.save_symbols(&symbols) {
            Ok(saved) => {
                report.files_indexed += 1;
                report.symbols_saved += saved;
            }
            Err(err) => record_failure(report, file, FailureStage::Save, &err),
        }
    }

    /// Run a structured query against the index. The store is opened for
    /// this call only.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Symbol>, StoreError> {
        let store = SymbolStore::open(&self.db_path)?;
        let results = store.search(request);
        store.close()?;
        results
    }
}

fn advance(current: &mut IndexPhase, next: IndexPhase) {
    if *current != next {
        debug!("Index phase: {} -> {}", current, next);
        *current = next;
    }
}

fn record_failure(
    report: &mut IndexReport,
    file: &Path,
    stage: FailureStage,
    err: &dyn std::error::Error,
) {
    warn!("Skipping {}: {}", file.display(), err);
    report.files_failed += 1;
    report.failures.push(FileFailure {
        path: file.to_path_buf(),
        stage,
        reason: err.to_string(),
    });
}

fn normalize_symbols(symbols: Vec<Symbol>, root: &Path) -> Result<Vec<Symbol>, ParseError> {
    let canonical_root = root.canonicalize().ok();
    symbols
        .into_iter()
        .map(|symbol| {
            let path = normalize_path(symbol.file_path(), root, canonical_root.as_deref())?;
            Ok(symbol.with_file_path(path))
        })
        .collect()
}

/// Make a parser-reported path root-relative with `/` separators. Paths
/// outside the root, or climbing out of it through `..`, are refused.
fn normalize_path(
    raw: &str,
    root: &Path,
    canonical_root: Option<&Path>,
) -> Result<String, ParseError> {
    let outside = || ParseError::Path {
        path: PathBuf::from(raw),
        root: root.to_path_buf(),
    };

    let relative = if is_absolute_path(raw) {
        let raw_path = Path::new(raw);
        raw_path
            .strip_prefix(root)
            .ok()
            .or_else(|| canonical_root.and_then(|r| raw_path.strip_prefix(r).ok()))
            .ok_or_else(outside)?
            .to_string_lossy()
            .replace('\\', "/")
    } else {
        let path = raw.replace('\\', "/");
        path.trim_start_matches("./").to_string()
    };

    if has_parent_component(&relative) {
        return Err(outside());
    }
    Ok(relative)
}
