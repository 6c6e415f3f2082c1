//! Symbol storage using SQLite
//!
//! One connection per store, serialised behind a mutex. Rows are written
//! only through [`SymbolStore::save_symbols`], so the insert trigger keeps
//! the FTS5 shadow table in step with the base table.

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::model::{SearchRequest, Symbol, SymbolKind};
use crate::query::{compile, CompiledQuery, SELECT_COLUMNS};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS symbols (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        class_name TEXT,
        package_name TEXT,
        kind TEXT NOT NULL,
        file_path TEXT NOT NULL,
        line INTEGER NOT NULL,
        signature TEXT,
        reference_to TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
    CREATE INDEX IF NOT EXISTS idx_symbols_class_name ON symbols(class_name);
    CREATE INDEX IF NOT EXISTS idx_symbols_package_name ON symbols(package_name);
    CREATE INDEX IF NOT EXISTS idx_symbols_reference_to ON symbols(reference_to);
    -- Ordered read-back for exporters
    CREATE INDEX IF NOT EXISTS idx_symbols_file_line ON symbols(file_path, line);

    CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
        name,
        class_name,
        package_name,
        content='symbols',
        content_rowid='id'
    );

    CREATE TRIGGER IF NOT EXISTS symbols_ai AFTER INSERT ON symbols BEGIN
        INSERT INTO symbols_fts(rowid, name, class_name, package_name)
        VALUES (new.id, new.name, new.class_name, new.package_name);
    END;

    CREATE TRIGGER IF NOT EXISTS symbols_ad AFTER DELETE ON symbols BEGIN
        INSERT INTO symbols_fts(symbols_fts, rowid, name, class_name, package_name)
        VALUES ('delete', old.id, old.name, old.class_name, old.package_name);
    END;
"#;

const INSERT_SQL: &str = "INSERT INTO symbols (name, class_name, package_name, kind, file_path, line, signature, reference_to) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Open-time tuning. The index is rebuildable from source, so durability is
/// relaxed (WAL + `synchronous = NORMAL`) but never switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Page cache size in KiB
    pub cache_size_kib: u32,
    /// How long to wait on a lock held by another process
    pub busy_timeout: Duration,
    /// Rows inserted per chunk inside one `save_symbols` transaction
    pub chunk_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache_size_kib: 64_000,
            busy_timeout: Duration::from_secs(5),
            chunk_size: 1000,
        }
    }
}

/// SQLite-backed symbol store
pub struct SymbolStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
    options: StoreOptions,
}

impl SymbolStore {
    /// Open (creating if needed) the store at `path` with default tuning
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self, StoreError> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path).map_err(StoreError::Open)?;
        let store = Self::from_connection(conn, Some(db_path), options)?;
        info!("Opened symbol store at {}", store.display_path());
        Ok(store)
    }

    /// Create an in-memory symbol store (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Open)?;
        Self::from_connection(conn, None, StoreOptions::default())
    }

    /// Configure and initialise a fresh connection. On failure the
    /// connection is closed here, before the error reaches the caller.
    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let prepared = configure(&conn, &options).and_then(|_| create_schema(&conn));
        if let Err(err) = prepared {
            close_after_failure(conn);
            return Err(err);
        }

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path,
            options,
        })
    }

    /// Create schema objects. Safe to call on an existing store.
    ///
    /// A schema failure is fatal for this store: the connection is closed
    /// before the error is returned and later calls see
    /// [`StoreError::Closed`].
    pub fn initialize(&self) -> Result<(), StoreError> {
        let mut slot = self.conn.lock();
        let conn = slot.as_ref().ok_or(StoreError::Closed)?;
        if let Err(err) = create_schema(conn) {
            if let Some(conn) = slot.take() {
                close_after_failure(conn);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Get database path (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }

    /// Insert a batch of symbols as one transaction.
    ///
    /// Every symbol is validated before anything is written. On failure the
    /// transaction is rolled back and no row of the batch is visible.
    pub fn save_symbols(&self, symbols: &[Symbol]) -> Result<usize, StoreError> {
        if symbols.is_empty() {
            return Ok(0);
        }
        for (index, symbol) in symbols.iter().enumerate() {
            symbol
                .validate()
                .map_err(|reason| StoreError::InvalidSymbol { index, reason })?;
        }

        let conn = self.conn()?;
        let mut txn = TxnGuard::begin(&conn).map_err(|source| StoreError::Write {
            source,
            rollback: None,
        })?;

        let written = insert_chunks(&conn, symbols, self.options.chunk_size.max(1))
            .and_then(|_| txn.commit());

        match written {
            Ok(()) => {
                debug!("Saved {} symbols", symbols.len());
                Ok(symbols.len())
            }
            Err(source) => Err(StoreError::Write {
                source,
                rollback: txn.rollback_if_open().err(),
            }),
        }
    }

    /// Run a compiled query; rows come back in result order, capped at the
    /// compiled limit.
    pub fn execute(&self, query: &CompiledQuery) -> Result<Vec<Symbol>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query.sql).map_err(StoreError::Query)?;
        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), row_to_symbol)
            .map_err(StoreError::Query)?;

        let mut symbols = Vec::new();
        for row in rows.take(query.limit) {
            symbols.push(row.map_err(StoreError::Query)?);
        }
        Ok(symbols)
    }

    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Symbol>, StoreError> {
        self.execute(&compile(request))
    }

    /// Every symbol (optionally restricted to `kinds`) in source order:
    /// `(file_path, line)` ascending.
    pub fn get_all(&self, kinds: &[SymbolKind]) -> Result<Vec<Symbol>, StoreError> {
        let mut sql = String::from(SELECT_COLUMNS);
        if !kinds.is_empty() {
            let placeholders = vec!["?"; kinds.len()].join(", ");
            sql.push_str(&format!(" WHERE kind IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY file_path, line, id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(StoreError::Query)?;
        let symbols = stmt
            .query_map(params_from_iter(kinds.iter()), row_to_symbol)
            .map_err(StoreError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Query)?;
        Ok(symbols)
    }

    /// Get total symbol count
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))
            .map_err(StoreError::Query)?;
        Ok(count as usize)
    }

    /// Number of rows the FTS5 shadow index returns for a prefix term.
    /// Diagnostic only; searches go through the query compiler.
    pub fn shadow_match_count(&self, prefix: &str) -> Result<usize, StoreError> {
        let term = format!("\"{}\"*", prefix.replace('"', "\"\""));
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM symbols_fts WHERE symbols_fts MATCH ?1",
                params![term],
                |row| row.get(0),
            )
            .map_err(StoreError::Query)?;
        Ok(count as usize)
    }

    /// Delete all symbols
    pub fn truncate(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM symbols", [])
            .map_err(|source| StoreError::Write {
                source,
                rollback: None,
            })?;
        info!("Truncated symbol store ({} rows)", deleted);
        Ok(deleted)
    }

    /// Close the connection. Later calls are no-ops.
    pub fn close(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => {
                debug!("Closing symbol store at {}", self.display_path());
                conn.close().map_err(|(_, err)| StoreError::Close(err))
            }
            None => Ok(()),
        }
    }

    fn conn(&self) -> Result<MappedMutexGuard<'_, Connection>, StoreError> {
        MutexGuard::try_map(self.conn.lock(), Option::as_mut).map_err(|_| StoreError::Closed)
    }

    fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }
}

impl Drop for SymbolStore {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            if let Err((_, err)) = conn.close() {
                error!("Failed to close symbol store: {}", err);
            }
        }
    }
}

fn configure(conn: &Connection, options: &StoreOptions) -> Result<(), StoreError> {
    conn.execute_batch(&format!(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -{};
        PRAGMA temp_store = MEMORY;
        "#,
        options.cache_size_kib
    ))
    .map_err(StoreError::Pragma)?;
    conn.busy_timeout(options.busy_timeout)
        .map_err(StoreError::Pragma)
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA).map_err(StoreError::Schema)
}

fn close_after_failure(conn: Connection) {
    if let Err((_, close_err)) = conn.close() {
        error!("Failed to close connection after init failure: {}", close_err);
    }
}

fn insert_chunks(conn: &Connection, symbols: &[Symbol], chunk_size: usize) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(INSERT_SQL)?;
    for (chunk_no, chunk) in symbols.chunks(chunk_size).enumerate() {
        for symbol in chunk {
            stmt.execute(params![
                symbol.name(),
                symbol.class_name(),
                symbol.package_name(),
                symbol.kind(),
                symbol.file_path(),
                symbol.line(),
                symbol.signature(),
                symbol.reference_to(),
            ])?;
        }
        debug!("Inserted chunk {} ({} rows)", chunk_no, chunk.len());
    }
    Ok(())
}

fn row_to_symbol(row: &Row<'_>) -> rusqlite::Result<Symbol> {
    let symbol = Symbol::new(
        row.get::<_, String>(0)?,
        row.get::<_, SymbolKind>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, i64>(5)?,
    );
    Ok(symbol.with_optional_parts(row.get(1)?, row.get(2)?, row.get(6)?, row.get(7)?))
}

impl ToSql for SymbolKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SymbolKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

/// Explicit transaction on a shared connection. Whatever happens, the
/// connection is back in autocommit mode once the guard is gone.
struct TxnGuard<'a> {
    conn: &'a Connection,
    finished: bool,
}

impl<'a> TxnGuard<'a> {
    fn begin(conn: &'a Connection) -> rusqlite::Result<Self> {
        conn.execute_batch("BEGIN")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    fn commit(&mut self) -> rusqlite::Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    fn rollback(&mut self) -> rusqlite::Result<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")
    }

    /// Roll back unless SQLite already did so on its own (e.g. SQLITE_FULL).
    fn rollback_if_open(&mut self) -> rusqlite::Result<()> {
        if self.conn.is_autocommit() {
            self.finished = true;
            return Ok(());
        }
        self.rollback()
    }
}

impl Drop for TxnGuard<'_> {
    fn drop(&mut self) {
        if self.finished && self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            error!("Error restoring autocommit: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn symbol(name: &str, kind: SymbolKind, file_path: &str, line: i64) -> Symbol {
        Symbol::new(name, kind, file_path, line).with_signature(format!("sig {}", name))
    }

    fn schema_object_count(store: &SymbolStore) -> i64 {
        store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_create_store() {
        let store = SymbolStore::in_memory().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.path().is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("index.db");

        let store = SymbolStore::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.path(), Some(db_path.as_path()));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = SymbolStore::in_memory().unwrap();
        let before = schema_object_count(&store);

        store.initialize().unwrap();
        store.initialize().unwrap();

        assert_eq!(schema_object_count(&store), before);
    }

    #[test]
    fn test_reopen_existing_store_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("index.db");

        let store = SymbolStore::open(&db_path).unwrap();
        store
            .save_symbols(&[symbol("Alpha", SymbolKind::Class, "a.py", 1)])
            .unwrap();
        store.close().unwrap();

        let reopened = SymbolStore::open(&db_path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_pragmas_applied() {
        let temp_dir = TempDir::new().unwrap();
        let store = SymbolStore::open(temp_dir.path().join("tuned.db")).unwrap();
        let conn = store.conn().unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let synchronous: i64 = conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        let temp_store: i64 = conn
            .query_row("PRAGMA temp_store", [], |row| row.get(0))
            .unwrap();

        assert_eq!(journal_mode.to_lowercase(), "wal");
        assert_eq!(synchronous, 1); // NORMAL
        assert_eq!(temp_store, 2); // MEMORY
    }

    #[test]
    fn test_open_garbage_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("garbage.db");
        std::fs::write(&db_path, "this is not a sqlite database ".repeat(64)).unwrap();

        let result = SymbolStore::open(&db_path);
        assert!(matches!(
            result,
            Err(StoreError::Pragma(_)) | Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn test_save_and_get_all_in_source_order() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("b2", SymbolKind::Method, "b.py", 20),
                symbol("a9", SymbolKind::Method, "a.py", 9),
                symbol("b1", SymbolKind::Class, "b.py", 1),
                symbol("a1", SymbolKind::Class, "a.py", 1),
            ])
            .unwrap();

        let names: Vec<_> = store
            .get_all(&[])
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a1", "a9", "b1", "b2"]);

        let classes = store.get_all(&[SymbolKind::Class]).unwrap();
        assert_eq!(classes.len(), 2);
        assert!(classes.iter().all(|s| s.kind() == SymbolKind::Class));
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let store = SymbolStore::in_memory().unwrap();
        let original = Symbol::new("call", SymbolKind::Reference, "pkg/mod.py", 7)
            .with_class_name("Worker")
            .with_package_name("pkg.mod")
            .with_signature("self.call()")
            .with_reference_to("pkg.mod.Worker.call");
        store.save_symbols(&[original.clone()]).unwrap();

        let stored = store.get_all(&[]).unwrap();
        assert_eq!(stored, vec![original]);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let store = SymbolStore::in_memory().unwrap();
        assert_eq!(store.save_symbols(&[]).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_invalid_symbol_rejects_whole_batch() {
        let store = SymbolStore::in_memory().unwrap();
        let result = store.save_symbols(&[
            symbol("ok", SymbolKind::Class, "a.py", 1),
            symbol("", SymbolKind::Class, "a.py", 2),
        ]);

        assert!(matches!(
            result,
            Err(StoreError::InvalidSymbol { index: 1, .. })
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_batch_rolls_back_every_row() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON symbols WHEN NEW.name = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'boom rejected'); END;",
            )
            .unwrap();

        let batch: Vec<_> = ["one", "two", "boom", "four"]
            .iter()
            .enumerate()
            .map(|(i, name)| symbol(name, SymbolKind::Field, "x.py", i as i64 + 1))
            .collect();

        match store.save_symbols(&batch) {
            Err(StoreError::Write { source, rollback }) => {
                assert!(source.to_string().contains("boom rejected"));
                assert!(rollback.is_none());
            }
            other => panic!("expected a write error, got {:?}", other),
        }
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.conn().unwrap().is_autocommit());

        // The connection is usable again for the next batch
        store
            .save_symbols(&[symbol("five", SymbolKind::Field, "x.py", 5)])
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_earlier_batches_survive_a_failed_batch() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[symbol("kept", SymbolKind::Class, "a.py", 1)])
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_all BEFORE INSERT ON symbols
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        assert!(store
            .save_symbols(&[symbol("lost", SymbolKind::Class, "b.py", 1)])
            .is_err());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_chunked_insert_keeps_all_rows() {
        let options = StoreOptions {
            chunk_size: 7,
            ..StoreOptions::default()
        };
        let temp_dir = TempDir::new().unwrap();
        let store = SymbolStore::open_with(temp_dir.path().join("chunks.db"), options).unwrap();

        let batch: Vec<_> = (1..=20)
            .map(|i| symbol(&format!("s{}", i), SymbolKind::Variable, "c.py", i))
            .collect();
        assert_eq!(store.save_symbols(&batch).unwrap(), 20);
        assert_eq!(store.count().unwrap(), 20);
    }

    #[test]
    fn test_shadow_index_follows_inserts_and_deletes() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("parseHeader", SymbolKind::Method, "a.py", 1).with_class_name("Reader"),
                symbol("parseBody", SymbolKind::Method, "a.py", 2).with_class_name("Reader"),
                symbol("write", SymbolKind::Method, "b.py", 1).with_class_name("Writer"),
            ])
            .unwrap();

        assert_eq!(store.shadow_match_count("parse").unwrap(), 2);
        assert_eq!(store.shadow_match_count("Reader").unwrap(), 2);
        assert_eq!(store.shadow_match_count("Writer").unwrap(), 1);

        assert_eq!(store.truncate().unwrap(), 3);
        assert_eq!(store.shadow_match_count("parse").unwrap(), 0);
    }

    #[test]
    fn test_search_limit_bounds_results() {
        let store = SymbolStore::in_memory().unwrap();
        for i in 0..1100 {
            store
                .save_symbols(&[symbol(
                    "CommonName",
                    SymbolKind::Class,
                    &format!("F{}", i),
                    i + 1,
                )])
                .unwrap();
        }

        let results = store.search(&SearchRequest::query("CommonName")).unwrap();
        assert_eq!(results.len(), 1000);

        let results = store
            .search(&SearchRequest::query("CommonName").with_limit(10))
            .unwrap();
        assert_eq!(results.len(), 10);
    }

    #[test]
    fn test_container_qualified_search() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("testMethod", SymbolKind::Method, "TestClass.java", 4)
                    .with_class_name("TestClass"),
                symbol("testMethod", SymbolKind::Method, "OtherClass.java", 3)
                    .with_class_name("OtherClass"),
            ])
            .unwrap();

        let all = store.search(&SearchRequest::query("testMethod")).unwrap();
        assert_eq!(all.len(), 2);

        let scoped = store
            .search(&SearchRequest::query("TestClass::testMethod"))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].class_name(), Some("TestClass"));
    }

    #[test]
    fn test_container_matches_package_name() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("helper", SymbolKind::Method, "util/io.py", 1).with_package_name("util.io"),
                symbol("helper", SymbolKind::Method, "net/io.py", 1).with_package_name("net.io"),
            ])
            .unwrap();

        let results = store.search(&SearchRequest::query("util::helper")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path(), "util/io.py");
    }

    #[test]
    fn test_kind_and_package_filters() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("A", SymbolKind::Class, "A.java", 1).with_package_name("p1"),
                symbol("m2", SymbolKind::Method, "B.java", 1)
                    .with_package_name("p2")
                    .with_class_name("B"),
            ])
            .unwrap();

        let methods = store
            .search(&SearchRequest::new().with_kinds([SymbolKind::Method]))
            .unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name(), "m2");

        let p1 = store
            .search(&SearchRequest::new().with_package_name("p1"))
            .unwrap();
        assert_eq!(p1.len(), 1);
        assert_eq!(p1[0].package_name(), Some("p1"));

        let none = store
            .search(
                &SearchRequest::new()
                    .with_package_name("p1")
                    .with_kinds([SymbolKind::Method]),
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_file_path_glob_filter() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("A", SymbolKind::Class, "src/A.x", 1),
                symbol("B", SymbolKind::Class, "src/B.x", 1),
            ])
            .unwrap();

        let results = store
            .search(&SearchRequest::new().with_file_path_glob("*B.x"))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "B");

        let results = store
            .search(&SearchRequest::new().with_file_path_glob("src/?.x"))
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_query_wildcards_match_literally() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[
                symbol("get_name", SymbolKind::Method, "a.py", 1),
                symbol("getXname", SymbolKind::Method, "a.py", 2),
            ])
            .unwrap();

        let results = store.search(&SearchRequest::query("t_n")).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "get_name");

        assert!(store.search(&SearchRequest::query("%")).unwrap().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let store = SymbolStore::in_memory().unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(store.count(), Err(StoreError::Closed)));
        assert!(matches!(
            store.save_symbols(&[symbol("a", SymbolKind::Class, "a.py", 1)]),
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn test_failed_rollback_is_kept_as_secondary_cause() {
        let conn = Connection::open_in_memory().unwrap();
        let mut txn = TxnGuard::begin(&conn).unwrap();
        // Transaction ends behind the guard's back; ROLLBACK has nothing to undo
        conn.execute_batch("COMMIT").unwrap();

        let rollback = txn.rollback().err();
        assert!(rollback.is_some());
        assert!(conn.is_autocommit());

        let err = StoreError::Write {
            source: rusqlite::Error::InvalidQuery,
            rollback,
        };
        let message = err.to_string();
        assert!(message.starts_with("failed to save symbols"));
        assert!(message.contains("rollback also failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_rollback_if_open_skips_finished_transaction() {
        let conn = Connection::open_in_memory().unwrap();
        let mut txn = TxnGuard::begin(&conn).unwrap();
        conn.execute_batch("ROLLBACK").unwrap();

        assert!(txn.rollback_if_open().is_ok());
        drop(txn);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_txn_guard_drop_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        {
            let _txn = TxnGuard::begin(&conn).unwrap();
            conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        }
        assert!(conn.is_autocommit());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_failed_initialize_closes_store() {
        let store = SymbolStore::in_memory().unwrap();
        store
            .save_symbols(&[symbol("a", SymbolKind::Class, "a.py", 1)])
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "DROP INDEX idx_symbols_name;
                 CREATE TABLE idx_symbols_name (x INTEGER);",
            )
            .unwrap();

        assert!(matches!(store.initialize(), Err(StoreError::Schema(_))));
        assert!(store.is_closed());
        assert!(matches!(store.count(), Err(StoreError::Closed)));
        assert!(matches!(store.initialize(), Err(StoreError::Closed)));
        store.close().unwrap();
    }
}
