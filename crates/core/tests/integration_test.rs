use codeindex_core::{
    CodeIndexer, ParseError, ParserRegistry, SearchRequest, Symbol, SymbolKind, SymbolParser,
    SymbolStore,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Toy parser for `.decl` files: each line is `<KIND> <name> [<class>]`.
/// The package is the parent directory, dotted.
struct DeclParser;

impl SymbolParser for DeclParser {
    fn name(&self) -> &str {
        "decl"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &["decl"]
    }

    fn parse(&self, path: &Path, source_root: &Path) -> Result<Vec<Symbol>, ParseError> {
        let content = fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let relative = path
            .strip_prefix(source_root)
            .map_err(|_| ParseError::Path {
                path: path.to_path_buf(),
                root: source_root.to_path_buf(),
            })?;
        let package = relative
            .parent()
            .map(|p| p.to_string_lossy().replace('/', "."))
            .filter(|p| !p.is_empty());

        let mut symbols = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let parts: Vec<_> = line.split_whitespace().collect();
            if parts.len() < 2 {
                continue;
            }
            let kind = parts[0].parse::<SymbolKind>().map_err(|_| ParseError::Syntax {
                path: path.to_path_buf(),
                line: i + 1,
            })?;
            // Absolute on purpose; the indexer must relativise it
            let mut symbol = Symbol::new(parts[1], kind, path.to_string_lossy(), i as i64 + 1);
            if let Some(class_name) = parts.get(2) {
                symbol = symbol.with_class_name(*class_name);
            }
            if let Some(package) = &package {
                symbol = symbol.with_package_name(package.clone());
            }
            symbols.push(symbol);
        }
        Ok(symbols)
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn registry() -> ParserRegistry {
    ParserRegistry::new().with_parser(Box::new(DeclParser))
}

#[test]
fn test_index_then_reopen_elsewhere() {
    let project = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write(
        project.path(),
        "app/model/TestClass.decl",
        "CLASS TestClass\nMETHOD testMethod TestClass\nFIELD count TestClass\n",
    );
    write(
        project.path(),
        "app/model/OtherClass.decl",
        "CLASS OtherClass\nMETHOD testMethod OtherClass\n",
    );
    write(project.path(), "README.md", "CLASS NotIndexed\n");

    let db_path = db_dir.path().join("index.db");
    let mut indexer = CodeIndexer::new(&db_path, registry());
    let report = indexer.index(project.path()).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.symbols_saved, 5);

    // Move the database away from the machine-specific temp dirs
    let moved_dir = TempDir::new().unwrap();
    let moved = moved_dir.path().join("copied.db");
    fs::copy(&db_path, &moved).unwrap();
    drop(project);

    let store = SymbolStore::open(&moved).unwrap();
    let all = store.get_all(&[]).unwrap();
    assert_eq!(all.len(), 5);
    for symbol in &all {
        assert!(symbol.file_path().starts_with("app/model/"));
        assert!(!Path::new(symbol.file_path()).is_absolute());
    }

    let scoped = store
        .search(&SearchRequest::query("TestClass::testMethod"))
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].class_name(), Some("TestClass"));
    assert_eq!(scoped[0].package_name(), Some("app.model"));
}

#[test]
fn test_bad_file_is_isolated() {
    let project = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write(project.path(), "good.decl", "CLASS Good\nMETHOD run Good\n");
    write(project.path(), "bad.decl", "CLASS Fine\nNONSENSE broken\n");

    let mut indexer = CodeIndexer::new(db_dir.path().join("index.db"), registry());
    let report = indexer.index(project.path()).unwrap();

    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_failed, 1);
    assert!(report.failures[0].path.ends_with("bad.decl"));

    let all = indexer.search(&SearchRequest::new()).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|s| s.file_path() == "good.decl"));
}

#[test]
fn test_filters_compose_over_indexed_project() {
    let project = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write(project.path(), "p1/A.decl", "CLASS Alpha\n");
    write(project.path(), "p2/B.decl", "METHOD beta Beta\n");

    let mut indexer = CodeIndexer::new(db_dir.path().join("index.db"), registry());
    indexer.index(project.path()).unwrap();

    let methods = indexer
        .search(&SearchRequest::new().with_kinds([SymbolKind::Method]))
        .unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].name(), "beta");

    let in_p1 = indexer
        .search(&SearchRequest::new().with_package_name("p1"))
        .unwrap();
    assert_eq!(in_p1.len(), 1);
    assert_eq!(in_p1[0].package_name(), Some("p1"));

    let by_glob = indexer
        .search(&SearchRequest::new().with_file_path_glob("*B.decl"))
        .unwrap();
    assert_eq!(by_glob.len(), 1);
    assert_eq!(by_glob[0].file_path(), "p2/B.decl");
}

#[test]
fn test_reindex_into_same_database_appends() {
    let project = TempDir::new().unwrap();
    let db_dir = TempDir::new().unwrap();
    write(project.path(), "one.decl", "CLASS One\n");
    let db_path = db_dir.path().join("index.db");

    CodeIndexer::new(&db_path, registry())
        .index(project.path())
        .unwrap();
    CodeIndexer::new(&db_path, registry())
        .index(project.path())
        .unwrap();

    let store = SymbolStore::open(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 2);
}
