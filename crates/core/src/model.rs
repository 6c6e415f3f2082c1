use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::InvalidSymbol;

/// Upper bound applied to a search when the caller does not set one.
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// Line value used when the source location of a symbol is unknown.
pub const UNKNOWN_LINE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolKind {
    Class,
    Interface,
    Method,
    Field,
    Variable,
    Reference,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 6] = [
        SymbolKind::Class,
        SymbolKind::Interface,
        SymbolKind::Method,
        SymbolKind::Field,
        SymbolKind::Variable,
        SymbolKind::Reference,
    ];

    /// Symbolic name, as stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "CLASS",
            SymbolKind::Interface => "INTERFACE",
            SymbolKind::Method => "METHOD",
            SymbolKind::Field => "FIELD",
            SymbolKind::Variable => "VARIABLE",
            SymbolKind::Reference => "REFERENCE",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown symbol kind: {0}")]
pub struct UnknownSymbolKind(pub String);

impl FromStr for SymbolKind {
    type Err = UnknownSymbolKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SymbolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownSymbolKind(trimmed.to_string()))
    }
}

/// One recorded occurrence of a named program element.
///
/// Symbols are plain values: construct with [`Symbol::new`] and the `with_*`
/// methods, read through the accessors. `file_path` is relative to the
/// indexed project root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    name: String,
    kind: SymbolKind,
    class_name: Option<String>,
    package_name: Option<String>,
    file_path: String,
    line: i64,
    signature: Option<String>,
    reference_to: Option<String>,
}

impl Symbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        file_path: impl Into<String>,
        line: i64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            class_name: None,
            package_name: None,
            file_path: file_path.into(),
            line,
            signature: None,
            reference_to: None,
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_reference_to(mut self, reference_to: impl Into<String>) -> Self {
        self.reference_to = Some(reference_to.into());
        self
    }

    /// Replace the stored path. Used by the indexer when it normalises
    /// parser output to root-relative form.
    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub(crate) fn with_optional_parts(
        mut self,
        class_name: Option<String>,
        package_name: Option<String>,
        signature: Option<String>,
        reference_to: Option<String>,
    ) -> Self {
        self.class_name = class_name;
        self.package_name = package_name;
        self.signature = signature;
        self.reference_to = reference_to;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn line(&self) -> i64 {
        self.line
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn reference_to(&self) -> Option<&str> {
        self.reference_to.as_deref()
    }

    /// `Class::name` for scoped symbols, the bare name otherwise.
    pub fn display_name(&self) -> String {
        match &self.class_name {
            Some(class_name) => format!("{}::{}", class_name, self.name),
            None => self.name.clone(),
        }
    }

    /// Check the fields every stored row must carry.
    pub fn validate(&self) -> Result<(), InvalidSymbol> {
        if self.name.trim().is_empty() {
            return Err(InvalidSymbol::EmptyName);
        }
        if self.file_path.trim().is_empty() {
            return Err(InvalidSymbol::EmptyFilePath);
        }
        if is_absolute_path(&self.file_path) {
            return Err(InvalidSymbol::AbsoluteFilePath(self.file_path.clone()));
        }
        if has_parent_component(&self.file_path) {
            return Err(InvalidSymbol::ParentDirFilePath(self.file_path.clone()));
        }
        if self.line < 1 && self.line != UNKNOWN_LINE {
            return Err(InvalidSymbol::InvalidLine(self.line));
        }
        Ok(())
    }
}

/// Absolute on this platform, or rooted in Unix/Windows style.
pub(crate) fn is_absolute_path(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Any `..` segment, with either separator.
pub(crate) fn has_parent_component(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

/// Structured search query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Free text; `Container::name` scopes the name to a class or package
    pub query: Option<String>,
    /// Kinds to keep, OR-matched
    pub kinds: Option<BTreeSet<SymbolKind>>,
    /// Substring filter on the enclosing class
    pub class_name: Option<String>,
    /// Substring filter on the enclosing package
    pub package_name: Option<String>,
    /// Shell glob on the root-relative file path
    pub file_path_glob: Option<String>,
    /// Maximum results to return
    pub limit: usize,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            kinds: None,
            class_name: None,
            package_name: None,
            file_path_glob: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchRequest {
    /// Create a request that matches everything up to the default limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a simple text search request
    pub fn query(query: impl Into<String>) -> Self {
        Self::default().with_query(query)
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = SymbolKind>,
    {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    pub fn with_file_path_glob(mut self, glob: impl Into<String>) -> Self {
        self.file_path_glob = Some(glob.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_kind_round_trips_through_symbolic_name() {
        for kind in SymbolKind::ALL {
            assert_eq!(kind.as_str().parse::<SymbolKind>().unwrap(), kind);
        }
        assert_eq!("method".parse::<SymbolKind>().unwrap(), SymbolKind::Method);
        assert!("FUNCTION".parse::<SymbolKind>().is_err());
    }

    #[test]
    fn test_symbol_equality_is_full_field_equality() {
        let a = Symbol::new("run", SymbolKind::Method, "src/a.rs", 3).with_class_name("Task");
        let b = Symbol::new("run", SymbolKind::Method, "src/a.rs", 3).with_class_name("Task");
        let c = Symbol::new("run", SymbolKind::Method, "src/a.rs", 4).with_class_name("Task");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Symbol> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_accessors() {
        let symbol = Symbol::new("N", SymbolKind::Class, "F", 1)
            .with_signature("S")
            .with_reference_to("R");
        assert_eq!(symbol.name(), "N");
        assert_eq!(symbol.kind(), SymbolKind::Class);
        assert_eq!(symbol.file_path(), "F");
        assert_eq!(symbol.line(), 1);
        assert_eq!(symbol.signature(), Some("S"));
        assert_eq!(symbol.reference_to(), Some("R"));
        assert_eq!(symbol.class_name(), None);
        assert_eq!(symbol.display_name(), "N");
    }

    #[test]
    fn test_validate() {
        assert!(Symbol::new("a", SymbolKind::Field, "x.py", 1).validate().is_ok());
        assert!(Symbol::new("a", SymbolKind::Field, "x.py", UNKNOWN_LINE)
            .validate()
            .is_ok());
        assert_eq!(
            Symbol::new(" ", SymbolKind::Field, "x.py", 1).validate(),
            Err(InvalidSymbol::EmptyName)
        );
        assert_eq!(
            Symbol::new("a", SymbolKind::Field, "", 1).validate(),
            Err(InvalidSymbol::EmptyFilePath)
        );
        assert_eq!(
            Symbol::new("a", SymbolKind::Field, "x.py", 0).validate(),
            Err(InvalidSymbol::InvalidLine(0))
        );
        assert!(matches!(
            Symbol::new("a", SymbolKind::Field, "/tmp/x.py", 1).validate(),
            Err(InvalidSymbol::AbsoluteFilePath(_))
        ));
        assert!(matches!(
            Symbol::new("a", SymbolKind::Field, "C:\\src\\x.py", 1).validate(),
            Err(InvalidSymbol::AbsoluteFilePath(_))
        ));
        assert!(matches!(
            Symbol::new("a", SymbolKind::Field, "../../etc/secret.x", 1).validate(),
            Err(InvalidSymbol::ParentDirFilePath(_))
        ));
        assert!(matches!(
            Symbol::new("a", SymbolKind::Field, "src\\..\\..\\x.py", 1).validate(),
            Err(InvalidSymbol::ParentDirFilePath(_))
        ));
        // Dots inside a name are not a parent segment
        assert!(Symbol::new("a", SymbolKind::Field, "pkg/..hidden/x..py", 1)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_search_request_defaults() {
        let request = SearchRequest::new();
        assert_eq!(request.limit, DEFAULT_SEARCH_LIMIT);
        assert!(request.query.is_none());

        let request = SearchRequest::query("Foo")
            .with_kinds([SymbolKind::Method, SymbolKind::Class])
            .with_limit(10);
        assert_eq!(request.query.as_deref(), Some("Foo"));
        assert_eq!(request.limit, 10);
        let kinds: Vec<_> = request.kinds.unwrap().into_iter().collect();
        assert_eq!(kinds, vec![SymbolKind::Class, SymbolKind::Method]);
    }

    #[test]
    fn test_kind_serializes_as_symbolic_name() {
        let json = serde_json::to_string(&SymbolKind::Reference).unwrap();
        assert_eq!(json, "\"REFERENCE\"");
    }
}
