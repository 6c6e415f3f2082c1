//! Rust symbol extraction

use codeindex_core::{ParseError, Symbol, SymbolKind, SymbolParser};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

use crate::source::{line_of, named_children, SourceFile};

const PATH_SEPARATOR: &str = "::";

/// Extracts types, traits, functions, `let` bindings and call sites from
/// `.rs` files. Methods are scoped to their `impl` type or trait.
#[derive(Debug, Default)]
pub struct RustParser;

impl RustParser {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolParser for RustParser {
    fn name(&self) -> &str {
        "rust"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn parse(&self, path: &Path, source_root: &Path) -> Result<Vec<Symbol>, ParseError> {
        let source = SourceFile::load(path, source_root)?;
        let tree = source.parse(tree_sitter_rust::language())?;
        let root = tree.root_node();

        let scope = Scope {
            module: module_path(&source.relative),
            owner: None,
        };

        let mut definitions = Definitions::default();
        definitions.collect(root, &source, &scope);

        let mut extractor = Extractor {
            source: &source,
            definitions,
            symbols: Vec::new(),
        };
        extractor.visit(root, &scope);

        debug!("{}: {} symbols", source.relative, extractor.symbols.len());
        Ok(extractor.symbols)
    }
}

/// Module path of a file inside its crate: `src/storage/mod.rs` ->
/// `storage`, `src/lib.rs` -> crate root (`None`).
fn module_path(relative: &str) -> Option<String> {
    let stem = match relative.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("rs") && !stem.is_empty() => stem,
        _ => relative,
    };
    let mut parts: Vec<&str> = stem
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if parts.first() == Some(&"src") {
        parts.remove(0);
    }
    match parts.last() {
        Some(&"mod") => {
            parts.pop();
        }
        Some(&"lib") | Some(&"main") if parts.len() == 1 => {
            parts.pop();
        }
        _ => {}
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(PATH_SEPARATOR))
    }
}

fn join(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}{}", prefix, PATH_SEPARATOR, name),
        None => name.to_string(),
    }
}

/// Type name of an `impl` target, without generics or path.
fn type_name(node: Node, source: &SourceFile) -> String {
    let inner = match node.kind() {
        "generic_type" | "reference_type" => node.child_by_field_name("type"),
        "scoped_type_identifier" => node.child_by_field_name("name"),
        _ => None,
    };
    match inner {
        Some(inner) => type_name(inner, source),
        None => source.text_of(node).to_string(),
    }
}

#[derive(Debug, Clone)]
struct Scope {
    module: Option<String>,
    /// Enclosing `impl` type or trait
    owner: Option<String>,
}

impl Scope {
    fn enter_module(&self, name: &str) -> Scope {
        Scope {
            module: Some(join(self.module.as_deref(), name)),
            owner: None,
        }
    }

    fn with_owner(&self, owner: String) -> Scope {
        Scope {
            module: self.module.clone(),
            owner: Some(owner),
        }
    }
}

/// Functions and methods defined in the file, keyed by full path.
#[derive(Default)]
struct Definitions {
    functions: HashSet<String>,
    methods: HashMap<String, HashSet<String>>,
}

impl Definitions {
    fn collect(&mut self, node: Node, source: &SourceFile, scope: &Scope) {
        match node.kind() {
            "mod_item" => {
                if let (Some(name), Some(body)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("body"),
                ) {
                    let inner = scope.enter_module(source.text_of(name));
                    self.collect(body, source, &inner);
                }
            }
            "impl_item" | "trait_item" => {
                let target = if node.kind() == "impl_item" { "type" } else { "name" };
                if let (Some(target), Some(body)) = (
                    node.child_by_field_name(target),
                    node.child_by_field_name("body"),
                ) {
                    let inner = scope.with_owner(type_name(target, source));
                    self.collect(body, source, &inner);
                }
            }
            "function_item" | "function_signature_item" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let name = source.text_of(name).to_string();
                match &scope.owner {
                    Some(owner) => {
                        let key = join(scope.module.as_deref(), owner);
                        self.methods.entry(key).or_default().insert(name);
                    }
                    None => {
                        self.functions.insert(join(scope.module.as_deref(), &name));
                    }
                }
            }
            _ => {
                for child in named_children(node) {
                    self.collect(child, source, scope);
                }
            }
        }
    }

    fn method(&self, module: Option<&str>, owner: &str, name: &str) -> Option<String> {
        let key = join(module, owner);
        self.methods
            .get(&key)
            .filter(|methods| methods.contains(name))
            .map(|_| join(Some(key.as_str()), name))
    }

    fn function(&self, module: Option<&str>, name: &str) -> Option<String> {
        let key = join(module, name);
        self.functions.contains(&key).then_some(key)
    }
}

struct Extractor<'a> {
    source: &'a SourceFile,
    definitions: Definitions,
    symbols: Vec<Symbol>,
}

impl Extractor<'_> {
    fn visit(&mut self, node: Node, scope: &Scope) {
        let source = self.source;
        match node.kind() {
            "mod_item" => {
                if let (Some(name), Some(body)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("body"),
                ) {
                    let inner = scope.enter_module(source.text_of(name));
                    self.visit(body, &inner);
                }
            }
            "struct_item" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let name = source.text_of(name);
                self.push(node, name, SymbolKind::Class, None, scope);
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_fields(body, name, scope);
                }
            }
            "enum_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.push(node, source.text_of(name), SymbolKind::Class, None, scope);
                }
            }
            "trait_item" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let name = source.text_of(name);
                self.push(node, name, SymbolKind::Interface, None, scope);
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, &scope.with_owner(name.to_string()));
                }
            }
            "impl_item" => {
                if let (Some(target), Some(body)) = (
                    node.child_by_field_name("type"),
                    node.child_by_field_name("body"),
                ) {
                    self.visit(body, &scope.with_owner(type_name(target, source)));
                }
            }
            "function_item" | "function_signature_item" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let owner = scope.owner.as_deref();
                    self.push(node, source.text_of(name), SymbolKind::Method, owner, scope);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body, scope);
                }
            }
            "let_declaration" => {
                if let Some(pattern) = node
                    .child_by_field_name("pattern")
                    .filter(|pattern| pattern.kind() == "identifier")
                {
                    let owner = scope.owner.as_deref();
                    self.push(node, source.text_of(pattern), SymbolKind::Variable, owner, scope);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value, scope);
                }
            }
            "call_expression" => {
                self.record_call(node, scope);
                for child in named_children(node) {
                    self.visit(child, scope);
                }
            }
            _ => {
                for child in named_children(node) {
                    self.visit(child, scope);
                }
            }
        }
    }

    fn visit_fields(&mut self, body: Node, owner: &str, scope: &Scope) {
        let source = self.source;
        for field in named_children(body) {
            if field.kind() != "field_declaration" {
                continue;
            }
            if let Some(name) = field.child_by_field_name("name") {
                self.push(field, source.text_of(name), SymbolKind::Field, Some(owner), scope);
            }
        }
    }

    fn record_call(&mut self, call: Node, scope: &Scope) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let Some((name, target)) = self.resolve(function, scope) else {
            return;
        };

        let mut symbol = Symbol::new(
            name,
            SymbolKind::Reference,
            &self.source.relative,
            line_of(call),
        )
        .with_signature(self.source.signature(call, '{'));
        if let Some(owner) = &scope.owner {
            symbol = symbol.with_class_name(owner);
        }
        if let Some(module) = &scope.module {
            symbol = symbol.with_package_name(module);
        }
        if let Some(target) = target {
            symbol = symbol.with_reference_to(target);
        }
        self.symbols.push(symbol);
    }

    /// Callee name and, when it is defined in this file, its full path.
    fn resolve(&self, function: Node, scope: &Scope) -> Option<(String, Option<String>)> {
        let module = scope.module.as_deref();
        match function.kind() {
            "identifier" => {
                let name = self.source.text_of(function);
                Some((name.to_string(), self.definitions.function(module, name)))
            }
            "scoped_identifier" => {
                let name = self.source.text_of(function.child_by_field_name("name")?);
                let target = function.child_by_field_name("path").and_then(|path| {
                    let path = self.source.text_of(path);
                    let owner = match path {
                        "Self" => scope.owner.as_deref()?,
                        other => other,
                    };
                    let nested = join(module, owner);
                    self.definitions
                        .method(module, owner, name)
                        .or_else(|| self.definitions.function(Some(nested.as_str()), name))
                });
                Some((name.to_string(), target))
            }
            "field_expression" => {
                let name = self.source.text_of(function.child_by_field_name("field")?);
                let on_self = function
                    .child_by_field_name("value")
                    .map(|value| self.source.text_of(value) == "self")
                    .unwrap_or(false);
                let target = scope
                    .owner
                    .as_deref()
                    .filter(|_| on_self)
                    .and_then(|owner| self.definitions.method(module, owner, name));
                Some((name.to_string(), target))
            }
            "generic_function" => self.resolve(function.child_by_field_name("function")?, scope),
            _ => None,
        }
    }

    fn push(
        &mut self,
        node: Node,
        name: &str,
        kind: SymbolKind,
        class_name: Option<&str>,
        scope: &Scope,
    ) {
        let mut symbol = Symbol::new(name, kind, &self.source.relative, line_of(node))
            .with_signature(self.source.signature(node, '{'));
        if let Some(class_name) = class_name {
            symbol = symbol.with_class_name(class_name);
        }
        if let Some(module) = &scope.module {
            symbol = symbol.with_package_name(module);
        }
        self.symbols.push(symbol);
    }
}
