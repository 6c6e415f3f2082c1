//! Python symbol extraction

use codeindex_core::{ParseError, Symbol, SymbolKind, SymbolParser};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

use crate::source::{line_of, named_children, SourceFile};

/// Extracts classes, functions, assignments and call sites from `.py` files.
///
/// The package of every symbol is the dotted module path of its file.
#[derive(Debug, Default)]
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolParser for PythonParser {
    fn name(&self) -> &str {
        "python"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &["py"]
    }

    fn parse(&self, path: &Path, source_root: &Path) -> Result<Vec<Symbol>, ParseError> {
        let source = SourceFile::load(path, source_root)?;
        let tree = source.parse(tree_sitter_python::language())?;
        let root = tree.root_node();

        let mut definitions = Definitions::default();
        definitions.collect(root, &source, None, false);

        let mut extractor = Extractor {
            package: module_path(&source.relative),
            source: &source,
            definitions,
            symbols: Vec::new(),
        };
        extractor.visit(root, &Scope::default());

        debug!("{}: {} symbols", source.relative, extractor.symbols.len());
        Ok(extractor.symbols)
    }
}

/// `pkg/util.py` -> `pkg.util`, `pkg/__init__.py` -> `pkg`
fn module_path(relative: &str) -> Option<String> {
    let stem = match relative.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("py") && !stem.is_empty() => stem,
        _ => relative,
    };
    let mut parts: Vec<&str> = stem
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if parts.last() == Some(&"__init__") {
        parts.pop();
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

/// Names defined in the file, used to resolve call targets.
#[derive(Default)]
struct Definitions {
    functions: HashSet<String>,
    classes: HashMap<String, HashSet<String>>,
}

impl Definitions {
    fn collect(&mut self, node: Node, source: &SourceFile, class: Option<&str>, in_function: bool) {
        match node.kind() {
            "class_definition" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let name = source.text_of(name);
                self.classes.entry(name.to_string()).or_default();
                if let Some(body) = node.child_by_field_name("body") {
                    self.collect(body, source, Some(name), false);
                }
            }
            "function_definition" => {
                if !in_function {
                    if let Some(name) = node.child_by_field_name("name") {
                        let name = source.text_of(name).to_string();
                        match class {
                            Some(class) => {
                                self.classes.entry(class.to_string()).or_default().insert(name);
                            }
                            None => {
                                self.functions.insert(name);
                            }
                        }
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.collect(body, source, class, true);
                }
            }
            _ => {
                for child in named_children(node) {
                    self.collect(child, source, class, in_function);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    class_name: Option<String>,
    in_function: bool,
}

struct Extractor<'a> {
    package: Option<String>,
    source: &'a SourceFile,
    definitions: Definitions,
    symbols: Vec<Symbol>,
}

impl Extractor<'_> {
    fn visit(&mut self, node: Node, scope: &Scope) {
        match node.kind() {
            "class_definition" => self.visit_class(node, scope),
            "function_definition" => self.visit_function(node, scope),
            "assignment" => self.visit_assignment(node, scope),
            "call" => {
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

    fn visit_class(&mut self, node: Node, scope: &Scope) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.source.text_of(name).to_string();
        self.push(node, &name, SymbolKind::Class, scope.class_name.as_deref());

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Scope {
                class_name: Some(name),
                in_function: false,
            };
            self.visit(body, &inner);
        }
    }

    fn visit_function(&mut self, node: Node, scope: &Scope) {
        if let Some(name) = node.child_by_field_name("name") {
            let name = self.source.text_of(name).to_string();
            self.push(node, &name, SymbolKind::Method, scope.class_name.as_deref());
        }

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Scope {
                class_name: scope.class_name.clone(),
                in_function: true,
            };
            self.visit(body, &inner);
        }
    }

    fn visit_assignment(&mut self, node: Node, scope: &Scope) {
        if let Some(left) = node.child_by_field_name("left") {
            self.record_target(node, left, scope);
        }
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right, scope);
        }
    }

    fn record_target(&mut self, assignment: Node, target: Node, scope: &Scope) {
        match target.kind() {
            "identifier" => {
                let kind = if scope.class_name.is_some() && !scope.in_function {
                    SymbolKind::Field
                } else {
                    SymbolKind::Variable
                };
                let name = self.source.text_of(target).to_string();
                self.push(assignment, &name, kind, scope.class_name.as_deref());
            }
            "attribute" if scope.in_function && scope.class_name.is_some() => {
                let is_self = target
                    .child_by_field_name("object")
                    .map(|object| self.source.text_of(object) == "self")
                    .unwrap_or(false);
                if let (true, Some(attribute)) = (is_self, target.child_by_field_name("attribute")) {
                    let name = self.source.text_of(attribute).to_string();
                    self.push(assignment, &name, SymbolKind::Field, scope.class_name.as_deref());
                }
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                for child in named_children(target) {
                    self.record_target(assignment, child, scope);
                }
            }
            _ => {}
        }
    }

    fn record_call(&mut self, call: Node, scope: &Scope) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };

        let (name, target) = match function.kind() {
            "identifier" => {
                let name = self.source.text_of(function);
                let defined = self.definitions.functions.contains(name)
                    || self.definitions.classes.contains_key(name);
                (name.to_string(), defined.then(|| self.qualify(name)))
            }
            "attribute" => {
                let Some(attribute) = function.child_by_field_name("attribute") else {
                    return;
                };
                let name = self.source.text_of(attribute);
                let owner = function
                    .child_by_field_name("object")
                    .filter(|object| object.kind() == "identifier")
                    .map(|object| self.source.text_of(object));
                let class = match owner {
                    Some("self") => scope.class_name.as_deref(),
                    Some(other) => Some(other),
                    None => None,
                };
                let target = class
                    .filter(|class| self.has_method(class, name))
                    .map(|class| self.qualify(&format!("{}.{}", class, name)));
                (name.to_string(), target)
            }
            _ => return,
        };

        let mut symbol = Symbol::new(name, SymbolKind::Reference, &self.source.relative, line_of(call))
            .with_signature(self.source.signature(call, ':'));
        if let Some(class_name) = &scope.class_name {
            symbol = symbol.with_class_name(class_name);
        }
        if let Some(package) = &self.package {
            symbol = symbol.with_package_name(package);
        }
        if let Some(target) = target {
            symbol = symbol.with_reference_to(target);
        }
        self.symbols.push(symbol);
    }

    fn has_method(&self, class: &str, method: &str) -> bool {
        self.definitions
            .classes
            .get(class)
            .map(|methods| methods.contains(method))
            .unwrap_or(false)
    }

    fn qualify(&self, name: &str) -> String {
        match &self.package {
            Some(package) => format!("{}.{}", package, name),
            None => name.to_string(),
        }
    }

    fn push(&mut self, node: Node, name: &str, kind: SymbolKind, class_name: Option<&str>) {
        let mut symbol = Symbol::new(name, kind, &self.source.relative, line_of(node))
            .with_signature(self.source.signature(node, ':'));
        if let Some(class_name) = class_name {
            symbol = symbol.with_class_name(class_name);
        }
        if let Some(package) = &self.package {
            symbol = symbol.with_package_name(package);
        }
        self.symbols.push(symbol);
    }
}
