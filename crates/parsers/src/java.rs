//! Java symbol extraction

use codeindex_core::{FileCrawler, ParseError, Symbol, SymbolKind, SymbolParser};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tree_sitter::Node;

use crate::source::{line_of, named_children, SourceFile};

/// Superclass chains longer than this are treated as cyclic
const MAX_SUPER_DEPTH: usize = 16;

/// Extracts types, members, local variables, method calls and variable
/// uses from `.java` files. The package comes from the `package`
/// declaration.
///
/// `setup` indexes the type declarations under the source root and every
/// classpath directory, so a call into another file resolves to
/// `package.Type.method`. Jar entries are skipped.
#[derive(Debug, Default)]
pub struct JavaParser {
    types: TypeIndex,
}

impl JavaParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of types known from the last `setup`
    pub fn indexed_types(&self) -> usize {
        self.types.types.len()
    }
}

impl SymbolParser for JavaParser {
    fn name(&self) -> &str {
        "java"
    }

    fn supported_extensions(&self) -> &[&'static str] {
        &["java"]
    }

    fn setup(&mut self, source_root: &Path, classpath: &[PathBuf]) -> Result<(), ParseError> {
        self.types = TypeIndex::default();
        let extensions = BTreeSet::from(["java".to_string()]);
        let crawler = FileCrawler::new();

        for root in std::iter::once(source_root).chain(classpath.iter().map(PathBuf::as_path)) {
            if !root.is_dir() {
                debug!("Skipping classpath entry {} (not a source directory)", root.display());
                continue;
            }
            let files = match crawler.crawl(root, &extensions) {
                Ok(files) => files,
                Err(err) => {
                    warn!("Cannot scan classpath entry {}: {}", root.display(), err);
                    continue;
                }
            };
            for file in files {
                let indexed = SourceFile::load(&file, root).and_then(|source| {
                    let tree = source.parse(tree_sitter_java::language())?;
                    self.types.add_file(tree.root_node(), &source);
                    Ok(())
                });
                if let Err(err) = indexed {
                    debug!("Not indexing types of {}: {}", file.display(), err);
                }
            }
        }

        info!("Java type index holds {} types", self.types.types.len());
        Ok(())
    }

    fn parse(&self, path: &Path, source_root: &Path) -> Result<Vec<Symbol>, ParseError> {
        let source = SourceFile::load(path, source_root)?;
        let tree = source.parse(tree_sitter_java::language())?;
        let root = tree.root_node();

        let mut local = TypeIndex::default();
        let imports = local.add_file(root, &source);

        let mut extractor = Extractor {
            source: &source,
            imports: &imports,
            resolver: Resolver {
                local: &local,
                global: &self.types,
            },
            symbols: Vec::new(),
        };
        extractor.visit(root, &mut Scope::default());

        debug!("{}: {} symbols", source.relative, extractor.symbols.len());
        Ok(extractor.symbols)
    }
}

fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, name),
        None => name.to_string(),
    }
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

/// Members of a type body; enum bodies keep theirs one level down.
fn body_members(body: Node) -> Vec<Node> {
    let mut members = Vec::new();
    for child in named_children(body) {
        if child.kind() == "enum_body_declarations" {
            members.extend(named_children(child));
        } else {
            members.push(child);
        }
    }
    members
}

fn declarators(node: Node) -> Vec<Node> {
    named_children(node)
        .into_iter()
        .filter(|child| child.kind() == "variable_declarator")
        .collect()
}

/// `(name, type)` of a formal parameter
fn parameter<'s>(param: Node, source: &'s SourceFile) -> Option<(&'s str, &'s str)> {
    if param.kind() != "formal_parameter" {
        return None;
    }
    let name = param.child_by_field_name("name")?;
    let written = param.child_by_field_name("type")?;
    Some((source.text_of(name), source.text_of(written)))
}

/// Whitespace collapsed to single spaces, trailing `;` dropped
fn collapse(text: &str) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    joined.trim_end_matches(';').trim_end().to_string()
}

/// Declaration text up to its body, without annotations.
fn header(node: Node, source: &SourceFile) -> String {
    let mut start = node.start_byte();
    if let Some(modifiers) = named_children(node)
        .into_iter()
        .find(|child| child.kind() == "modifiers")
    {
        start = (0..modifiers.child_count())
            .filter_map(|i| modifiers.child(i))
            .find(|child| !matches!(child.kind(), "marker_annotation" | "annotation"))
            .map(|child| child.start_byte())
            .unwrap_or_else(|| modifiers.end_byte());
    }
    let end = node
        .child_by_field_name("body")
        .map(|body| body.start_byte())
        .unwrap_or_else(|| node.end_byte());
    collapse(&source.text[start..end.max(start)])
}

/// Identifiers that name something being declared, a label or a member
/// selected from another expression.
fn is_declared_name(node: Node, parent: Node) -> bool {
    match parent.kind() {
        "lambda_expression" | "inferred_parameters" | "labeled_statement"
        | "break_statement" | "continue_statement" | "method_reference" => true,
        "field_access" => parent.child_by_field_name("field").map(|n| n.id()) == Some(node.id()),
        _ => parent.child_by_field_name("name").map(|n| n.id()) == Some(node.id()),
    }
}

/// Name resolution context of one file
#[derive(Debug, Clone, Default)]
struct Imports {
    package: Option<String>,
    /// `import a.b.C;` as `C -> a.b.C`
    single: HashMap<String, String>,
    /// `import a.b.*;` as `a.b`
    wildcard: Vec<String>,
    /// Types declared in the file, simple name to qualified
    declared: HashMap<String, String>,
}

impl Imports {
    fn collect(root: Node, source: &SourceFile) -> Imports {
        let mut imports = Imports::default();
        for child in named_children(root) {
            match child.kind() {
                "package_declaration" => {
                    imports.package = named_children(child)
                        .into_iter()
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                        .map(|n| source.text_of(n).to_string());
                }
                "import_declaration" => imports.add_import(source.text_of(child)),
                _ => {}
            }
        }
        imports
    }

    fn add_import(&mut self, text: &str) {
        let mut words = text.trim().trim_end_matches(';').split_whitespace();
        if words.next() != Some("import") {
            return;
        }
        let words: Vec<_> = words.collect();
        // Static member imports never name a type
        if words.first() == Some(&"static") {
            return;
        }
        let path = words.concat();
        if let Some(package) = path.strip_suffix(".*") {
            self.wildcard.push(package.to_string());
        } else if let Some((_, simple)) = path.rsplit_once('.') {
            self.single.insert(simple.to_string(), path.clone());
        }
    }
}

#[derive(Debug, Clone)]
struct TypeInfo {
    methods: HashSet<String>,
    /// Field name to its type as written
    fields: HashMap<String, String>,
    superclass: Option<String>,
    /// Context of the declaring file, for the written type names above
    imports: Imports,
}

/// Declared types keyed by qualified name
#[derive(Debug, Default)]
struct TypeIndex {
    types: HashMap<String, TypeInfo>,
}

struct Declared {
    qualified: String,
    simple: String,
    methods: HashSet<String>,
    fields: HashMap<String, String>,
    superclass: Option<String>,
}

impl TypeIndex {
    /// Index every type declared in the file and return its imports.
    fn add_file(&mut self, root: Node, source: &SourceFile) -> Imports {
        let mut imports = Imports::collect(root, source);
        let mut declared = Vec::new();
        collect_types(named_children(root), source, imports.package.as_deref(), &mut declared);

        for decl in &declared {
            imports
                .declared
                .entry(decl.simple.clone())
                .or_insert_with(|| decl.qualified.clone());
        }
        for decl in declared {
            self.types.insert(
                decl.qualified,
                TypeInfo {
                    methods: decl.methods,
                    fields: decl.fields,
                    superclass: decl.superclass,
                    imports: imports.clone(),
                },
            );
        }
        imports
    }
}

fn collect_types(
    members: Vec<Node>,
    source: &SourceFile,
    outer: Option<&str>,
    out: &mut Vec<Declared>,
) {
    for node in members {
        if !is_type_declaration(node.kind()) {
            continue;
        }
        let Some(name) = node.child_by_field_name("name") else {
            continue;
        };
        let simple = source.text_of(name).to_string();
        let qualified = qualify(outer, &simple);
        let mut decl = Declared {
            qualified: qualified.clone(),
            simple,
            methods: HashSet::new(),
            fields: HashMap::new(),
            superclass: node
                .child_by_field_name("superclass")
                .and_then(|superclass| named_children(superclass).into_iter().next())
                .map(|written| source.text_of(written).to_string()),
        };

        // Record components are fields with accessor methods
        if let Some(params) = node
            .child_by_field_name("parameters")
            .filter(|_| node.kind() == "record_declaration")
        {
            for (name, written) in named_children(params)
                .into_iter()
                .filter_map(|param| parameter(param, source))
            {
                decl.fields.insert(name.to_string(), written.to_string());
                decl.methods.insert(name.to_string());
            }
        }

        let members = node.child_by_field_name("body").map(body_members).unwrap_or_default();
        for member in &members {
            match member.kind() {
                "method_declaration" => {
                    if let Some(name) = member.child_by_field_name("name") {
                        decl.methods.insert(source.text_of(name).to_string());
                    }
                }
                "field_declaration" | "constant_declaration" => {
                    let written = member
                        .child_by_field_name("type")
                        .map(|t| source.text_of(t))
                        .unwrap_or_default();
                    for declarator in declarators(*member) {
                        if let Some(name) = declarator.child_by_field_name("name") {
                            decl.fields
                                .insert(source.text_of(name).to_string(), written.to_string());
                        }
                    }
                }
                "enum_constant" => {
                    if let Some(name) = member.child_by_field_name("name") {
                        decl.fields
                            .insert(source.text_of(name).to_string(), decl.simple.clone());
                    }
                }
                _ => {}
            }
        }

        out.push(decl);
        collect_types(members, source, Some(&qualified), out);
    }
}

/// Lookups across the current file and the setup index.
struct Resolver<'a> {
    local: &'a TypeIndex,
    global: &'a TypeIndex,
}

impl Resolver<'_> {
    fn get(&self, qualified: &str) -> Option<&TypeInfo> {
        self.local
            .types
            .get(qualified)
            .or_else(|| self.global.types.get(qualified))
    }

    fn knows(&self, qualified: &str) -> bool {
        self.get(qualified).is_some()
    }

    /// Qualified name of a type as written in a file with `imports`.
    fn resolve_type(&self, written: &str, imports: &Imports) -> Option<String> {
        let written = written.split('<').next()?.trim();
        if written.is_empty() || written.ends_with(']') {
            return None;
        }
        let (head, rest) = match written.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (written, None),
        };

        let base = imports
            .declared
            .get(head)
            .cloned()
            .or_else(|| imports.single.get(head).cloned())
            .or_else(|| {
                let candidate = qualify(imports.package.as_deref(), head);
                self.knows(&candidate).then_some(candidate)
            })
            .or_else(|| {
                imports
                    .wildcard
                    .iter()
                    .map(|package| qualify(Some(package), head))
                    .find(|candidate| self.knows(candidate))
            });

        match (base, rest) {
            (Some(base), Some(rest)) => Some(qualify(Some(&base), rest)),
            (Some(base), None) => Some(base),
            (None, _) => self.knows(written).then(|| written.to_string()),
        }
    }

    fn superclass(&self, qualified: &str) -> Option<String> {
        let info = self.get(qualified)?;
        self.resolve_type(info.superclass.as_deref()?, &info.imports)
    }

    /// `owner.name` for the class declaring method `name`, searching up the
    /// superclass chain.
    fn find_method(&self, owner: &str, name: &str) -> Option<String> {
        let mut current = owner.to_string();
        for _ in 0..MAX_SUPER_DEPTH {
            if self.get(&current)?.methods.contains(name) {
                return Some(qualify(Some(&current), name));
            }
            current = self.superclass(&current)?;
        }
        None
    }

    /// Declaring class of field `name`, with its info
    fn find_field(&self, owner: &str, name: &str) -> Option<(String, &TypeInfo)> {
        let mut current = owner.to_string();
        for _ in 0..MAX_SUPER_DEPTH {
            let info = self.get(&current)?;
            if info.fields.contains_key(name) {
                return Some((current, info));
            }
            current = self.superclass(&current)?;
        }
        None
    }

    fn field_type(&self, owner: &str, name: &str) -> Option<String> {
        let (_, info) = self.find_field(owner, name)?;
        self.resolve_type(info.fields.get(name)?, &info.imports)
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    /// Innermost enclosing type as `(simple, qualified)`
    class: Option<(String, String)>,
    /// Parameters and local variables to their written type
    locals: HashMap<String, String>,
}

impl Scope {
    fn class_name(&self) -> Option<&str> {
        self.class.as_ref().map(|(simple, _)| simple.as_str())
    }

    fn qualified(&self) -> Option<&str> {
        self.class.as_ref().map(|(_, qualified)| qualified.as_str())
    }
}

struct Extractor<'a> {
    source: &'a SourceFile,
    imports: &'a Imports,
    resolver: Resolver<'a>,
    symbols: Vec<Symbol>,
}

impl Extractor<'_> {
    fn visit(&mut self, node: Node, scope: &mut Scope) {
        let source = self.source;
        match node.kind() {
            "package_declaration" | "import_declaration" => {}
            kind if is_type_declaration(kind) => self.visit_type(node, scope),
            "method_declaration" | "constructor_declaration" => self.visit_method(node, scope),
            "field_declaration" | "constant_declaration" => self.visit_field(node, scope),
            "enum_constant" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let symbol = self.symbol(
                        node,
                        source.text_of(name),
                        SymbolKind::Field,
                        scope.class_name(),
                        collapse(source.text_of(name)),
                    );
                    self.symbols.push(symbol);
                }
                for child in named_children(node) {
                    self.visit(child, scope);
                }
            }
            "local_variable_declaration" => {
                let written = node
                    .child_by_field_name("type")
                    .map(|t| source.text_of(t))
                    .unwrap_or_default();
                for declarator in declarators(node) {
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    let name = source.text_of(name);
                    let symbol = self.symbol(
                        declarator,
                        name,
                        SymbolKind::Variable,
                        scope.class_name(),
                        format!("{} {}", written, name),
                    );
                    self.symbols.push(symbol);
                    scope.locals.insert(name.to_string(), written.to_string());
                    if let Some(value) = declarator.child_by_field_name("value") {
                        self.visit(value, scope);
                    }
                }
            }
            "enhanced_for_statement" | "resource" => {
                if let (Some(name), Some(written)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("type"),
                ) {
                    scope
                        .locals
                        .insert(source.text_of(name).to_string(), source.text_of(written).to_string());
                }
                for child in named_children(node) {
                    self.visit(child, scope);
                }
            }
            "catch_formal_parameter" => {
                let written = named_children(node)
                    .into_iter()
                    .find(|child| child.kind() == "catch_type");
                if let (Some(name), Some(written)) = (node.child_by_field_name("name"), written) {
                    scope
                        .locals
                        .insert(source.text_of(name).to_string(), source.text_of(written).to_string());
                }
            }
            "method_invocation" => {
                self.record_call(node, scope);
                for child in named_children(node) {
                    self.visit(child, scope);
                }
            }
            "identifier" => self.record_name(node, scope),
            _ => {
                for child in named_children(node) {
                    self.visit(child, scope);
                }
            }
        }
    }

    fn visit_type(&mut self, node: Node, scope: &Scope) {
        let source = self.source;
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let simple = source.text_of(name);
        let kind = match node.kind() {
            "interface_declaration" | "annotation_type_declaration" => SymbolKind::Interface,
            _ => SymbolKind::Class,
        };
        let symbol = self.symbol(node, simple, kind, scope.class_name(), header(node, source));
        self.symbols.push(symbol);

        let outer = scope.qualified().or(self.imports.package.as_deref());
        let qualified = qualify(outer, simple);
        let mut inner = Scope {
            class: Some((simple.to_string(), qualified)),
            locals: HashMap::new(),
        };

        if node.kind() == "record_declaration" {
            if let Some(params) = node.child_by_field_name("parameters") {
                for param in named_children(params) {
                    if let Some((name, written)) = parameter(param, source) {
                        let symbol = self.symbol(
                            param,
                            name,
                            SymbolKind::Field,
                            Some(simple),
                            format!("{} {}", written, name),
                        );
                        self.symbols.push(symbol);
                    }
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body, &mut inner);
        }
    }

    fn visit_method(&mut self, node: Node, scope: &Scope) {
        let source = self.source;
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let symbol = self.symbol(
            node,
            source.text_of(name),
            SymbolKind::Method,
            scope.class_name(),
            header(node, source),
        );
        self.symbols.push(symbol);

        let mut inner = Scope {
            class: scope.class.clone(),
            locals: HashMap::new(),
        };
        if let Some(params) = node.child_by_field_name("parameters") {
            for (name, written) in named_children(params)
                .into_iter()
                .filter_map(|param| parameter(param, source))
            {
                inner.locals.insert(name.to_string(), written.to_string());
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body, &mut inner);
        }
    }

    fn visit_field(&mut self, node: Node, scope: &mut Scope) {
        let source = self.source;
        let written = node
            .child_by_field_name("type")
            .map(|t| source.text_of(t))
            .unwrap_or_default();
        for declarator in declarators(node) {
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = source.text_of(name);
            let symbol = self.symbol(
                declarator,
                name,
                SymbolKind::Field,
                scope.class_name(),
                format!("{} {}", written, name),
            );
            self.symbols.push(symbol);
            if let Some(value) = declarator.child_by_field_name("value") {
                self.visit(value, scope);
            }
        }
    }

    fn record_call(&mut self, call: Node, scope: &Scope) {
        let source = self.source;
        let Some(name) = call.child_by_field_name("name") else {
            return;
        };
        let name = source.text_of(name);
        let owner = match call.child_by_field_name("object") {
            Some(object) => self.expr_type(object, scope),
            None => scope.qualified().map(str::to_string),
        };
        let target = owner.and_then(|owner| self.resolver.find_method(&owner, name));

        let mut symbol = self.symbol(
            call,
            name,
            SymbolKind::Reference,
            scope.class_name(),
            collapse(source.text_of(call)),
        );
        if let Some(target) = target {
            symbol = symbol.with_reference_to(target);
        }
        self.symbols.push(symbol);
    }

    /// A use of a local variable, parameter or field. Other identifiers
    /// (types, packages, unresolved names) are not recorded.
    fn record_name(&mut self, node: Node, scope: &Scope) {
        let Some(parent) = node.parent() else {
            return;
        };
        if is_declared_name(node, parent) {
            return;
        }
        let source = self.source;
        let name = source.text_of(node);
        let target = if scope.locals.contains_key(name) {
            Some(name.to_string())
        } else {
            scope
                .qualified()
                .and_then(|owner| self.resolver.find_field(owner, name))
                .map(|(declaring, _)| qualify(Some(&declaring), name))
        };
        let Some(target) = target else {
            return;
        };

        let symbol = self
            .symbol(node, name, SymbolKind::Reference, scope.class_name(), name.to_string())
            .with_reference_to(target);
        self.symbols.push(symbol);
    }

    /// Qualified type of an expression, as far as declarations tell.
    fn expr_type(&self, node: Node, scope: &Scope) -> Option<String> {
        let source = self.source;
        match node.kind() {
            "this" => scope.qualified().map(str::to_string),
            "super" => self.resolver.superclass(scope.qualified()?),
            "identifier" => {
                let name = source.text_of(node);
                if let Some(written) = scope.locals.get(name) {
                    return self.resolver.resolve_type(written, self.imports);
                }
                if let Some(owner) = scope.qualified() {
                    if let Some(found) = self.resolver.field_type(owner, name) {
                        return Some(found);
                    }
                }
                // Static call on a type
                self.resolver.resolve_type(name, self.imports)
            }
            "field_access" => {
                let owner = self.expr_type(node.child_by_field_name("object")?, scope)?;
                let field = source.text_of(node.child_by_field_name("field")?);
                self.resolver.field_type(&owner, field)
            }
            "object_creation_expression" | "cast_expression" => {
                let written = node.child_by_field_name("type")?;
                self.resolver.resolve_type(source.text_of(written), self.imports)
            }
            "parenthesized_expression" => self.expr_type(named_children(node).into_iter().next()?, scope),
            "scoped_identifier" | "type_identifier" => {
                self.resolver.resolve_type(source.text_of(node), self.imports)
            }
            _ => None,
        }
    }

    fn symbol(
        &self,
        node: Node,
        name: &str,
        kind: SymbolKind,
        class_name: Option<&str>,
        signature: String,
    ) -> Symbol {
        let mut symbol = Symbol::new(name, kind, &self.source.relative, line_of(node))
            .with_signature(signature);
        if let Some(class_name) = class_name {
            symbol = symbol.with_class_name(class_name);
        }
        if let Some(package) = &self.imports.package {
            symbol = symbol.with_package_name(package);
        }
        symbol
    }
}
