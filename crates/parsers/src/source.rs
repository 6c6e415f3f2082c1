use codeindex_core::ParseError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tree_sitter::{Language, Node, Parser, Tree};

/// A source file loaded for parsing, with its root-relative path.
pub(crate) struct SourceFile {
    pub path: PathBuf,
    pub relative: String,
    pub text: String,
}

impl SourceFile {
    pub fn load(path: &Path, source_root: &Path) -> Result<Self, ParseError> {
        let text = fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            relative: relative_path(path, source_root)?,
            text,
        })
    }

    /// Parse with a fresh parser. A tree containing error or missing nodes
    /// fails the file.
    pub fn parse(&self, language: Language) -> Result<Tree, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|err| ParseError::Language(err.to_string()))?;
        let tree = parser
            .parse(&self.text, None)
            .ok_or_else(|| ParseError::Language(format!("no tree for {}", self.path.display())))?;

        if tree.root_node().has_error() {
            return Err(ParseError::Syntax {
                path: self.path.clone(),
                line: first_error_line(tree.root_node()),
            });
        }
        Ok(tree)
    }

    pub fn text_of(&self, node: Node) -> &str {
        &self.text[node.byte_range()]
    }

    /// First line of the node text, trimmed, without the trailing block opener.
    pub fn signature(&self, node: Node, opener: char) -> String {
        let first = self.text_of(node).lines().next().unwrap_or_default().trim();
        first
            .strip_suffix(opener)
            .map(str::trim_end)
            .unwrap_or(first)
            .to_string()
    }
}

pub(crate) fn line_of(node: Node) -> i64 {
    node.start_position().row as i64 + 1
}

/// Named children in source order
pub(crate) fn named_children(node: Node) -> Vec<Node> {
    (0..node.named_child_count())
        .filter_map(|i| node.named_child(i))
        .collect()
}

fn relative_path(path: &Path, source_root: &Path) -> Result<String, ParseError> {
    let relative = pathdiff::diff_paths(path, source_root).unwrap_or_else(|| path.to_path_buf());
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ParseError::Path {
            path: path.to_path_buf(),
            root: source_root.to_path_buf(),
        });
    }
    Ok(relative.to_string_lossy().replace('\\', "/"))
}

fn first_error_line(root: Node) -> usize {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return node.start_position().row + 1;
        }
        if node.has_error() {
            // Reversed so the leftmost child is visited first
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }
    root.start_position().row + 1
}
