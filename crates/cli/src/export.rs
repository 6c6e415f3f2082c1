//! Markdown and XML export of a symbol index

use anyhow::{Context, Result};
use clap::ValueEnum;
use codeindex_core::{Symbol, SymbolKind, SymbolStore};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Markdown,
    Xml,
}

pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// Write every symbol of the index at `db_path` (restricted to `kinds`
    /// when non-empty) to `output`. Returns the number of symbols written.
    pub fn export(&self, db_path: &Path, output: &Path, kinds: &[SymbolKind]) -> Result<usize> {
        let store = SymbolStore::open(db_path)
            .with_context(|| format!("Failed to open index {}", db_path.display()))?;
        let symbols = store.get_all(kinds)?;
        store.close()?;

        std::fs::write(output, self.render(&symbols))
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Exported {} symbols to {}", symbols.len(), output.display());
        Ok(symbols.len())
    }

    pub fn render(&self, symbols: &[Symbol]) -> String {
        let files = group_by_file(symbols);
        match self.format {
            ExportFormat::Markdown => render_markdown(&files),
            ExportFormat::Xml => render_xml(&files),
        }
    }
}

struct FileGroup<'a> {
    path: &'a str,
    /// `None` holds the symbols with no enclosing class
    classes: Vec<(Option<&'a str>, Vec<&'a Symbol>)>,
}

/// Group by file, then by class, keeping first-seen order at both levels.
fn group_by_file(symbols: &[Symbol]) -> Vec<FileGroup<'_>> {
    let mut files: Vec<FileGroup<'_>> = Vec::new();
    let mut file_index: HashMap<&str, usize> = HashMap::new();

    for symbol in symbols {
        let idx = *file_index.entry(symbol.file_path()).or_insert_with(|| {
            files.push(FileGroup {
                path: symbol.file_path(),
                classes: Vec::new(),
            });
            files.len() - 1
        });

        let classes = &mut files[idx].classes;
        match classes.iter_mut().find(|(name, _)| *name == symbol.class_name()) {
            Some((_, members)) => members.push(symbol),
            None => classes.push((symbol.class_name(), vec![symbol])),
        }
    }
    files
}

fn render_markdown(files: &[FileGroup<'_>]) -> String {
    let mut out = String::from("# Project Symbol Index\n");
    for file in files {
        out.push_str(&format!("\n## File: {}\n", file.path));
        for (class_name, members) in &file.classes {
            if let Some(class_name) = class_name {
                out.push_str(&format!("\n### Class: {}\n", class_name));
            }
            out.push_str("\n| Kind | Name | Line | Signature |\n");
            out.push_str("|------|------|------|-----------|\n");
            for symbol in members {
                let signature = symbol
                    .signature()
                    .map(|s| format!("`{}`", escape_cell(s)))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    symbol.kind(),
                    escape_cell(symbol.name()),
                    symbol.line(),
                    signature
                ));
            }
        }
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn render_xml(files: &[FileGroup<'_>]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project>\n");
    for file in files {
        out.push_str(&format!("  <file path=\"{}\">\n", escape_xml(file.path)));
        for (class_name, members) in &file.classes {
            let indent = match class_name {
                Some(class_name) => {
                    out.push_str(&format!("    <class name=\"{}\">\n", escape_xml(class_name)));
                    "      "
                }
                None => "    ",
            };
            for symbol in members {
                out.push_str(&format!(
                    "{}<symbol kind=\"{}\" name=\"{}\" line=\"{}\"",
                    indent,
                    symbol.kind(),
                    escape_xml(symbol.name()),
                    symbol.line()
                ));
                if let Some(signature) = symbol.signature() {
                    out.push_str(&format!(" signature=\"{}\"", escape_xml(signature)));
                }
                out.push_str("/>\n");
            }
            if class_name.is_some() {
                out.push_str("    </class>\n");
            }
        }
        out.push_str("  </file>\n");
    }
    out.push_str("</project>\n");
    out
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
