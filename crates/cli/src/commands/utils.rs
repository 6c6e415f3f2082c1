use anyhow::{bail, Result};
use colored::Colorize;
use codeindex_core::Symbol;
use std::path::Path;

/// Print error message with emoji
pub fn print_error(message: &str) {
    println!("❌ {}", message);
}

/// Print success message with emoji
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print info message with emoji
pub fn print_info(message: &str, emoji: &str) {
    println!("{} {}", emoji, message);
}

/// Print warning message with emoji
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Refuse to query a path that holds no index; opening it would create one.
pub fn ensure_index_exists(db_path: &Path) -> Result<()> {
    if !db_path.is_file() {
        bail!(
            "No index at {} (run `codeindex index` first)",
            db_path.display()
        );
    }
    Ok(())
}

/// `[KIND] Class::name -> path:line (signature)`
pub fn format_symbol_line(symbol: &Symbol) -> String {
    let mut line = format!(
        "[{}] {} -> {}:{}",
        symbol.kind(),
        symbol.display_name(),
        symbol.file_path(),
        symbol.line()
    );
    if let Some(signature) = symbol.signature() {
        line.push_str(&format!(" ({})", signature));
    }
    line
}

/// Same as [`format_symbol_line`], coloured for a terminal
pub fn format_symbol_line_colored(symbol: &Symbol) -> String {
    let mut line = format!(
        "{} {} -> {}",
        format!("[{}]", symbol.kind()).cyan().bold(),
        symbol.display_name().bold(),
        format!("{}:{}", symbol.file_path(), symbol.line()).dimmed()
    );
    if let Some(signature) = symbol.signature() {
        line.push_str(&format!(" ({})", signature));
    }
    line
}
