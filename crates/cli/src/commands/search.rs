use anyhow::{Context, Result};
use codeindex_core::{SearchRequest, Symbol, SymbolStore};
use std::io::IsTerminal;
use std::path::Path;

use super::utils::*;

pub fn handle_search(
    db_path: &Path,
    request: &SearchRequest,
    json: bool,
) -> Result<Vec<Symbol>> {
    ensure_index_exists(db_path)?;

    let store = SymbolStore::open(db_path)
        .with_context(|| format!("Failed to open index {}", db_path.display()))?;
    let results = store.search(request)?;
    store.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(results);
    }

    if results.is_empty() {
        print_error("No symbols found");
    } else {
        println!("Found {} matches:", results.len());
        // Plain lines when piped, so no escape codes end up in files
        let colored = std::io::stdout().is_terminal();
        for symbol in &results {
            let line = if colored {
                format_symbol_line_colored(symbol)
            } else {
                format_symbol_line(symbol)
            };
            println!("  {}", line);
        }
    }
    Ok(results)
}
