use anyhow::Result;
use codeindex_core::SymbolKind;
use std::path::Path;

use super::utils::*;
use crate::export::{ExportFormat, Exporter};

pub fn handle_export(
    db_path: &Path,
    output: &Path,
    format: ExportFormat,
    kinds: &[SymbolKind],
) -> Result<usize> {
    ensure_index_exists(db_path)?;

    print_info(&format!("Exporting to {}...", output.display()), "📤");
    let written = Exporter::new(format).export(db_path, output, kinds)?;
    print_success(&format!("Exported {} symbols", written));
    Ok(written)
}
