use anyhow::{Context, Result};
use codeindex_core::{CodeIndexer, IndexPhase, IndexReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::utils::*;

pub fn handle_index(
    project_root: &Path,
    db_path: &Path,
    classpath: &[PathBuf],
    fresh: bool,
    show_progress: bool,
) -> Result<IndexReport> {
    let start = Instant::now();

    if fresh {
        print_info("Rebuilding index from scratch...", "🔄");
        remove_index(db_path)?;
    } else {
        print_info("Indexing project...", "📇");
    }

    let mut indexer = CodeIndexer::new(db_path, codeindex_parsers::default_registry());

    let result = if show_progress {
        let progress_bar = ProgressBar::new(0);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        let report = indexer.index_with_progress(project_root, classpath, |progress| {
            if progress.phase == IndexPhase::Complete {
                progress_bar.finish_and_clear();
                return;
            }
            progress_bar.set_length(progress.files_total as u64);
            progress_bar.set_position(progress.files_processed as u64);
            if let Some(file) = &progress.current_file {
                progress_bar.set_message(file.display().to_string());
            }
        });
        progress_bar.finish_and_clear();
        report
    } else {
        indexer.index_with_classpath(project_root, classpath)
    };
    let report =
        result.with_context(|| format!("Failed to index {}", project_root.display()))?;

    for failure in &report.failures {
        print_warning(&format!("Skipped {}: {}", failure.path.display(), failure.reason));
    }

    print_success(&format!(
        "Indexed {} symbols from {} files in {:.2}s ({} failed)",
        report.symbols_saved,
        report.files_indexed,
        start.elapsed().as_secs_f64(),
        report.files_failed
    ));

    Ok(report)
}

/// Delete the database together with its WAL side files.
fn remove_index(db_path: &Path) -> Result<()> {
    let mut paths = vec![db_path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        paths.push(PathBuf::from(side));
    }
    for path in paths {
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}
