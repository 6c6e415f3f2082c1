use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::CrawlError;

/// Walks a project tree and yields the source files a parser can handle.
///
/// Traversal is sorted by file name so two crawls of the same tree return
/// the same order. Unreadable entries are logged and skipped.
#[derive(Debug, Clone, Default)]
pub struct FileCrawler {
    follow_links: bool,
}

impl FileCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Every regular file under `root` whose extension (without the dot,
    /// case-insensitive) is in `extensions`.
    pub fn crawl(
        &self,
        root: &Path,
        extensions: &BTreeSet<String>,
    ) -> Result<Vec<PathBuf>, CrawlError> {
        if !root.is_dir() {
            return Err(CrawlError::InvalidRoot(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(CrawlError::Walk {
                        root: root.to_path_buf(),
                        source: err,
                    });
                }
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if has_extension(entry.path(), extensions) {
                files.push(entry.into_path());
            }
        }

        debug!("Crawled {} files under {}", files.len(), root.display());
        Ok(files)
    }
}

fn has_extension(path: &Path, extensions: &BTreeSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
