#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway project tree plus a separate directory for the index.
pub struct TestProject {
    root: TempDir,
    db_dir: TempDir,
}

impl TestProject {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            root: TempDir::new()?,
            db_dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir.path().join("index.db")
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> anyhow::Result<PathBuf> {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }
}

pub const PYTHON_SERVICE: &str = r#"class UserService:
    def __init__(self, repo):
        self.repo = repo

    def find(self, user_id):
        return self.repo.get(user_id)

    def find_all(self):
        return [self.find(i) for i in range(10)]


def create_service():
    return UserService(None)
"#;

pub const RUST_STORE: &str = r#"pub struct Store {
    items: Vec<String>,
}

impl Store {
    pub fn new() -> Self {
        Store { items: Vec::new() }
    }

    pub fn add(&mut self, item: String) {
        self.items.push(item);
    }
}

pub fn default_store() -> Store {
    Store::new()
}
"#;
