//! Fallback table loaders, consulted only when the registry misses.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use super::Table;
use crate::error::Result;
use crate::ident::EXTERNAL_SIGIL;

pub trait TableLoader: Send + Sync {
    /// `Ok(None)` means "not mine"; the next loader is tried.
    fn load(&self, name: &str) -> Result<Option<Table>>;
}

impl<F> TableLoader for F
where
    F: Fn(&str) -> Result<Option<Table>> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<Option<Table>> { self(name) }
}

/// Resolves dotted identifiers to parquet files under a root directory:
/// `@db.schema.t` reads `<root>/db/schema/t.parquet`.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path { &self.root }

    /// File a table name maps to, or `None` for names that cannot be a path.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let name = name.strip_prefix(EXTERNAL_SIGIL).unwrap_or(name);
        let parts: Vec<&str> = name.split('.').collect();
        if parts.iter().any(|p| p.is_empty() || *p == ".." || p.contains('/') || p.contains('\\')) {
            return None;
        }
        let (last, dirs) = parts.split_last()?;
        let mut p = self.root.clone();
        for d in dirs {
            p.push(d);
        }
        p.push(format!("{}.parquet", last));
        Some(p)
    }
}

impl TableLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<Option<Table>> {
        let Some(path) = self.path_for(name) else { return Ok(None) };
        if !path.is_file() {
            return Ok(None);
        }
        debug!(target: "framequery::engine", "directory loader: {} -> {}", name, path.display());
        Ok(Some(Table::Frame(read_parquet(&path)?)))
    }
}

/// Read a whole parquet file into memory.
pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(PolarsError::from)?;
    Ok(ParquetReader::new(file).finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_names_map_to_nested_parquet_files() {
        let l = DirectoryLoader::new("/data");
        assert_eq!(l.path_for("@db.sch.t"), Some(PathBuf::from("/data/db/sch/t.parquet")));
        assert_eq!(l.path_for("t"), Some(PathBuf::from("/data/t.parquet")));
        assert_eq!(l.path_for("@a..b"), None);
        assert_eq!(l.path_for("a/b"), None);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let l = DirectoryLoader::new(tmp.path());
        assert!(l.load("@nothing.here").unwrap().is_none());
    }

    #[test]
    fn reads_parquet_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("db")).unwrap();
        let mut df = df!("a" => [1i64, 2, 3]).unwrap();
        let f = File::create(tmp.path().join("db").join("t.parquet")).unwrap();
        ParquetWriter::new(f).finish(&mut df).unwrap();
        let l = DirectoryLoader::new(tmp.path());
        let t = l.load("@db.t").unwrap().unwrap().into_frame().unwrap();
        assert_eq!(t.height(), 3);
    }

    #[test]
    fn closures_are_loaders() {
        let l = |name: &str| -> Result<Option<Table>> {
            Ok((name == "x").then(|| Table::Frame(DataFrame::empty())))
        };
        assert!(TableLoader::load(&l, "x").unwrap().is_some());
        assert!(TableLoader::load(&l, "y").unwrap().is_none());
    }
}
