//! Plain-file store
//!
//! Documents live under `<root>/data`, text exports under `<root>/exports`.
//! Document writes go to a temporary sibling first and are renamed into place.

use super::{Backend, BackendKind, Document};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// File-backed document store plus the export folder
pub struct FileStore {
    data_dir: PathBuf,
    export_dir: PathBuf,
}

impl FileStore {
    /// Create the store under `root`, creating both folders if needed
    pub fn new(root: &Path) -> Result<Self> {
        let data_dir = root.join("data");
        let export_dir = root.join("exports");
        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(&export_dir)?;
        log::info!("Data directory: {}", data_dir.display());
        Ok(Self {
            data_dir,
            export_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    fn document_path(&self, document: Document) -> PathBuf {
        self.data_dir.join(document.file_name())
    }

    /// Write `content` to `<prefix>_YYYYMMDD_HHMMSS.txt` in the export folder
    pub fn save_export_file(&self, content: &str, prefix: &str) -> Result<PathBuf> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.export_dir.join(format!("{}_{}.txt", prefix, timestamp));
        std::fs::write(&path, content)?;
        log::info!("Saved export file: {}", path.display());
        Ok(path)
    }

    /// Export files, sorted by name
    pub fn export_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.export_dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete one export by file name. Returns false if it did not exist.
    pub fn delete_export_file(&self, file_name: &str) -> Result<bool> {
        let path = self.export_dir.join(file_name);
        // Only plain names inside the export folder
        if path.parent() != Some(self.export_dir.as_path()) || !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        log::info!("Deleted export file: {}", path.display());
        Ok(true)
    }

    /// Delete every export. Returns how many files were removed.
    pub fn clear_exports(&self) -> Result<usize> {
        let files = self.export_files()?;
        for path in &files {
            std::fs::remove_file(path)?;
        }
        log::info!("Cleared {} export file(s)", files.len());
        Ok(files.len())
    }
}

impl Backend for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn read(&self, document: Document) -> Result<Option<String>> {
        let path = self.document_path(document);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, document: Document, content: &str) -> Result<()> {
        let path = self.document_path(document);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        log::debug!("Saved data file: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_creates_data_and_export_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        assert!(store.data_dir().is_dir());
        assert!(store.export_dir().is_dir());
    }

    #[test]
    fn read_missing_document_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.read(Document::Categories).unwrap(), None);
    }

    #[test]
    fn write_then_read_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        store.write(Document::Entries, "[]").unwrap();
        assert_eq!(store.read(Document::Entries).unwrap().as_deref(), Some("[]"));
        assert!(store.data_dir().join("entries.json").is_file());
        // Temporary file is renamed away
        assert!(!store.data_dir().join("entries.json.tmp").exists());
    }

    #[test]
    fn export_files_can_be_listed_and_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();

        let path = store.save_export_file("A x2\n", "barcodes").unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("barcodes_"));
        assert!(name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A x2\n");

        assert_eq!(store.export_files().unwrap(), vec![path]);
        assert!(store.delete_export_file(&name).unwrap());
        assert!(!store.delete_export_file(&name).unwrap());
        assert!(store.export_files().unwrap().is_empty());
    }

    #[test]
    fn delete_export_refuses_paths_outside_export_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        store.write(Document::Entries, "[]").unwrap();

        assert!(!store.delete_export_file("../data/entries.json").unwrap());
        assert!(store.data_dir().join("entries.json").exists());
    }

    #[test]
    fn clear_exports_removes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        store.save_export_file("one", "a").unwrap();
        store.save_export_file("two", "b").unwrap();

        assert_eq!(store.clear_exports().unwrap(), 2);
        assert!(store.export_files().unwrap().is_empty());
    }
}
