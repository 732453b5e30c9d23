//! Read-modify-atomic-write JSON documents.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::LedgerError;

/// Outcome of an update closure: whether the document must be rewritten
#[derive(Debug)]
pub enum Change<R> {
    /// Persist the modified document, then return the value
    Write(R),

    /// Leave the file untouched
    Keep(R),
}

/// A JSON document on disk holding a value of type `T`
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    lock_path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        Self {
            path,
            lock_path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and parse the document. Missing or unparsable is an error.
    pub fn read(&self) -> Result<T, LedgerError> {
        if !self.path.exists() {
            return Err(LedgerError::Missing(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Write `empty` if the document does not exist yet.
    /// Returns true when a new document was created.
    pub fn create_if_missing(&self, empty: &T) -> Result<bool, LedgerError> {
        let _lock = self.lock()?;
        if self.path.exists() {
            return Ok(false);
        }

        self.write_atomic(empty)?;
        Ok(true)
    }

    /// Read, modify and (optionally) persist the document under an
    /// exclusive lock.
    pub fn update<R, F>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&mut T) -> Change<R>,
    {
        let _lock = self.lock()?;
        let mut doc = self.read()?;

        match f(&mut doc) {
            Change::Write(value) => {
                self.write_atomic(&doc)?;
                Ok(value)
            }
            Change::Keep(value) => Ok(value),
        }
    }

    /// Acquire the sidecar lock; released when the returned file drops
    fn lock(&self) -> Result<File, LedgerError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;

        file.lock_exclusive().map_err(|source| LedgerError::Lock {
            path: self.lock_path.clone(),
            source,
        })?;

        Ok(file)
    }

    /// Serialize into a temp file next to the document, then rename it over
    /// the document. A crash before the rename leaves the old document.
    fn write_atomic(&self, doc: &T) -> Result<(), LedgerError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.serialize(&mut ser)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| LedgerError::Io(e.error))?;

        tracing::debug!("Ledger document written: {}", self.path.display());
        Ok(())
    }
}
