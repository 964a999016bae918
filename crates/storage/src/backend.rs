//! Durable storage of the whole store as one JSON document.
//!
//! Saves never touch the target in place: the document is written to a
//! sibling `<name>.tmp`, flushed to disk and renamed over the target, so a
//! reader only ever sees the previous or the next complete document.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, warn};

use crate::{error::StoreError, snapshot::Snapshot};

pub trait SnapshotBackend {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("store"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn ensure_parent_dir_exists(&self) -> Result<(), StoreError> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(parent).map_err(|source| StoreError::io("create directory", parent, source))
    }
}

impl SnapshotBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::io("read", &self.path, source)),
        };
        decode(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let bytes = encode(snapshot)?;
        self.ensure_parent_dir_exists()?;

        let temp_path = self.temp_path();
        let mut file =
            File::create(&temp_path).map_err(|source| StoreError::io("create", &temp_path, source))?;
        let written = file.write_all(&bytes).and_then(|()| file.sync_all());
        drop(file);
        if let Err(source) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(path = %temp_path.display(), error = %cleanup, "could not remove temporary file");
            }
            return Err(StoreError::io("write", &temp_path, source));
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|source| StoreError::io("replace", &self.path, source))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "store file replaced");
        Ok(())
    }
}

/// Four-space indented JSON. Users are written in sorted order, so equal
/// snapshots always produce identical bytes.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    snapshot
        .serialize(&mut serializer)
        .map_err(StoreError::Encode)?;
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot, serde_json::Error> {
    serde_json::from_slice(bytes)
}
