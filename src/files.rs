use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A host-side temp file referenced from rich text, addressed by the
/// reference id embedded in the canonical markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub file_name: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, file_name }
    }
}

/// In-memory index of local temp files for one create/update call.
///
/// The transcoder takes files out of the index as it stages them for upload;
/// whatever remains afterwards was referenced by markup the tracker already
/// hosts, or not referenced at all.
#[derive(Debug, Default)]
pub struct LocalFileStore {
    files: HashMap<String, LocalFile>,
}

impl LocalFileStore {
    pub fn new(files: HashMap<String, LocalFile>) -> Self {
        Self { files }
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.files.contains_key(file_id)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Removes and returns the file for `file_id`; the caller owns the
    /// staged file from here on.
    pub fn take(&mut self, file_id: &str) -> Option<LocalFile> {
        self.files.remove(file_id)
    }

    /// Renames the file on disk to `new_name` (same directory) and removes
    /// it from the index, returning the staged file.
    pub fn stage_as(&mut self, file_id: &str, new_name: &str) -> Result<LocalFile> {
        let file = self
            .take(file_id)
            .ok_or_else(|| Error::Translation(format!("no local file for reference {file_id}")))?;
        let target = file
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(new_name);
        std::fs::rename(&file.path, &target).map_err(|e| {
            Error::Translation(format!(
                "failed to stage {} as {new_name}: {e}",
                file.path.display()
            ))
        })?;
        Ok(LocalFile {
            path: target,
            file_name: new_name.to_string(),
        })
    }

    /// Files still in the index after transcoding.
    pub fn into_remaining(self) -> HashMap<String, LocalFile> {
        self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn stage_renames_on_disk_and_removes_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload-1.tmp");
        fs::write(&source, b"png-bytes").unwrap();

        let mut store = LocalFileStore::new(HashMap::from([(
            "f1".to_string(),
            LocalFile::new(&source),
        )]));
        let staged = store.stage_as("f1", "image-f1.jpg").unwrap();

        assert_eq!(staged.file_name, "image-f1.jpg");
        assert!(staged.path.exists());
        assert!(!source.exists());
        assert!(!store.contains("f1"));
    }

    #[test]
    fn staging_unknown_reference_is_a_translation_error() {
        let mut store = LocalFileStore::default();
        let err = store.stage_as("missing", "image-x.jpg").unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }
}
