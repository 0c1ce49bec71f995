//! Content-addressed filesystem values
//!
//! [`File`] and [`Directory`] are immutable values identified by a digest of
//! their content. Mutating operations return new values; two values with
//! identical content have identical digests.

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors raised when loading or exporting filesystem values
#[derive(Error, Debug)]
pub enum FsError {
    /// Host filesystem access failed
    #[error("IO error at '{path}': {source}")]
    Io {
        /// Path involved in the failure.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The requested entry does not exist in the directory
    #[error("No entry at '{path}' in directory")]
    NotFound {
        /// The missing path.
        path: String,
    },
}

/// An immutable named byte blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// File name (no directory components)
    pub name: String,
    /// File content
    #[serde(with = "serde_bytes_base64")]
    pub contents: Vec<u8>,
    /// Optional permission bits (e.g. 0o600)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

impl File {
    /// Creates a file from a name and content
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            mode: None,
        }
    }

    /// Sets permission bits
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Reads a file from the host filesystem
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] when the path cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FsError> {
        let path = path.as_ref();
        let contents = std::fs::read(path).map_err(|source| FsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            contents,
            mode: None,
        })
    }

    /// Content as UTF-8, lossily decoded
    pub fn contents_utf8(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }

    /// Content digest over name, mode, and bytes
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.mode.unwrap_or(0).to_be_bytes());
        hasher.update(&self.contents);
        hex_digest(&hasher.finalize())
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({}, {} bytes)", self.name, self.contents.len())
    }
}

/// An immutable tree of files, keyed by relative path
///
/// Entries are kept sorted so that the digest is canonical: two directories
/// with identical content have identical digests regardless of insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    entries: BTreeMap<String, File>,
}

impl Directory {
    /// Creates an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new directory with the file added at the relative path
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, file: File) -> Self {
        self.entries.insert(normalize_rel(&path.into()), file);
        self
    }

    /// Returns a new directory with all entries of `other` added under `prefix`
    #[must_use]
    pub fn with_directory(mut self, prefix: impl Into<String>, other: &Directory) -> Self {
        let prefix = normalize_rel(&prefix.into());
        for (path, file) in &other.entries {
            let key = if prefix.is_empty() {
                path.clone()
            } else {
                format!("{prefix}/{path}")
            };
            self.entries.insert(key, file.clone());
        }
        self
    }

    /// Returns a new directory without the entry at the relative path
    #[must_use]
    pub fn without(mut self, path: &str) -> Self {
        self.entries.remove(&normalize_rel(path));
        self
    }

    /// Looks up a file by relative path
    pub fn file(&self, path: &str) -> Option<&File> {
        self.entries.get(&normalize_rel(path))
    }

    /// Returns the subtree rooted at the relative path
    pub fn subdirectory(&self, path: &str) -> Directory {
        let prefix = format!("{}/", normalize_rel(path));
        let mut out = Directory::new();
        for (entry_path, file) in &self.entries {
            if let Some(rest) = entry_path.strip_prefix(&prefix) {
                out.entries.insert(rest.to_string(), file.clone());
            }
        }
        out
    }

    /// Iterates over (relative path, file) pairs in sorted order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &File)> {
        self.entries.iter().map(|(p, f)| (p.as_str(), f))
    }

    /// Returns the sorted relative paths
    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of files in the tree
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the tree holds no files
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recursively loads a directory from the host filesystem
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] when the tree cannot be walked or read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = path.as_ref();
        let mut dir = Directory::new();
        load_into(&mut dir, root, root)?;
        Ok(dir)
    }

    /// Writes the tree under the given host directory
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] when a file or directory cannot be created.
    pub fn export(&self, dest: impl AsRef<Path>) -> Result<(), FsError> {
        let dest = dest.as_ref();
        for (rel, file) in &self.entries {
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|source| FsError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
            std::fs::write(&target, &file.contents).map_err(|source| FsError::Io {
                path: target.display().to_string(),
                source,
            })?;
            #[cfg(unix)]
            if let Some(mode) = file.mode {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode)).map_err(
                    |source| FsError::Io {
                        path: target.display().to_string(),
                        source,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Canonical content digest over the sorted entry list
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, file) in &self.entries {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(file.digest().as_bytes());
            hasher.update([0u8]);
        }
        hex_digest(&hasher.finalize())
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Directory({} files)", self.entries.len())
    }
}

fn load_into(dir: &mut Directory, root: &Path, current: &Path) -> Result<(), FsError> {
    let read = std::fs::read_dir(current).map_err(|source| FsError::Io {
        path: current.display().to_string(),
        source,
    })?;
    for entry in read {
        let entry = entry.map_err(|source| FsError::Io {
            path: current.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            load_into(dir, root, &path)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let file = File::load(&path)?;
            dir.entries.insert(normalize_rel(&rel), file);
        }
    }
    Ok(())
}

fn normalize_rel(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

mod serde_bytes_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
