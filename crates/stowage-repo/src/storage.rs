//! Storage location capability

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::repo::Repository;
use crate::sandbox::Sandbox;

/// Anything that can name the filesystem location of a store
///
/// This is the only thing the request adapter needs from its host object.
/// Implementations might be:
/// - a bare path ([`Path`], [`PathBuf`])
/// - a plain value ([`Storage`])
/// - an already open handle ([`Repository`], [`Sandbox`])
/// - a content object of the host application (user-provided)
///
/// # Example
///
/// ```rust,ignore
/// use stowage_repo::{RequestStructure, Storage, StructureRequest};
///
/// let storage = Storage::new("/srv/models/workspace");
/// let request = StructureRequest::new().rev("tip").build();
/// let node = RequestStructure::new(&storage, request)?.structure()?;
/// ```
pub trait StorageBackend {
    /// Filesystem location of the store
    fn get_path(&self) -> &Path;
}

impl StorageBackend for Path {
    fn get_path(&self) -> &Path {
        self
    }
}

impl StorageBackend for PathBuf {
    fn get_path(&self) -> &Path {
        self
    }
}

impl StorageBackend for Repository {
    fn get_path(&self) -> &Path {
        self.location()
    }
}

impl StorageBackend for Sandbox {
    fn get_path(&self) -> &Path {
        self.repository().location()
    }
}

impl<T: StorageBackend + ?Sized> StorageBackend for &T {
    fn get_path(&self) -> &Path {
        (**self).get_path()
    }
}

/// Plain storage value holding a location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Storage at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageBackend for Storage {
    fn get_path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location<S: StorageBackend + ?Sized>(storage: &S) -> PathBuf {
        storage.get_path().to_path_buf()
    }

    #[test]
    fn test_get_path() {
        let storage = Storage::new("/srv/repo");
        assert_eq!(location(&storage), PathBuf::from("/srv/repo"));
        assert_eq!(location(Path::new("/srv/repo")), PathBuf::from("/srv/repo"));
        assert_eq!(location(&&storage), PathBuf::from("/srv/repo"));
    }
}
