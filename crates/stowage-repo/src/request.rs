//! Request-driven structure lookup
//!
//! Combines a storage location with request parameters (revision and
//! subpath) into a [`StructureNode`] for rendering, or the raw bytes of the
//! requested file.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RepoError, RepoErrorKind, Result};
use crate::node::{FileNode, ManifestNode, StructureNode};
use crate::path::{RepoPath, normalize_segments};
use crate::repo::Repository;
use crate::revision::RevisionContext;
use crate::storage::StorageBackend;
use crate::structure::Structure;

/// Parameters of a structure request
///
/// Deserializes from request parameters named `rev` and `request_subpath`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[builder(start_fn = new)]
pub struct StructureRequest {
    /// Revision spec; latest when absent
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Path segments below the root; empty for the root
    #[builder(default)]
    #[serde(default, rename = "request_subpath")]
    pub subpath: Vec<String>,
}

impl StructureRequest {
    /// Parse loosely typed request parameters
    ///
    /// Shape errors (a number for `rev`, a non-list subpath) are
    /// `TypeMismatch`.
    pub fn from_params(params: &Value) -> Result<Self> {
        StructureRequest::deserialize(params).map_err(|e| {
            RepoError::new(RepoErrorKind::TypeMismatch, Some(Box::new(e)))
                .with_context("request parameters")
        })
    }
}

/// A store opened at the revision a request asks for
#[derive(Debug)]
pub struct RequestStructure {
    repo: Repository,
    request: StructureRequest,
}

impl RequestStructure {
    /// Open the store named by `storage`, pinned to the requested revision
    ///
    /// Fails with `RepoNotFound` if the location is not a store. The revision
    /// itself is resolved on first use.
    pub fn new<S>(storage: &S, request: StructureRequest) -> Result<Self>
    where
        S: StorageBackend + ?Sized,
    {
        let repo = Repository::open(storage.get_path(), request.rev.as_deref())?;
        Ok(Self { repo, request })
    }

    /// The opened store
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The request this adapter answers
    pub fn request(&self) -> &StructureRequest {
        &self.request
    }

    /// Node for the requested path: a file node on an exact file match,
    /// otherwise a directory listing
    ///
    /// Fails with `RevisionNotFound` for an unknown revision and
    /// `PathInvalid` if nothing lives at the subpath.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), fields(rev = ?self.request.rev)))]
    pub fn structure(&self) -> Result<StructureNode> {
        let (ctx, path) = self.target()?;
        let manifest = self.repo.manifest_of(&ctx)?;

        if let Some(entry) = manifest.get(&path) {
            return Ok(StructureNode::File(FileNode::new(&ctx, entry.clone())));
        }
        let structure = Structure::at(manifest, path)?;
        Ok(StructureNode::Manifest(ManifestNode::new(&ctx, structure)))
    }

    /// Raw content of the requested file
    ///
    /// Fails with `PathInvalid` if the subpath is not a tracked file.
    pub fn rawfile(&self) -> Result<Bytes> {
        let (ctx, path) = self.target()?;
        self.repo.read_at(&ctx, &path)
    }

    fn target(&self) -> Result<(RevisionContext, RepoPath)> {
        let path = normalize_segments(&self.request.subpath)?;
        Ok((self.repo.context()?, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_from_params() {
        let req = StructureRequest::from_params(&json!({
            "rev": "tip",
            "request_subpath": ["nested", "deep"],
        }))
        .unwrap();
        assert_eq!(req.rev.as_deref(), Some("tip"));
        assert_eq!(req.subpath, vec!["nested", "deep"]);

        let req = StructureRequest::from_params(&json!({})).unwrap();
        assert_eq!(req, StructureRequest::default());

        let err = StructureRequest::from_params(&json!({"request_subpath": "x"})).unwrap_err();
        assert_eq!(*err.kind(), RepoErrorKind::TypeMismatch);
    }

    #[test]
    fn test_request_builder() {
        let req = StructureRequest::new()
            .rev("c7888f70e7ee")
            .subpath(vec!["file1".to_string()])
            .build();
        assert_eq!(req.rev.as_deref(), Some("c7888f70e7ee"));
        assert_eq!(req.subpath, vec!["file1"]);

        assert!(StructureRequest::new().build().subpath.is_empty());
    }

    #[test]
    fn test_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let err = RequestStructure::new(dir.path(), StructureRequest::default()).unwrap_err();
        assert_eq!(*err.kind(), RepoErrorKind::RepoNotFound);
    }
}
