//! Versioned workspace storage
//!
//! This crate wraps a version-controlled store (git, through libgit2) in the
//! small surface a model repository needs:
//!
//! - **Repository**: read-only access to revisions, manifests and file content
//! - **Sandbox**: a working copy that stages files, directories, renames and
//!   removals, and commits them
//! - **Structure**: one-level directory views over a flat manifest, built
//!   lazily from sorted ranges
//! - **Request adapter**: turns a storage location plus request parameters
//!   into a presentation node or raw file content
//!
//! Every path from the outside goes through [`path::normalize`] first; no
//! operation ever reads or writes outside the repository root.
//!
//! # Example
//!
//! ```rust,ignore
//! use stowage_repo::{RequestStructure, Sandbox, StructureRequest};
//!
//! let sandbox = Sandbox::create("/srv/workspace", true)?;
//! sandbox.add_file_content("nested/deep/dir/file", "deeply nested\n")?;
//! sandbox.commit("add a file", "Tester <test@example.com>")?;
//!
//! let request = StructureRequest::new()
//!     .subpath(vec!["nested".into(), "deep".into()])
//!     .build();
//! let node = RequestStructure::new(sandbox.workdir(), request)?.structure()?;
//! println!("{}", serde_json::to_string_pretty(&node)?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod error;
/// Flat per-revision file listings
pub mod manifest;
/// Presentation nodes
pub mod node;
pub mod path;
/// Read-only store access
pub mod repo;
pub mod request;
pub mod revision;
pub mod sandbox;
pub mod status;
pub mod storage;
pub mod structure;

pub use error::{RepoError, RepoErrorKind, Result};
pub use manifest::{Manifest, ManifestEntry};
pub use node::{FileNode, ManifestNode, ManifestNodes, StructureNode};
pub use path::{EntryKind, EntryLookup, PathArg, RepoPath, check_available, normalize};
pub use repo::Repository;
pub use request::{RequestStructure, StructureRequest};
pub use revision::{RevisionContext, RevisionId, RevisionSpec};
pub use sandbox::{Copied, RenameFailure, RenameOutcome, Sandbox};
pub use status::{FileState, Status};
pub use storage::{Storage, StorageBackend};
pub use structure::{DirEntry, FileEntry, Structure};
