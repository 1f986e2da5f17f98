//! One-level directory views over a flat manifest
//!
//! A [`Structure`] is the manifest seen from one directory: the files directly
//! inside it ([`Structure::fentries`]) and the subdirectories directly inside
//! it ([`Structure::dentries`]). Nothing is materialized up front; each call
//! returns a new iterator that computes basenames and paths as it goes.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{RepoError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::path::{RepoPath, SEPARATOR, normalize_segments};

/// Build the view of `manifest` at `subpath`
///
/// `subpath` is a list of segments; empty means the root. Fails with
/// `PathNotDir` if the subpath is a file and `PathInvalid` if nothing is
/// tracked below it.
pub fn build<S: AsRef<str>>(manifest: Arc<Manifest>, subpath: &[S]) -> Result<Structure> {
    let path = normalize_segments(subpath)?;
    Structure::at(manifest, path)
}

/// Files and subdirectories directly below one directory of a manifest
#[derive(Debug, Clone)]
pub struct Structure {
    manifest: Arc<Manifest>,
    path: RepoPath,
}

impl Structure {
    /// View of `manifest` at the already-normalized directory `path`
    pub fn at(manifest: Arc<Manifest>, path: RepoPath) -> Result<Self> {
        if !path.is_root() {
            if manifest.get(&path).is_some() {
                return Err(RepoError::path_not_dir(&path));
            }
            if manifest.range_under(&path).is_empty() {
                return Err(RepoError::path_invalid(
                    &path,
                    "no such directory at this revision",
                ));
            }
        }
        Ok(Self { manifest, path })
    }

    /// Root view; never fails, even for an empty manifest
    pub fn root(manifest: Arc<Manifest>) -> Self {
        Self {
            manifest,
            path: RepoPath::root(),
        }
    }

    /// Directory this view is for
    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    /// The manifest being viewed
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Files directly inside this directory
    ///
    /// Single pass: call again for a fresh iterator.
    pub fn fentries(&self) -> FileEntries<'_> {
        FileEntries {
            inner: self.manifest.range_under(&self.path).iter(),
            strip: self.strip_len(),
        }
    }

    /// Subdirectories directly inside this directory, each reported once
    ///
    /// Single pass: call again for a fresh iterator.
    pub fn dentries(&self) -> DirEntries<'_> {
        DirEntries {
            inner: self.manifest.range_under(&self.path).iter(),
            strip: self.strip_len(),
            dir: &self.path,
            last: None,
        }
    }

    /// Every tracked file below this directory, at any depth
    pub fn walk(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.manifest.range_under(&self.path).iter()
    }

    /// Whether the directory has no children
    pub fn is_empty(&self) -> bool {
        self.manifest.range_under(&self.path).is_empty()
    }

    fn strip_len(&self) -> usize {
        if self.path.is_root() {
            0
        } else {
            self.path.as_str().len() + 1
        }
    }
}

/// A file directly inside a [`Structure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileEntry<'a> {
    /// Last path segment
    pub basename: &'a str,
    /// Full path from the repository root
    pub path: &'a RepoPath,
    /// Content size in bytes
    pub size: u64,
    /// Executable bit
    pub executable: bool,
}

/// A subdirectory directly inside a [`Structure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry<'a> {
    /// Last path segment
    pub basename: &'a str,
    /// Full path from the repository root
    pub path: RepoPath,
}

/// Iterator over [`FileEntry`] values, see [`Structure::fentries`]
#[derive(Debug, Clone)]
pub struct FileEntries<'a> {
    inner: std::slice::Iter<'a, ManifestEntry>,
    strip: usize,
}

impl<'a> Iterator for FileEntries<'a> {
    type Item = FileEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.inner.by_ref() {
            let rest = &entry.path.as_str()[self.strip..];
            if !rest.contains(SEPARATOR) {
                return Some(FileEntry {
                    basename: rest,
                    path: &entry.path,
                    size: entry.size,
                    executable: entry.executable,
                });
            }
        }
        None
    }
}

/// Iterator over [`DirEntry`] values, see [`Structure::dentries`]
#[derive(Debug, Clone)]
pub struct DirEntries<'a> {
    inner: std::slice::Iter<'a, ManifestEntry>,
    strip: usize,
    dir: &'a RepoPath,
    last: Option<&'a str>,
}

impl<'a> Iterator for DirEntries<'a> {
    type Item = DirEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.inner.by_ref() {
            let rest = &entry.path.as_str()[self.strip..];
            let Some(idx) = rest.find(SEPARATOR) else {
                continue;
            };
            let name = &rest[..idx];
            // descendants of one subdirectory are contiguous in a sorted manifest
            if self.last == Some(name) {
                continue;
            }
            self.last = Some(name);
            return Some(DirEntry {
                basename: name,
                path: self.dir.join(name),
            });
        }
        None
    }
}
