//! Flat path-to-file listing of a revision

use git2::{FileMode, Index, IndexEntry, ObjectType, Oid, TreeWalkMode, TreeWalkResult};
use serde::Serialize;

use crate::error::{RepoError, Result};
use crate::path::{EntryKind, RepoPath};

const STAGE_SHIFT: u16 = 12;
const STAGE_MASK: u16 = 0x3;

/// Whether a raw git file mode is an executable blob
pub(crate) fn is_executable(mode: u32) -> bool {
    mode == u32::from(FileMode::BlobExecutable)
}

/// Stage-0 index entries with their paths
///
/// Conflict stages and non-UTF-8 paths are skipped.
pub(crate) fn staged_entries(index: &Index) -> impl Iterator<Item = (RepoPath, IndexEntry)> + '_ {
    index
        .iter()
        .filter(|e| (e.flags >> STAGE_SHIFT) & STAGE_MASK == 0)
        .filter_map(|e| {
            let path = std::str::from_utf8(&e.path).ok()?;
            Some((RepoPath::from_normalized(path), e))
        })
}

/// File metadata for one tracked path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Full path from the repository root
    pub path: RepoPath,
    /// Content-addressed blob reference
    #[serde(serialize_with = "serialize_oid")]
    pub blob: Oid,
    /// Content size in bytes
    pub size: u64,
    /// Executable bit
    pub executable: bool,
}

fn serialize_oid<S: serde::Serializer>(oid: &Oid, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(oid)
}

/// All tracked files of a revision, sorted by path bytes
///
/// Sorting keeps every directory's descendants contiguous, so prefix ranges
/// can be found by binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build from arbitrary entries (sorted here)
    pub fn from_entries(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by(|a, b| a.path.as_str().as_bytes().cmp(b.path.as_str().as_bytes()));
        entries.dedup_by(|a, b| a.path == b.path);
        Self { entries }
    }

    /// List every blob reachable from `tree`
    pub(crate) fn from_tree(repo: &git2::Repository, tree: &git2::Tree<'_>) -> Result<Self> {
        let odb = repo.odb()?;
        let mut entries = Vec::new();
        let mut failure: Option<git2::Error> = None;

        let walked = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                // subtrees are descended into, submodule links are skipped
                return TreeWalkResult::Ok;
            }
            let Some(name) = entry.name() else {
                return TreeWalkResult::Ok;
            };
            let size = match odb.read_header(entry.id()) {
                Ok((size, _)) => size as u64,
                Err(e) => {
                    failure = Some(e);
                    return TreeWalkResult::Abort;
                }
            };
            entries.push(ManifestEntry {
                path: RepoPath::from_normalized(format!("{}{}", dir, name)),
                blob: entry.id(),
                size,
                executable: u32::try_from(entry.filemode()).is_ok_and(is_executable),
            });
            TreeWalkResult::Ok
        });

        if let Some(e) = failure {
            return Err(RepoError::storage(e).with_context("reading blob header"));
        }
        walked?;

        Ok(Self::from_entries(entries))
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in path order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Entry for exactly `path`, if it is a tracked file
    pub fn get(&self, path: &RepoPath) -> Option<&ManifestEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().as_bytes().cmp(path.as_str().as_bytes()))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// The contiguous run of entries lying below directory `dir`
    pub fn range_under(&self, dir: &RepoPath) -> &[ManifestEntry] {
        if dir.is_root() {
            return &self.entries;
        }
        let prefix = dir.dir_prefix();
        let start = self
            .entries
            .partition_point(|e| e.path.as_str().as_bytes() < prefix.as_bytes());
        let len = self.entries[start..]
            .iter()
            .take_while(|e| e.path.as_str().starts_with(&prefix))
            .count();
        &self.entries[start..start + len]
    }

    /// What `path` is in this manifest: a file, a directory holding files, or nothing
    ///
    /// The root is always a directory.
    pub fn kind_of(&self, path: &RepoPath) -> Option<EntryKind> {
        if path.is_root() {
            Some(EntryKind::Directory)
        } else if self.get(path).is_some() {
            Some(EntryKind::File)
        } else if !self.range_under(path).is_empty() {
            Some(EntryKind::Directory)
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(path: &str, size: u64) -> ManifestEntry {
        ManifestEntry {
            path: RepoPath::from_normalized(path),
            blob: Oid::zero(),
            size,
            executable: false,
        }
    }

    pub(crate) fn sample() -> Manifest {
        Manifest::from_entries(vec![
            entry("x", 1),
            entry("nested/deep/file", 2),
            entry("a.txt", 3),
            entry("a/b", 4),
            entry("a/c", 5),
            entry("ab", 6),
        ])
    }

    #[test]
    fn test_executable_mode() {
        assert!(is_executable(0o100755));
        assert!(!is_executable(0o100644));
        assert!(!is_executable(0o120000));
    }

    #[test]
    fn test_staged_entries_of_index() {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/c"), "c").unwrap();
        std::fs::write(dir.path().join("b"), "b").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("b")).unwrap();
        index.add_path(std::path::Path::new("a/c")).unwrap();

        let staged: Vec<_> = staged_entries(&index)
            .map(|(path, e)| (path.as_str().to_string(), e.file_size))
            .collect();
        assert_eq!(staged, vec![("a/c".to_string(), 1), ("b".to_string(), 1)]);
    }

    #[test]
    fn test_sorted_and_lookup() {
        let m = sample();
        let paths: Vec<_> = m.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "a/b", "a/c", "ab", "nested/deep/file", "x"]);
        assert_eq!(m.get(&RepoPath::from_normalized("a/c")).unwrap().size, 5);
        assert!(m.get(&RepoPath::from_normalized("a")).is_none());
    }

    #[test]
    fn test_range_under_respects_segment_boundary() {
        let m = sample();
        let under: Vec<_> = m
            .range_under(&RepoPath::from_normalized("a"))
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(under, vec!["a/b", "a/c"]);
        assert!(m.range_under(&RepoPath::from_normalized("missing")).is_empty());
        assert_eq!(m.range_under(&RepoPath::root()).len(), 6);
    }

    #[test]
    fn test_kind_of() {
        let m = sample();
        assert_eq!(m.kind_of(&RepoPath::root()), Some(EntryKind::Directory));
        assert_eq!(m.kind_of(&RepoPath::from_normalized("nested/deep")), Some(EntryKind::Directory));
        assert_eq!(m.kind_of(&RepoPath::from_normalized("x")), Some(EntryKind::File));
        assert_eq!(m.kind_of(&RepoPath::from_normalized("nested/de")), None);
    }
}
