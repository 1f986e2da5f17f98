//! Working-tree status of a sandbox
//!
//! Every path the engine reports lands in exactly one of seven partitions,
//! listed in this order everywhere: modified, added, removed, deleted,
//! unknown, ignored, clean.

use std::path::Path;
use std::sync::Arc;

use git2::{Status as Flags, StatusOptions};
use serde::Serialize;

use crate::error::Result;
use crate::manifest::{Manifest, ManifestEntry, is_executable, staged_entries};
use crate::node::{ManifestNode, ManifestNodes};
use crate::path::RepoPath;
use crate::revision::RevisionContext;
use crate::structure::Structure;

/// State of one path relative to the parent revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Tracked, content or mode changed
    Modified,
    /// Staged for addition
    Added,
    /// Staged for removal
    Removed,
    /// Tracked but missing from the working tree
    Deleted,
    /// Present on disk, not tracked
    Unknown,
    /// Matched by an ignore rule
    Ignored,
    /// Tracked and unchanged
    Clean,
}

impl FileState {
    /// All states in partition order
    pub const ALL: [FileState; 7] = [
        FileState::Modified,
        FileState::Added,
        FileState::Removed,
        FileState::Deleted,
        FileState::Unknown,
        FileState::Ignored,
        FileState::Clean,
    ];

    /// Lowercase name of the partition
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Modified => "modified",
            FileState::Added => "added",
            FileState::Removed => "removed",
            FileState::Deleted => "deleted",
            FileState::Unknown => "unknown",
            FileState::Ignored => "ignored",
            FileState::Clean => "clean",
        }
    }

    /// Map engine status flags to a single state
    pub(crate) fn from_flags(flags: Flags) -> Self {
        if flags.contains(Flags::IGNORED) {
            FileState::Ignored
        } else if flags.contains(Flags::WT_NEW) && !flags.intersects(index_flags()) {
            FileState::Unknown
        } else if flags.contains(Flags::INDEX_NEW) {
            FileState::Added
        } else if flags.contains(Flags::INDEX_DELETED) {
            FileState::Removed
        } else if flags.contains(Flags::WT_DELETED) {
            FileState::Deleted
        } else if flags.intersects(
            Flags::INDEX_MODIFIED
                | Flags::WT_MODIFIED
                | Flags::INDEX_TYPECHANGE
                | Flags::WT_TYPECHANGE
                | Flags::INDEX_RENAMED
                | Flags::WT_RENAMED,
        ) {
            FileState::Modified
        } else {
            FileState::Clean
        }
    }
}

fn index_flags() -> Flags {
    Flags::INDEX_NEW
        | Flags::INDEX_MODIFIED
        | Flags::INDEX_DELETED
        | Flags::INDEX_RENAMED
        | Flags::INDEX_TYPECHANGE
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the working tree against its parent revision
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Tracked, changed
    pub modified: Vec<RepoPath>,
    /// Staged for addition
    pub added: Vec<RepoPath>,
    /// Staged for removal
    pub removed: Vec<RepoPath>,
    /// Tracked, missing on disk
    pub deleted: Vec<RepoPath>,
    /// Untracked
    pub unknown: Vec<RepoPath>,
    /// Ignored
    pub ignored: Vec<RepoPath>,
    /// Unchanged
    pub clean: Vec<RepoPath>,
    #[serde(skip)]
    parent: RevisionContext,
    #[serde(skip)]
    working: Arc<Manifest>,
}

impl Status {
    /// The partitions as `(name, paths)` pairs in fixed order
    pub fn partitions(&self) -> [(FileState, &[RepoPath]); 7] {
        [
            (FileState::Modified, &self.modified),
            (FileState::Added, &self.added),
            (FileState::Removed, &self.removed),
            (FileState::Deleted, &self.deleted),
            (FileState::Unknown, &self.unknown),
            (FileState::Ignored, &self.ignored),
            (FileState::Clean, &self.clean),
        ]
    }

    /// Paths of one partition
    pub fn paths(&self, state: FileState) -> &[RepoPath] {
        match state {
            FileState::Modified => &self.modified,
            FileState::Added => &self.added,
            FileState::Removed => &self.removed,
            FileState::Deleted => &self.deleted,
            FileState::Unknown => &self.unknown,
            FileState::Ignored => &self.ignored,
            FileState::Clean => &self.clean,
        }
    }

    /// Every reported path with its state, grouped by partition
    pub fn entries(&self) -> impl Iterator<Item = (&RepoPath, FileState)> + '_ {
        self.partitions()
            .into_iter()
            .flat_map(|(state, paths)| paths.iter().map(move |p| (p, state)))
    }

    /// Whether nothing differs from the parent revision
    ///
    /// Unknown and ignored files do not count.
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.deleted.is_empty()
    }

    /// Revision the working tree is based on
    pub fn parent(&self) -> &RevisionContext {
        &self.parent
    }

    /// Files that would make up the next commit: clean, modified and added
    pub fn working_manifest(&self) -> &Arc<Manifest> {
        &self.working
    }

    /// Structure nodes over the working manifest, like `Repository::manifest`
    pub fn nodes(&self) -> ManifestNodes {
        std::iter::once(ManifestNode::new(
            &self.parent,
            Structure::root(self.working.clone()),
        ))
    }

    /// Query the engine for the status of every path in the working tree
    pub(crate) fn collect(
        git: &git2::Repository,
        workdir: &Path,
        parent: RevisionContext,
    ) -> Result<Self> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(true)
            .include_unmodified(true)
            .renames_head_to_index(false)
            .renames_index_to_workdir(false);

        let mut status = Status {
            modified: Vec::new(),
            added: Vec::new(),
            removed: Vec::new(),
            deleted: Vec::new(),
            unknown: Vec::new(),
            ignored: Vec::new(),
            clean: Vec::new(),
            parent,
            working: Arc::default(),
        };

        for entry in git.statuses(Some(&mut opts))?.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let path = RepoPath::from_normalized(path);
            match FileState::from_flags(entry.status()) {
                FileState::Modified => status.modified.push(path),
                FileState::Added => status.added.push(path),
                FileState::Removed => status.removed.push(path),
                FileState::Deleted => status.deleted.push(path),
                FileState::Unknown => status.unknown.push(path),
                FileState::Ignored => status.ignored.push(path),
                FileState::Clean => status.clean.push(path),
            }
        }

        for state in FileState::ALL {
            status.partition_mut(state).sort();
        }

        status.working = Arc::new(working_manifest(git, workdir, &status.deleted)?);
        Ok(status)
    }

    fn partition_mut(&mut self, state: FileState) -> &mut Vec<RepoPath> {
        match state {
            FileState::Modified => &mut self.modified,
            FileState::Added => &mut self.added,
            FileState::Removed => &mut self.removed,
            FileState::Deleted => &mut self.deleted,
            FileState::Unknown => &mut self.unknown,
            FileState::Ignored => &mut self.ignored,
            FileState::Clean => &mut self.clean,
        }
    }
}

/// Stage-0 index entries as a manifest, minus files missing on disk
fn working_manifest(git: &git2::Repository, workdir: &Path, deleted: &[RepoPath]) -> Result<Manifest> {
    let index = git.index()?;
    let entries = staged_entries(&index)
        .filter_map(|(path, e)| {
            if deleted.binary_search(&path).is_ok() {
                return None;
            }
            // the index size is stale for files modified since staging
            let size = std::fs::symlink_metadata(workdir.join(path.as_str()))
                .map(|m| m.len())
                .unwrap_or(u64::from(e.file_size));
            Some(ManifestEntry {
                path,
                blob: e.id,
                size,
                executable: is_executable(e.mode),
            })
        })
        .collect();
    Ok(Manifest::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_classification() {
        assert_eq!(FileState::from_flags(Flags::CURRENT), FileState::Clean);
        assert_eq!(FileState::from_flags(Flags::WT_NEW), FileState::Unknown);
        assert_eq!(FileState::from_flags(Flags::INDEX_NEW), FileState::Added);
        assert_eq!(
            FileState::from_flags(Flags::INDEX_NEW | Flags::WT_MODIFIED),
            FileState::Added
        );
        assert_eq!(
            FileState::from_flags(Flags::INDEX_DELETED | Flags::WT_NEW),
            FileState::Removed
        );
        assert_eq!(FileState::from_flags(Flags::WT_DELETED), FileState::Deleted);
        assert_eq!(FileState::from_flags(Flags::INDEX_MODIFIED), FileState::Modified);
        assert_eq!(FileState::from_flags(Flags::WT_TYPECHANGE), FileState::Modified);
        assert_eq!(FileState::from_flags(Flags::IGNORED), FileState::Ignored);
    }

    #[test]
    fn test_state_names_follow_partition_order() {
        let names: Vec<_> = FileState::ALL.iter().map(FileState::as_str).collect();
        assert_eq!(
            names,
            vec!["modified", "added", "removed", "deleted", "unknown", "ignored", "clean"]
        );
        assert_eq!(
            serde_json::to_value(FileState::Unknown).unwrap(),
            serde_json::json!("unknown")
        );
    }
}
