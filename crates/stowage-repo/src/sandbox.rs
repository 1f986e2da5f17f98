//! Mutable working copy of a repository
//!
//! A [`Sandbox`] stages changes in the engine's index and on disk, then turns
//! them into a revision with [`Sandbox::commit`]. Every mutating call
//! normalizes its paths and checks them against the working tree before
//! touching anything:
//!
//! - nothing outside the repository root is ever written
//! - a file never replaces a directory and vice versa
//! - rename never overwrites an existing entry
//!
//! Empty directories are not versioned; [`Sandbox::mkdir`] only creates them
//! on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use git2::{Index, Oid, Signature};
use smol_str::SmolStr;

use crate::error::{PathError, RepoError, RepoErrorKind, Result};
use crate::manifest::{Manifest, staged_entries};
use crate::node::ManifestNodes;
use crate::path::{EntryKind, EntryLookup, PathArg, RepoPath, check_available, normalize};
use crate::repo::{Repository, init_store};
use crate::revision::{RevisionContext, RevisionId};
use crate::status::Status;

/// A repository with a working tree that accepts changes
///
/// # Example
///
/// ```rust,ignore
/// use stowage_repo::Sandbox;
///
/// let sandbox = Sandbox::create("/srv/workspace", true)?;
/// sandbox.add_file_content("models/heart.cellml", b"<model/>")?;
/// sandbox.commit("initial model", "Tester <test@example.com>")?;
///
/// let outcome = sandbox.rename(["models/heart.cellml"], "archive")?;
/// assert_eq!(outcome.error_count(), 0);
/// ```
#[derive(Debug)]
pub struct Sandbox {
    repo: Repository,
    workdir: PathBuf,
}

/// One source moved by [`Sandbox::rename`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Copied {
    /// Last segment of the source path
    pub basename: SmolStr,
    /// Where the source now lives
    pub target: RepoPath,
}

/// One source [`Sandbox::rename`] left in place
#[derive(Debug)]
pub struct RenameFailure {
    /// The source as given by the caller
    pub source: String,
    /// Why it was not moved
    pub error: RepoError,
}

/// Result of a rename: what moved and what did not
#[derive(Debug, Default)]
pub struct RenameOutcome {
    /// Successfully moved sources, in request order
    pub copied: Vec<Copied>,
    /// Sources that failed, in request order
    pub failures: Vec<RenameFailure>,
}

impl RenameOutcome {
    /// Number of failed sources
    pub fn error_count(&self) -> usize {
        self.failures.len()
    }

    /// `(error count, copied)`
    pub fn into_parts(self) -> (usize, Vec<Copied>) {
        (self.failures.len(), self.copied)
    }
}

/// One file relocation inside a rename
#[derive(Debug)]
struct Move {
    from: RepoPath,
    to: RepoPath,
    blob: Oid,
}

impl Sandbox {
    /// Initialize a new store with a working tree at `location` and open it
    pub fn create(location: impl AsRef<Path>, with_parents: bool) -> Result<Self> {
        let location = location.as_ref();
        init_store(location, with_parents)?;
        Self::open(location)
    }

    /// Open an existing store for modification
    ///
    /// Fails with `InvalidArgument` if the store has no working tree.
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        let repo = Repository::open(location, None)?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                RepoError::invalid_argument(format!(
                    "{} has no working tree",
                    location.display()
                ))
            })?;
        Ok(Self { repo, workdir })
    }

    /// The underlying read-only handle
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Root of the working tree on disk
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// See [`Repository::resolve`]
    pub fn resolve(&self, spec: Option<&str>) -> Result<RevisionContext> {
        self.repo.resolve(spec)
    }

    /// See [`Repository::manifest`]
    pub fn manifest(&self, spec: Option<&str>) -> Result<ManifestNodes> {
        self.repo.manifest(spec)
    }

    /// See [`Repository::files`]
    pub fn files(&self, spec: Option<&str>) -> Result<Arc<Manifest>> {
        self.repo.files(spec)
    }

    /// See [`Repository::read`]
    pub fn read(&self, spec: Option<&str>, path: &str) -> Result<Bytes> {
        self.repo.read(spec, path)
    }

    /// See [`Repository::log`]
    pub fn log(&self, spec: Option<&str>, limit: Option<usize>) -> Result<Vec<RevisionContext>> {
        self.repo.log(spec, limit)
    }

    /// Write `content` to `path` and stage it
    ///
    /// Missing parent directories are created. Writing over an existing file
    /// replaces its content; writing where a directory lives fails with
    /// `PathExists`, and writing below a file fails with `PathNotDir`.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, content), fields(len = content.as_ref().len())))]
    pub fn add_file_content(&self, path: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let path = normalize(path)?;
        if path.is_root() {
            return Err(PathError::Root.into());
        }

        let mut index = self.index()?;
        check_available(&path, EntryKind::File, &self.view(&index))?;

        let full = self.full_path(&path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content.as_ref())?;

        index.add_path(Path::new(path.as_str()))?;
        index.write()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path, "staged file content");

        Ok(())
    }

    /// Create `path` and any missing parents as directories
    ///
    /// Always returns `true`; an existing directory (including the root) is
    /// fine. Fails with `PathExists` if a file lives at `path`.
    pub fn mkdir(&self, path: &str) -> Result<bool> {
        let path = normalize(path)?;
        if path.is_root() {
            return Ok(true);
        }

        let index = self.index()?;
        check_available(&path, EntryKind::Directory, &self.view(&index))?;
        fs::create_dir_all(self.full_path(&path))?;
        Ok(true)
    }

    /// Move tracked files or directories and stage the result
    ///
    /// With a single source, `destination` is the new path, or the directory
    /// to move into if it is the root or an existing directory. With several
    /// sources, `destination` is always a directory (created as needed) and
    /// each source keeps its basename.
    ///
    /// Single-source failures are returned as errors. With several sources,
    /// each failing source is recorded in the outcome and the others still
    /// move; the call fails only if none moved. Existing entries are never
    /// overwritten.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, sources), fields(count = tracing::field::Empty)))]
    pub fn rename(&self, sources: impl Into<PathArg>, destination: &str) -> Result<RenameOutcome> {
        let sources = sources.into();
        if sources.is_empty() {
            return Err(RepoError::invalid_argument("no sources to rename"));
        }
        #[cfg(feature = "tracing")]
        tracing::Span::current().record("count", sources.len());

        let dest = normalize(destination)?;
        let mut index = self.index()?;
        let mut outcome = RenameOutcome::default();

        if let [raw] = sources.as_slice() {
            let source = normalize(raw)?;
            let into_dir = dest.is_root()
                || self.view(&index).entry_kind(&dest)? == Some(EntryKind::Directory);
            let target = if into_dir {
                dest.join(source.basename())
            } else {
                dest.clone()
            };
            let moves = self.plan_move(&index, &source, &target)?;
            self.apply_moves(&mut index, &moves)?;
            outcome.copied.push(Copied {
                basename: source.basename().into(),
                target,
            });
            return Ok(outcome);
        }

        {
            let view = self.view(&index);
            for ancestor in dest.ancestors().chain(std::iter::once(dest.clone())) {
                if view.entry_kind(&ancestor)? == Some(EntryKind::File) {
                    return Err(RepoError::path_not_dir(ancestor));
                }
            }
        }

        // sources move one at a time so later ones see earlier moves
        for raw in sources.as_slice() {
            let planned = normalize(raw).and_then(|source| {
                let target = dest.join(source.basename());
                let moves = self.plan_move(&index, &source, &target)?;
                Ok((source, target, moves))
            });
            match planned.and_then(|(source, target, moves)| {
                self.apply_moves(&mut index, &moves)?;
                Ok(Copied {
                    basename: source.basename().into(),
                    target,
                })
            }) {
                Ok(copied) => outcome.copied.push(copied),
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(source = %raw, error = %error, "rename source skipped");
                    outcome.failures.push(RenameFailure {
                        source: raw.clone(),
                        error,
                    });
                }
            }
        }

        if outcome.copied.is_empty() {
            if let Some(first) = outcome.failures.into_iter().next() {
                return Err(first.error);
            }
            return Err(RepoError::invalid_argument("no sources to rename"));
        }
        Ok(outcome)
    }

    /// Unstage and delete a tracked file, or every tracked file below a directory
    ///
    /// Returns the number of files removed. Fails with `PathInvalid` if
    /// nothing tracked matches.
    pub fn remove(&self, path: &str) -> Result<usize> {
        let path = normalize(path)?;
        if path.is_root() {
            return Err(PathError::Root.into());
        }

        let mut index = self.index()?;
        let tracked = tracked_under(&index, &path);
        if tracked.is_empty() {
            return Err(RepoError::path_invalid(&path, "not tracked"));
        }

        for (file, _) in &tracked {
            index.remove_path(Path::new(file.as_str()))?;
            remove_if_present(&self.full_path(file))?;
            self.prune_empty_parents(file);
        }
        index.write()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path, count = tracked.len(), "removed tracked files");

        Ok(tracked.len())
    }

    /// Status of every path in the working tree
    pub fn status(&self) -> Result<Status> {
        let parent = self.repo.resolve(None)?;
        Status::collect(self.repo.git(), &self.workdir, parent)
    }

    /// Record the staged changes as a new revision on top of the latest one
    ///
    /// `author` is `Name <email>` or a bare name. Fails with
    /// `InvalidArgument` if `message` or `author` is blank and with
    /// `NothingToCommit` if the staged tree equals the parent's.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, message)))]
    pub fn commit(&self, message: &str, author: &str) -> Result<RevisionId> {
        if message.trim().is_empty() {
            return Err(RepoError::invalid_argument("commit message must not be empty"));
        }
        if author.trim().is_empty() {
            return Err(RepoError::invalid_argument("commit author must not be empty"));
        }
        let signature = parse_signature(author)?;

        let git = self.repo.git();
        let mut index = self.index()?;
        let tree_id = index.write_tree()?;
        let tree = git.find_tree(tree_id)?;

        let parent = self.repo.resolve(None)?;
        let parent = if parent.is_null() {
            None
        } else {
            Some(git.find_commit(parent.id.oid())?)
        };

        let unchanged = match &parent {
            Some(commit) => commit.tree_id() == tree_id,
            None => tree.is_empty(),
        };
        if unchanged {
            return Err(RepoError::nothing_to_commit());
        }

        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let id = git.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        #[cfg(feature = "tracing")]
        tracing::info!(id = %id, author = %author, "committed");

        Ok(id.into())
    }

    fn index(&self) -> Result<Index> {
        Ok(self.repo.git().index()?)
    }

    fn view<'a>(&'a self, index: &'a Index) -> WorkingTree<'a> {
        WorkingTree {
            index,
            workdir: &self.workdir,
        }
    }

    fn full_path(&self, path: &RepoPath) -> PathBuf {
        self.workdir.join(path.as_str())
    }

    /// Validate moving `source` to `target` and list the file relocations
    fn plan_move(&self, index: &Index, source: &RepoPath, target: &RepoPath) -> Result<Vec<Move>> {
        if source.is_root() {
            return Err(PathError::Root.into());
        }
        let tracked = tracked_under(index, source);
        if tracked.is_empty() {
            return Err(RepoError::path_invalid(source, "not tracked"));
        }
        if target == source || target.is_inside(source) {
            return Err(RepoError::path_invalid(target, "cannot move a path into itself"));
        }

        let view = self.view(index);
        for ancestor in target.ancestors() {
            if view.entry_kind(&ancestor)? == Some(EntryKind::File) {
                return Err(RepoError::path_not_dir(ancestor));
            }
        }
        if view.entry_kind(target)?.is_some() {
            return Err(RepoError::path_exists(target));
        }

        Ok(tracked
            .into_iter()
            .map(|(from, blob)| {
                let to = match from.strip_dir(source) {
                    Some(rest) => target.join(rest),
                    None => target.clone(),
                };
                Move { from, to, blob }
            })
            .collect())
    }

    fn apply_moves(&self, index: &mut Index, moves: &[Move]) -> Result<()> {
        for m in moves {
            let from = self.full_path(&m.from);
            let to = self.full_path(&m.to);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            match fs::symlink_metadata(&from) {
                Ok(_) => fs::rename(&from, &to)?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    // deleted on disk but still staged: restore from the index
                    let blob = self.repo.git().find_blob(m.blob)?;
                    fs::write(&to, blob.content())?;
                }
                Err(e) => return Err(e.into()),
            }
            index.remove_path(Path::new(m.from.as_str()))?;
            index.add_path(Path::new(m.to.as_str()))?;
            self.prune_empty_parents(&m.from);
        }
        index.write()?;
        Ok(())
    }

    /// Remove directories left empty below the root, nearest first
    fn prune_empty_parents(&self, path: &RepoPath) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() || fs::remove_dir(self.full_path(&dir)).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

impl EntryLookup for Sandbox {
    fn entry_kind(&self, path: &RepoPath) -> Result<Option<EntryKind>> {
        let index = self.index()?;
        self.view(&index).entry_kind(path)
    }
}

/// The index and the working tree seen together
///
/// Staged entries win; paths the index knows nothing about are looked up on
/// disk.
struct WorkingTree<'a> {
    index: &'a Index,
    workdir: &'a Path,
}

impl EntryLookup for WorkingTree<'_> {
    fn entry_kind(&self, path: &RepoPath) -> Result<Option<EntryKind>> {
        if path.is_root() {
            return Ok(Some(EntryKind::Directory));
        }

        let prefix = path.dir_prefix();
        for (tracked, _) in staged(self.index) {
            if tracked == *path {
                return Ok(Some(EntryKind::File));
            }
            if tracked.as_str().starts_with(&prefix) {
                return Ok(Some(EntryKind::Directory));
            }
        }

        match fs::symlink_metadata(self.workdir.join(path.as_str())) {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::File)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Stage-0 entries of the index as `(path, blob)`
fn staged(index: &Index) -> impl Iterator<Item = (RepoPath, Oid)> + '_ {
    staged_entries(index).map(|(path, e)| (path, e.id))
}

/// Tracked files equal to `path` or below it, in index order
fn tracked_under(index: &Index, path: &RepoPath) -> Vec<(RepoPath, Oid)> {
    staged(index)
        .filter(|(tracked, _)| tracked == path || tracked.is_inside(path))
        .collect()
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Parse `Name <email>` or a bare name into a signature stamped now
///
/// The engine requires an email, so a bare name doubles as one.
fn parse_signature(author: &str) -> Result<Signature<'static>> {
    let author = author.trim();
    let (name, email) = match (author.find('<'), author.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            (author[..open].trim(), author[open + 1..close].trim())
        }
        _ => (author, author),
    };
    let name = if name.is_empty() { email } else { name };
    let email = if email.is_empty() { name } else { email };

    Signature::now(name, email).map_err(|e| {
        RepoError::new(RepoErrorKind::InvalidArgument, Some(Box::new(e)))
            .with_context(format!("author: {}", author))
    })
}
