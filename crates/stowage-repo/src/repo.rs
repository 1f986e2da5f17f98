//! Read-only repository access
//!
//! Opens an existing store, resolves revision specs into [`RevisionContext`]s,
//! lists the flat manifest of a revision and reads raw file content. Every
//! call re-queries the store; the only state kept between calls is the pinned
//! revision of the handle (see [`Repository::context`]).

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use git2::{ErrorCode, ObjectType, Oid, RepositoryInitOptions};

use crate::error::{RepoError, RepoErrorKind, Result};
use crate::manifest::Manifest;
use crate::node::{ManifestNode, ManifestNodes};
use crate::path::{RepoPath, normalize};
use crate::revision::{RevisionContext, RevisionSpec};
use crate::structure::Structure;

/// Handle on an existing versioned store
///
/// # Example
///
/// ```rust,ignore
/// use stowage_repo::Repository;
///
/// let repo = Repository::open("/srv/workspace", Some("tip"))?;
/// let ctx = repo.context()?;
/// for node in repo.manifest(None)? {
///     for file in node.structure().fentries() {
///         println!("{} ({} bytes)", file.path, file.size);
///     }
/// }
/// let readme = repo.read(Some(&ctx.id.to_string()), "README")?;
/// ```
pub struct Repository {
    location: PathBuf,
    git: git2::Repository,
    pinned: Option<String>,
    context: RefCell<Option<RevisionContext>>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("location", &self.location)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Initialize a new, empty store at `location` and open it
    ///
    /// With `with_parents == false` the parent of `location` must already
    /// exist. Fails if `location` already holds a store or is not a directory.
    pub fn create(location: impl AsRef<Path>, with_parents: bool) -> Result<Self> {
        let location = location.as_ref();
        init_store(location, with_parents)?;
        Self::open(location, None)
    }

    /// Open the store at `location`, pinned to `revision` (latest if `None`)
    ///
    /// The pinned revision is resolved on first use of [`context`](Self::context).
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(location), fields(location = %location.as_ref().display())))]
    pub fn open(location: impl AsRef<Path>, revision: Option<&str>) -> Result<Self> {
        let location = location.as_ref();
        let git = git2::Repository::open(location).map_err(|e| {
            RepoError::new(RepoErrorKind::RepoNotFound, Some(Box::new(e)))
                .with_context(format!("repository not found: {}", location.display()))
        })?;

        Ok(Self {
            location: location.to_path_buf(),
            git,
            pinned: revision.map(str::to_string),
            context: RefCell::new(None),
        })
    }

    /// Filesystem location the store was opened from
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Working tree of the store, `None` for a bare store
    pub fn workdir(&self) -> Option<&Path> {
        self.git.workdir()
    }

    pub(crate) fn git(&self) -> &git2::Repository {
        &self.git
    }

    /// The handle's pinned revision, resolved once and then fixed
    pub fn context(&self) -> Result<RevisionContext> {
        if let Some(ctx) = self.context.borrow().as_ref() {
            return Ok(ctx.clone());
        }
        let ctx = self.resolve(self.pinned.as_deref())?;
        *self.context.borrow_mut() = Some(ctx.clone());
        Ok(ctx)
    }

    /// Resolve a revision spec against the current state of the store
    ///
    /// Accepts `None`, `tip`, `latest` or `HEAD` for the most recent revision,
    /// `null` for the revision before the first commit, a revision number, or
    /// a full or abbreviated commit id.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn resolve(&self, spec: Option<&str>) -> Result<RevisionContext> {
        match RevisionSpec::parse(spec) {
            RevisionSpec::Latest => self.head_context(),
            RevisionSpec::Null => Ok(RevisionContext::null()),
            RevisionSpec::Number(n, text) => match self.by_number(n)? {
                Some(ctx) => Ok(ctx),
                // digits only, may still be an abbreviated id
                None => self.by_expr(&text),
            },
            RevisionSpec::Expr(expr) => self.by_expr(&expr),
        }
    }

    /// Structure nodes of a revision: exactly one, for the root directory
    ///
    /// An empty repository yields a root node without children.
    pub fn manifest(&self, spec: Option<&str>) -> Result<ManifestNodes> {
        let ctx = self.resolve(spec)?;
        let manifest = self.manifest_of(&ctx)?;
        Ok(std::iter::once(ManifestNode::new(
            &ctx,
            Structure::root(manifest),
        )))
    }

    /// Flat manifest of a revision
    pub fn files(&self, spec: Option<&str>) -> Result<Arc<Manifest>> {
        let ctx = self.resolve(spec)?;
        self.manifest_of(&ctx)
    }

    /// Flat manifest of an already resolved revision
    pub fn manifest_of(&self, ctx: &RevisionContext) -> Result<Arc<Manifest>> {
        let Some(tree_id) = ctx.tree else {
            return Ok(Arc::new(Manifest::default()));
        };
        let tree = self.git.find_tree(tree_id)?;
        Ok(Arc::new(Manifest::from_tree(&self.git, &tree)?))
    }

    /// Raw bytes of `path` at a revision
    ///
    /// Fails with `PathInvalid` if `path` is not a tracked file there.
    pub fn read(&self, spec: Option<&str>, path: &str) -> Result<Bytes> {
        let path = normalize(path)?;
        let ctx = self.resolve(spec)?;
        self.read_at(&ctx, &path)
    }

    /// Raw bytes of `path` at an already resolved revision
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, ctx, path), fields(rev = %ctx.id, path = %path)))]
    pub fn read_at(&self, ctx: &RevisionContext, path: &RepoPath) -> Result<Bytes> {
        let not_tracked = || RepoError::path_invalid(path, format!("not tracked at revision {}", ctx.id.short()));

        let Some(tree_id) = ctx.tree else {
            return Err(not_tracked());
        };
        if path.is_root() {
            return Err(not_tracked());
        }

        let tree = self.git.find_tree(tree_id)?;
        let entry = match tree.get_path(Path::new(path.as_str())) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Err(not_tracked()),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(not_tracked());
        }

        let blob = self.git.find_blob(entry.id())?;
        Ok(Bytes::copy_from_slice(blob.content()))
    }

    /// First-parent history from a revision backwards, newest first
    pub fn log(&self, spec: Option<&str>, limit: Option<usize>) -> Result<Vec<RevisionContext>> {
        let start = self.resolve(spec)?;
        if start.is_null() {
            return Ok(Vec::new());
        }

        let chain = self.first_parent_chain(start.id.oid())?;
        let limit = limit.unwrap_or(chain.len());
        chain
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, oid)| {
                let commit = self.git.find_commit(*oid)?;
                Ok(RevisionContext::from_commit(&commit, start.number - i as i64))
            })
            .collect()
    }

    fn head_context(&self) -> Result<RevisionContext> {
        let head = match self.git.head() {
            Ok(head) => head,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(RevisionContext::null());
            }
            Err(e) => return Err(e.into()),
        };
        let commit = head.peel_to_commit()?;
        self.context_for(&commit)
    }

    fn by_number(&self, n: u64) -> Result<Option<RevisionContext>> {
        let head = match self.git.head() {
            Ok(head) => head.peel_to_commit()?,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut chain = self.first_parent_chain(head.id())?;
        chain.reverse();
        let Some(oid) = usize::try_from(n).ok().and_then(|i| chain.get(i)) else {
            return Ok(None);
        };
        let commit = self.git.find_commit(*oid)?;
        Ok(Some(RevisionContext::from_commit(&commit, n as i64)))
    }

    fn by_expr(&self, expr: &str) -> Result<RevisionContext> {
        let commit = self
            .git
            .revparse_single(expr)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| {
                RepoError::new(RepoErrorKind::RevisionNotFound, Some(Box::new(e)))
                    .with_context(format!("revision not found: {}", expr))
            })?;
        self.context_for(&commit)
    }

    fn context_for(&self, commit: &git2::Commit<'_>) -> Result<RevisionContext> {
        let number = self.first_parent_chain(commit.id())?.len() as i64 - 1;
        Ok(RevisionContext::from_commit(commit, number))
    }

    /// Commit ids from `from` back to the root, following first parents only
    fn first_parent_chain(&self, from: Oid) -> Result<Vec<Oid>> {
        let mut walk = self.git.revwalk()?;
        walk.push(from)?;
        walk.simplify_first_parent()?;
        Ok(walk.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

fn cannot_create(location: &Path, source: std::io::Error) -> RepoError {
    RepoError::new(RepoErrorKind::InvalidArgument, Some(Box::new(source)))
        .with_context(format!("cannot create {}", location.display()))
}

/// Create the directory (if needed) and an empty store with a working tree
#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(location), fields(location = %location.display())))]
pub(crate) fn init_store(location: &Path, with_parents: bool) -> Result<()> {
    if location.exists() {
        if !location.is_dir() {
            return Err(RepoError::invalid_argument(format!(
                "{} exists and is not a directory",
                location.display()
            )));
        }
        if git2::Repository::open(location).is_ok() {
            return Err(RepoError::invalid_argument(format!(
                "{} already contains a repository",
                location.display()
            )));
        }
    } else if with_parents {
        fs::create_dir_all(location).map_err(|e| cannot_create(location, e))?;
    } else {
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(RepoError::invalid_argument(format!(
                    "parent of {} does not exist",
                    location.display()
                ))
                .with_help("pass with_parents = true to create missing directories"));
            }
        }
        fs::create_dir(location).map_err(|e| cannot_create(location, e))?;
    }

    let mut opts = RepositoryInitOptions::new();
    opts.no_reinit(true).mkdir(false);
    git2::Repository::init_opts(location, &opts).map_err(|e| {
        RepoError::new(RepoErrorKind::InvalidArgument, Some(Box::new(e)))
            .with_context(format!("cannot initialize repository at {}", location.display()))
    })?;

    #[cfg(feature = "tracing")]
    tracing::info!(location = %location.display(), "initialized repository");

    Ok(())
}
