//! Error types for repository and sandbox operations

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Repository operation error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct RepoError {
    kind: RepoErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoErrorKind {
    /// Path is malformed, escapes the repository root, or is not tracked
    PathInvalid,
    /// An ancestor of the path is a file, so the path cannot be a directory
    PathNotDir,
    /// Something of another kind (or a distinct file) already lives at the path
    PathExists,
    /// Revision spec does not resolve to a commit
    RevisionNotFound,
    /// Location is not a recognized store
    RepoNotFound,
    /// Argument has the wrong shape (programmer error, not user input)
    TypeMismatch,
    /// Argument value rejected (empty commit message, occupied location, ...)
    InvalidArgument,
    /// Commit requested with no staged changes
    NothingToCommit,
    /// Version-control engine failure
    Storage,
    /// I/O error
    Io,
}

impl RepoErrorKind {
    /// True for `PathInvalid` and its refinements `PathNotDir` and `PathExists`
    pub fn is_path_invalid(&self) -> bool {
        matches!(
            self,
            RepoErrorKind::PathInvalid | RepoErrorKind::PathNotDir | RepoErrorKind::PathExists
        )
    }
}

impl RepoError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RepoErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> &RepoErrorKind {
        &self.kind
    }

    /// Get the context message, if any
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    // Constructors for different error kinds

    /// Create an invalid path error
    pub fn path_invalid(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::PathInvalid, Some(reason.into().into()))
            .with_context(format!("path: {}", path))
    }

    /// Create a not-a-directory error
    pub fn path_not_dir(path: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::PathNotDir, None)
            .with_context(format!("not a directory: {}", path))
            .with_help("a file already occupies this path or one of its parents")
    }

    /// Create a path-exists error
    pub fn path_exists(path: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::PathExists, None)
            .with_context(format!("path exists: {}", path))
            .with_help("existing entries are never overwritten; remove or rename it first")
    }

    /// Create a revision-not-found error
    pub fn revision_not_found(spec: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::RevisionNotFound, None)
            .with_context(format!("revision not found: {}", spec))
    }

    /// Create a repository-not-found error
    pub fn repo_not_found(location: impl fmt::Display) -> Self {
        Self::new(RepoErrorKind::RepoNotFound, None)
            .with_context(format!("repository not found: {}", location))
    }

    /// Create a type-mismatch error
    pub fn type_mismatch(what: &str, expected: &str) -> Self {
        Self::new(RepoErrorKind::TypeMismatch, None)
            .with_context(format!("{} must be {}", what, expected))
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(RepoErrorKind::InvalidArgument, Some(msg.into().into()))
    }

    /// Create a nothing-to-commit error
    pub fn nothing_to_commit() -> Self {
        Self::new(RepoErrorKind::NothingToCommit, None)
            .with_help("stage changes with add_file_content, rename or remove before committing")
    }

    /// Create a storage (engine) error
    pub fn storage(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Storage, Some(Box::new(source)))
    }

    /// Create an I/O error
    pub fn io(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(RepoErrorKind::Io, Some(Box::new(source)))
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {}", ctx)?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }

        Ok(())
    }
}

impl From<git2::Error> for RepoError {
    fn from(e: git2::Error) -> Self {
        RepoError::storage(e)
    }
}

impl From<std::io::Error> for RepoError {
    fn from(e: std::io::Error) -> Self {
        RepoError::io(e)
    }
}

// Internal granular errors

/// Path validation errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum PathError {
    /// Absolute paths are never accepted
    #[error("Absolute path not allowed: {path}")]
    #[diagnostic(
        code(path::absolute),
        help("paths are relative to the repository root, drop the leading separator")
    )]
    Absolute {
        /// The offending path
        path: String,
    },

    /// `..` climbs above the repository root
    #[error("Path escapes repository root: {path}")]
    #[diagnostic(code(path::escape))]
    Escape {
        /// The offending path
        path: String,
    },

    /// Path addresses the engine's metadata directory
    #[error("Path is reserved for repository metadata: {path}")]
    #[diagnostic(code(path::reserved))]
    Reserved {
        /// The offending path
        path: String,
    },

    /// Path contains a NUL byte
    #[error("Path contains a NUL byte")]
    #[diagnostic(code(path::nul))]
    Nul,

    /// The root itself cannot be used here
    #[error("Path must name an entry below the repository root")]
    #[diagnostic(code(path::root))]
    Root,
}

impl From<PathError> for RepoError {
    fn from(e: PathError) -> Self {
        let path = match &e {
            PathError::Absolute { path }
            | PathError::Escape { path }
            | PathError::Reserved { path } => path.clone(),
            PathError::Nul => "<nul>".to_string(),
            PathError::Root => "/".to_string(),
        };
        RepoError::new(RepoErrorKind::PathInvalid, Some(Box::new(e)))
            .with_context(format!("path: {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_subkinds_are_path_invalid() {
        assert!(RepoError::path_exists("a").kind().is_path_invalid());
        assert!(RepoError::path_not_dir("a").kind().is_path_invalid());
        assert!(RepoError::path_invalid("a", "bad").kind().is_path_invalid());
        assert!(!RepoError::revision_not_found("x").kind().is_path_invalid());
        assert!(!RepoError::type_mismatch("sources", "a string").kind().is_path_invalid());
    }

    #[test]
    fn test_display_includes_context_and_source() {
        let err: RepoError = PathError::Escape {
            path: "../x".into(),
        }
        .into();
        let text = err.to_string();
        assert!(text.starts_with("PathInvalid"));
        assert!(text.contains("../x"));
        assert!(text.contains("escapes"));
    }
}
