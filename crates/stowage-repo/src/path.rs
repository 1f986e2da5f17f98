//! Repository-relative paths and the validation applied before any mutation
//!
//! Every path handed to the sandbox goes through [`normalize`] first, which
//! produces a [`RepoPath`]: `/`-separated, no empty, `.` or `..` segments, and
//! guaranteed to stay below the repository root. [`check_available`] then
//! checks the normalized path against what already exists (staged, committed
//! or on disk) so that files never replace directories and vice versa.
//!
//! All of this is string-based; nothing here touches the filesystem.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::{PathError, RepoError, Result};

/// Path separator used in manifests and [`RepoPath`]s, on every platform
pub const SEPARATOR: char = '/';

/// Name of the engine's metadata directory, never addressable through a sandbox
pub const METADATA_DIR: &str = ".git";

/// A normalized path relative to the repository root
///
/// The root itself is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoPath(SmolStr);

impl RepoPath {
    /// The repository root
    pub fn root() -> Self {
        Self(SmolStr::default())
    }

    /// Wrap a manifest path that is already in normalized form
    ///
    /// Engine listings produce normalized paths; user input must go through
    /// [`normalize`] instead.
    pub(crate) fn from_normalized(path: impl Into<SmolStr>) -> Self {
        Self(path.into())
    }

    /// Whether this is the repository root
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The path as a `/`-separated string (empty for the root)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments from the root down
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Last segment (empty for the root)
    pub fn basename(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Parent directory, `None` for the root
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind(SEPARATOR) {
            Some(idx) => Self(SmolStr::new(&self.0[..idx])),
            None => Self::root(),
        })
    }

    /// Append one already-valid segment
    pub fn join(&self, segment: &str) -> RepoPath {
        if self.is_root() {
            Self(SmolStr::new(segment))
        } else {
            Self(smol_str::format_smolstr!("{}{}{}", self.0, SEPARATOR, segment))
        }
    }

    /// Proper ancestors below the root, nearest to the root first
    ///
    /// `a/b/c` yields `a` then `a/b`.
    pub fn ancestors(&self) -> impl Iterator<Item = RepoPath> + '_ {
        self.0
            .match_indices(SEPARATOR)
            .map(|(idx, _)| Self(SmolStr::new(&self.0[..idx])))
    }

    /// Whether `self` lies strictly below the directory `dir`
    pub fn is_inside(&self, dir: &RepoPath) -> bool {
        if dir.is_root() {
            return !self.is_root();
        }
        self.0.len() > dir.0.len()
            && self.0.starts_with(dir.as_str())
            && self.0.as_bytes()[dir.0.len()] == SEPARATOR as u8
    }

    /// The part of `self` below `dir`, if `self` is inside it
    pub fn strip_dir(&self, dir: &RepoPath) -> Option<&str> {
        if !self.is_inside(dir) {
            return None;
        }
        if dir.is_root() {
            Some(self.as_str())
        } else {
            Some(&self.0[dir.0.len() + 1..])
        }
    }

    /// The prefix every path inside this directory starts with
    ///
    /// Empty for the root, `dir/` otherwise.
    pub fn dir_prefix(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("{}{}", self.0, SEPARATOR)
        }
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Normalize a user-supplied path into a [`RepoPath`]
///
/// Rules:
/// - backslashes are treated as separators
/// - repeated separators, `.` segments and trailing separators are dropped
/// - `..` removes the previous segment and fails if there is none
/// - absolute paths (leading separator or drive prefix) are rejected
/// - the engine metadata directory cannot be addressed
///
/// The empty string and `.` normalize to the root.
pub fn normalize(raw: &str) -> Result<RepoPath> {
    if raw.contains('\0') {
        return Err(PathError::Nul.into());
    }

    let unified = raw.replace('\\', "/");
    if unified.starts_with(SEPARATOR) || has_drive_prefix(&unified) {
        return Err(PathError::Absolute {
            path: raw.to_string(),
        }
        .into());
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::Escape {
                        path: raw.to_string(),
                    }
                    .into());
                }
            }
            p => parts.push(p),
        }
    }

    if parts.iter().any(|p| p.eq_ignore_ascii_case(METADATA_DIR)) {
        return Err(PathError::Reserved {
            path: raw.to_string(),
        }
        .into());
    }

    Ok(RepoPath(SmolStr::new(parts.join("/"))))
}

/// Normalize a sequence of path segments (as carried by a request subpath)
pub fn normalize_segments<S: AsRef<str>>(segments: &[S]) -> Result<RepoPath> {
    let joined = segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("/");
    normalize(&joined)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Kind of entry at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (or symlink; both are leaves)
    File,
    /// Directory
    Directory,
}

/// Answers "what lives at this path" for [`check_available`]
pub trait EntryLookup {
    /// Kind of the entry at `path`, `None` if nothing is there
    fn entry_kind(&self, path: &RepoPath) -> Result<Option<EntryKind>>;
}

/// Check that `path` can hold an entry of kind `expected`
///
/// Fails with `PathNotDir` if an ancestor is a file and with `PathExists` if
/// an entry of the other kind is already at `path`. An entry of the same kind
/// is fine: writing a file over a file replaces its content, and creating an
/// existing directory is a no-op.
pub fn check_available<L>(path: &RepoPath, expected: EntryKind, lookup: &L) -> Result<()>
where
    L: EntryLookup + ?Sized,
{
    for ancestor in path.ancestors() {
        if lookup.entry_kind(&ancestor)? == Some(EntryKind::File) {
            return Err(RepoError::path_not_dir(ancestor));
        }
    }

    match lookup.entry_kind(path)? {
        Some(kind) if kind != expected => Err(RepoError::path_exists(path)),
        _ => Ok(()),
    }
}

/// One path or an ordered list of paths
///
/// Built from plain strings in Rust code, or from loosely typed request data
/// with [`PathArg::from_value`], which is where shape errors are caught.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathArg {
    /// A single path
    Single(String),
    /// Several paths, order preserved
    Many(Vec<String>),
}

impl PathArg {
    /// The paths as a slice
    pub fn as_slice(&self) -> &[String] {
        match self {
            PathArg::Single(p) => std::slice::from_ref(p),
            PathArg::Many(ps) => ps,
        }
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether there are no paths at all
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Accept a JSON string or array of strings
    ///
    /// Anything else, including arrays holding non-strings, is a
    /// `TypeMismatch`.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(PathArg::Single(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(RepoError::type_mismatch(
                        "sources",
                        "a string or a list of strings",
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(PathArg::Many),
            _ => Err(RepoError::type_mismatch(
                "sources",
                "a string or a list of strings",
            )),
        }
    }

    /// Accept a JSON string as a single destination path
    pub fn destination_from_value(value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(RepoError::type_mismatch("destination", "a string")),
        }
    }
}

impl From<&str> for PathArg {
    fn from(path: &str) -> Self {
        PathArg::Single(path.to_string())
    }
}

impl From<String> for PathArg {
    fn from(path: String) -> Self {
        PathArg::Single(path)
    }
}

impl From<&String> for PathArg {
    fn from(path: &String) -> Self {
        PathArg::Single(path.clone())
    }
}

impl From<Vec<String>> for PathArg {
    fn from(paths: Vec<String>) -> Self {
        PathArg::Many(paths)
    }
}

impl From<Vec<&str>> for PathArg {
    fn from(paths: Vec<&str>) -> Self {
        PathArg::Many(paths.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for PathArg {
    fn from(paths: &[&str]) -> Self {
        PathArg::Many(paths.iter().map(|p| p.to_string()).collect())
    }
}

impl From<&[String]> for PathArg {
    fn from(paths: &[String]) -> Self {
        PathArg::Many(paths.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for PathArg {
    fn from(paths: [&str; N]) -> Self {
        PathArg::Many(paths.iter().map(|p| p.to_string()).collect())
    }
}
