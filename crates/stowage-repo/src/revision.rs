//! Revision identifiers and resolved revision contexts

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeZone};
use git2::Oid;
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

/// Symbolic specs that resolve to the most recent revision
pub const LATEST_ALIASES: [&str; 3] = ["tip", "latest", "HEAD"];

/// Symbolic spec for the null revision (before the first commit)
pub const NULL_SPEC: &str = "null";

/// Content-derived revision identifier (commit id)
///
/// The all-zero id is the null revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionId(Oid);

impl RevisionId {
    /// The null revision id
    pub fn null() -> Self {
        Self(Oid::zero())
    }

    /// Whether this is the null revision
    pub fn is_null(&self) -> bool {
        self.0.is_zero()
    }

    /// The underlying engine object id
    pub fn oid(&self) -> Oid {
        self.0
    }

    /// Abbreviated form for display (12 hex characters)
    pub fn short(&self) -> String {
        let mut s = self.0.to_string();
        s.truncate(12);
        s
    }
}

impl From<Oid> for RevisionId {
    fn from(oid: Oid) -> Self {
        Self(oid)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RevisionId {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        Oid::from_str(s)
            .map(Self)
            .map_err(|_| RepoError::revision_not_found(s))
    }
}

impl Serialize for RevisionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RevisionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Oid::from_str(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Parsed form of a user-supplied revision spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionSpec {
    /// Most recent revision (`None`, empty, `tip`, `latest`, `HEAD`)
    Latest,
    /// The null revision (`null`, `-1`)
    Null,
    /// Local revision number, counted from the root commit, with the text it
    /// was parsed from
    Number(u64, String),
    /// Anything else: a commit id, abbreviation, or engine revision expression
    Expr(String),
}

impl RevisionSpec {
    /// Classify a spec string
    ///
    /// Plain decimal specs without a sign or leading zero are tried as
    /// revision numbers first, then as id abbreviations; the caller handles
    /// the fallback. Anything else with digits (`+5`, `0123`) is an
    /// expression.
    pub fn parse(spec: Option<&str>) -> Self {
        let Some(spec) = spec.map(str::trim) else {
            return RevisionSpec::Latest;
        };
        if spec.is_empty() || LATEST_ALIASES.contains(&spec) {
            RevisionSpec::Latest
        } else if spec == NULL_SPEC || spec == "-1" {
            RevisionSpec::Null
        } else if let Some(n) = revision_number(spec) {
            RevisionSpec::Number(n, spec.to_string())
        } else {
            RevisionSpec::Expr(spec.to_string())
        }
    }
}

fn revision_number(spec: &str) -> Option<u64> {
    let digits = spec.bytes().all(|b| b.is_ascii_digit());
    if digits && (spec == "0" || !spec.starts_with('0')) {
        spec.parse().ok()
    } else {
        None
    }
}

/// An immutable, resolved revision snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionContext {
    /// Commit id (all zeros for the null revision)
    pub id: RevisionId,
    /// Local revision number, -1 for the null revision
    pub number: i64,
    /// Root tree of the revision, `None` for the null revision
    #[serde(skip)]
    pub tree: Option<Oid>,
    /// Author as `Name <email>`
    pub author: Option<String>,
    /// First line of the commit message
    pub summary: Option<String>,
    /// Commit time in the committer's offset
    pub time: Option<DateTime<FixedOffset>>,
}

impl RevisionContext {
    /// Context for the null revision: no tree, no metadata
    pub fn null() -> Self {
        Self {
            id: RevisionId::null(),
            number: -1,
            tree: None,
            author: None,
            summary: None,
            time: None,
        }
    }

    /// Build a context from a commit and its local number
    pub(crate) fn from_commit(commit: &git2::Commit<'_>, number: i64) -> Self {
        let author = commit.author();
        let author = match (author.name(), author.email()) {
            (Some(name), Some(email)) if !email.is_empty() && email != name => {
                Some(format!("{} <{}>", name, email))
            }
            (Some(name), _) => Some(name.to_string()),
            _ => None,
        };

        Self {
            id: commit.id().into(),
            number,
            tree: Some(commit.tree_id()),
            author,
            summary: commit.summary().map(str::to_string),
            time: commit_time(commit.time()),
        }
    }

    /// Whether this is the null revision
    pub fn is_null(&self) -> bool {
        self.id.is_null()
    }
}

fn commit_time(time: git2::Time) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)?;
    offset.timestamp_opt(time.seconds(), 0).single()
}
