//! Presentation nodes handed to rendering code
//!
//! A node is either a directory listing ([`ManifestNode`]) or a single file
//! ([`FileNode`]). Both serialize to the flat shape renderers expect: `node`
//! carries the revision id and the empty key `""` carries the kind marker.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::manifest::ManifestEntry;
use crate::path::RepoPath;
use crate::revision::{RevisionContext, RevisionId};
use crate::structure::{DirEntries, FileEntries, Structure};

/// Kind marker for directory nodes
pub const KIND_MANIFEST: &str = "manifest";

/// Kind marker for file nodes
pub const KIND_FILE: &str = "file";

/// Sequence of nodes produced by `Repository::manifest` and `Status::nodes`
///
/// Always exactly one node: the root.
pub type ManifestNodes = std::iter::Once<ManifestNode>;

/// Directory listing at one revision
#[derive(Debug, Clone)]
pub struct ManifestNode {
    node: RevisionId,
    rev: i64,
    structure: Structure,
}

impl ManifestNode {
    pub(crate) fn new(ctx: &RevisionContext, structure: Structure) -> Self {
        Self {
            node: ctx.id,
            rev: ctx.number,
            structure,
        }
    }

    /// Revision id the listing was taken at
    pub fn node(&self) -> RevisionId {
        self.node
    }

    /// Local revision number
    pub fn rev(&self) -> i64 {
        self.rev
    }

    /// Directory path in display form, `/` for the root
    pub fn path(&self) -> String {
        display_path(self.structure.path())
    }

    /// Underlying structure view
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Fresh iterator over the files directly inside the directory
    pub fn fentries(&self) -> FileEntries<'_> {
        self.structure.fentries()
    }

    /// Fresh iterator over the subdirectories directly inside the directory
    pub fn dentries(&self) -> DirEntries<'_> {
        self.structure.dentries()
    }
}

/// A single tracked file at one revision
///
/// Content is not loaded; ask the adapter for `rawfile()`.
#[derive(Debug, Clone)]
pub struct FileNode {
    node: RevisionId,
    rev: i64,
    entry: ManifestEntry,
}

impl FileNode {
    pub(crate) fn new(ctx: &RevisionContext, entry: ManifestEntry) -> Self {
        Self {
            node: ctx.id,
            rev: ctx.number,
            entry,
        }
    }

    /// Revision id the file was looked up at
    pub fn node(&self) -> RevisionId {
        self.node
    }

    /// Local revision number
    pub fn rev(&self) -> i64 {
        self.rev
    }

    /// Full path of the file
    pub fn path(&self) -> &RepoPath {
        &self.entry.path
    }

    /// Manifest metadata (blob reference, size, mode)
    pub fn entry(&self) -> &ManifestEntry {
        &self.entry
    }
}

/// Outcome of resolving a request: a directory listing or a file
#[derive(Debug, Clone)]
pub enum StructureNode {
    /// Directory listing
    Manifest(ManifestNode),
    /// Single file
    File(FileNode),
}

impl StructureNode {
    /// Kind marker, `"manifest"` or `"file"`
    pub fn kind(&self) -> &'static str {
        match self {
            StructureNode::Manifest(_) => KIND_MANIFEST,
            StructureNode::File(_) => KIND_FILE,
        }
    }

    /// Revision id
    pub fn node(&self) -> RevisionId {
        match self {
            StructureNode::Manifest(m) => m.node,
            StructureNode::File(f) => f.node,
        }
    }

    /// The listing, if this is a directory node
    pub fn as_manifest(&self) -> Option<&ManifestNode> {
        match self {
            StructureNode::Manifest(m) => Some(m),
            StructureNode::File(_) => None,
        }
    }

    /// The file, if this is a file node
    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            StructureNode::File(f) => Some(f),
            StructureNode::Manifest(_) => None,
        }
    }
}

fn display_path(path: &RepoPath) -> String {
    format!("/{}", path.as_str())
}

impl Serialize for ManifestNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fentries: Vec<_> = self.fentries().collect();
        let dentries: Vec<_> = self.dentries().collect();

        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("node", &self.node)?;
        map.serialize_entry("", KIND_MANIFEST)?;
        map.serialize_entry("rev", &self.rev)?;
        map.serialize_entry("path", &self.path())?;
        map.serialize_entry("fentries", &fentries)?;
        map.serialize_entry("dentries", &dentries)?;
        map.end()
    }
}

impl Serialize for FileNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("node", &self.node)?;
        map.serialize_entry("", KIND_FILE)?;
        map.serialize_entry("rev", &self.rev)?;
        map.serialize_entry("path", &display_path(&self.entry.path))?;
        map.serialize_entry("size", &self.entry.size)?;
        map.serialize_entry("executable", &self.entry.executable)?;
        map.end()
    }
}

impl Serialize for StructureNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StructureNode::Manifest(m) => m.serialize(serializer),
            StructureNode::File(f) => f.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::manifest::tests::{entry, sample};
    use std::sync::Arc;

    #[test]
    fn test_manifest_node_serialization() {
        let structure = crate::structure::build(Arc::new(sample()), &["a"]).unwrap();
        let node = StructureNode::Manifest(ManifestNode::new(&RevisionContext::null(), structure));
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json[""], "manifest");
        assert_eq!(json["node"], "0".repeat(40));
        assert_eq!(json["rev"], -1);
        assert_eq!(json["path"], "/a");
        assert_eq!(json["fentries"].as_array().unwrap().len(), 2);
        assert_eq!(json["fentries"][0]["basename"], "b");
        assert_eq!(json["fentries"][0]["path"], "a/b");
        assert!(json["dentries"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_file_node_serialization() {
        let node = StructureNode::File(FileNode::new(&RevisionContext::null(), entry("dir/f", 9)));
        assert_eq!(node.kind(), KIND_FILE);
        assert!(node.as_manifest().is_none());

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json[""], "file");
        assert_eq!(json["path"], "/dir/f");
        assert_eq!(json["size"], 9);
        assert!(json.get("fentries").is_none());
    }

    #[test]
    fn test_root_node_of_empty_manifest() {
        let node = ManifestNode::new(
            &RevisionContext::null(),
            Structure::root(Arc::new(Manifest::default())),
        );
        assert_eq!(node.path(), "/");
        assert_eq!(node.fentries().count(), 0);
        assert_eq!(node.dentries().count(), 0);
    }
}
