//! Unified hierarchical store abstraction.
//!
//! Every scanned source is some tree of named nodes carrying scalar fields:
//! the OS registry, a directory tree, a JSON document, a parsed key/value
//! manifest. Each historically grew its own ad hoc walking code; here they
//! all sit behind one [`SourceNode`] trait so the search predicates in
//! [`crate::search`] work uniformly over any of them.
//!
//! Handles are short-lived: a traversal reads what it needs out of a node
//! into a [`NodeSnapshot`] the moment it visits it, and never hands a live
//! cursor to a caller.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::kvtext::KvNode;

/// Per-node access failure. Searches catch these and skip the node; they
/// never abort a whole traversal.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("access failed: {0}")]
    Access(String),
}

impl From<NodeError> for crate::Error {
    fn from(e: NodeError) -> Self {
        crate::Error::Node(e.to_string())
    }
}

/// Opaque handle into one node of a hierarchical store.
pub trait SourceNode: Sized {
    /// Name of this node within its parent.
    fn name(&self) -> String;

    /// Names of the child nodes.
    fn child_names(&self) -> Result<Vec<String>, NodeError>;

    /// Open one child by name.
    fn open_child(&self, name: &str) -> Result<Self, NodeError>;

    /// Names of the scalar fields on this node.
    fn scalar_names(&self) -> Result<Vec<String>, NodeError>;

    /// String value of one scalar field.
    fn scalar(&self, field: &str) -> Result<String, NodeError>;

    /// Integer value of one scalar field. Stores without typed integers
    /// fall back to parsing the string form.
    fn int(&self, field: &str) -> Result<i64, NodeError> {
        let raw = self.scalar(field)?;
        raw.trim()
            .parse()
            .map_err(|_| NodeError::Access(format!("field {field} is not an integer")))
    }
}

/// Plain-value copy of a node taken at visit time. This is what searches
/// emit; live handles stay inside the traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub name: String,
    pub scalars: BTreeMap<String, String>,
}

impl NodeSnapshot {
    /// Copy the name and every readable scalar out of a node. Fields that
    /// fail to read are simply absent from the snapshot.
    pub fn capture<N: SourceNode>(node: &N) -> Self {
        let mut scalars = BTreeMap::new();
        if let Ok(names) = node.scalar_names() {
            for name in names {
                if let Ok(value) = node.scalar(&name) {
                    scalars.insert(name, value);
                }
            }
        }
        Self {
            name: node.name(),
            scalars,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.scalars.get(field).map(String::as_str)
    }
}

/// A filesystem directory tree viewed as a hierarchical store: child nodes
/// are subdirectories, scalar fields are regular files (the field value is
/// the file's contents with trailing whitespace trimmed).
#[derive(Debug, Clone)]
pub struct FsNode {
    path: PathBuf,
}

impl FsNode {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn entries(&self, want_dirs: bool) -> Result<Vec<String>, NodeError> {
        let entries =
            fs::read_dir(&self.path).map_err(|e| NodeError::Access(e.to_string()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| NodeError::Access(e.to_string()))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| NodeError::Access(e.to_string()))?
                .is_dir();
            if is_dir == want_dirs {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl SourceNode for FsNode {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    fn child_names(&self) -> Result<Vec<String>, NodeError> {
        self.entries(true)
    }

    fn open_child(&self, name: &str) -> Result<Self, NodeError> {
        let path = self.path.join(name);
        if path.is_dir() {
            Ok(Self { path })
        } else {
            Err(NodeError::NotFound(path.to_string_lossy().into_owned()))
        }
    }

    fn scalar_names(&self) -> Result<Vec<String>, NodeError> {
        self.entries(false)
    }

    fn scalar(&self, field: &str) -> Result<String, NodeError> {
        let path = self.path.join(field);
        if !path.is_file() {
            return Err(NodeError::NotFound(path.to_string_lossy().into_owned()));
        }
        let text = fs::read_to_string(&path).map_err(|e| NodeError::Access(e.to_string()))?;
        Ok(text.trim_end().to_string())
    }
}

/// A JSON document viewed as a hierarchical store: child nodes are nested
/// objects (and array elements, named by index), scalar fields are
/// primitive members.
#[derive(Debug, Clone)]
pub struct JsonNode {
    name: String,
    value: serde_json::Value,
}

impl JsonNode {
    pub fn from_value(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn parse(name: impl Into<String>, text: &str) -> crate::Result<Self> {
        Ok(Self::from_value(name, serde_json::from_str(text)?))
    }

    fn members(&self) -> Vec<(String, &serde_json::Value)> {
        match &self.value {
            serde_json::Value::Object(map) => {
                map.iter().map(|(k, v)| (k.clone(), v)).collect()
            }
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null => Some(String::new()),
        _ => None,
    }
}

impl SourceNode for JsonNode {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn child_names(&self) -> Result<Vec<String>, NodeError> {
        Ok(self
            .members()
            .into_iter()
            .filter(|(_, v)| v.is_object() || v.is_array())
            .map(|(k, _)| k)
            .collect())
    }

    fn open_child(&self, name: &str) -> Result<Self, NodeError> {
        self.members()
            .into_iter()
            .find(|(k, v)| k == name && (v.is_object() || v.is_array()))
            .map(|(k, v)| Self::from_value(k, v.clone()))
            .ok_or_else(|| NodeError::NotFound(name.to_string()))
    }

    fn scalar_names(&self) -> Result<Vec<String>, NodeError> {
        Ok(self
            .members()
            .into_iter()
            .filter(|(_, v)| json_scalar(v).is_some())
            .map(|(k, _)| k)
            .collect())
    }

    fn scalar(&self, field: &str) -> Result<String, NodeError> {
        self.members()
            .into_iter()
            .find(|(k, _)| k == field)
            .and_then(|(_, v)| json_scalar(v))
            .ok_or_else(|| NodeError::NotFound(field.to_string()))
    }
}

/// A parsed key/value manifest viewed as a hierarchical store.
#[derive(Debug, Clone)]
pub struct KvTreeNode {
    name: String,
    block: KvNode,
}

impl KvTreeNode {
    pub fn new(name: impl Into<String>, block: KvNode) -> Self {
        Self {
            name: name.into(),
            block,
        }
    }
}

impl SourceNode for KvTreeNode {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn child_names(&self) -> Result<Vec<String>, NodeError> {
        Ok(self.block.children.keys().cloned().collect())
    }

    fn open_child(&self, name: &str) -> Result<Self, NodeError> {
        self.block
            .children
            .get(name)
            .map(|child| Self::new(name, child.clone()))
            .ok_or_else(|| NodeError::NotFound(name.to_string()))
    }

    fn scalar_names(&self) -> Result<Vec<String>, NodeError> {
        Ok(self.block.scalars.keys().cloned().collect())
    }

    fn scalar(&self, field: &str) -> Result<String, NodeError> {
        self.block
            .scalars
            .get(field)
            .cloned()
            .ok_or_else(|| NodeError::NotFound(field.to_string()))
    }
}

/// The OS registry viewed as a hierarchical store.
#[cfg(target_os = "windows")]
pub mod registry {
    use winreg::RegKey;

    use super::{NodeError, SourceNode};

    pub struct RegistryNode {
        name: String,
        key: RegKey,
    }

    impl RegistryNode {
        pub fn new(name: impl Into<String>, key: RegKey) -> Self {
            Self {
                name: name.into(),
                key,
            }
        }

        /// Open a node under a predefined hive, e.g.
        /// `HKEY_LOCAL_MACHINE` + `SOFTWARE\...\Uninstall`.
        pub fn open(hive: RegKey, path: &str) -> Result<Self, NodeError> {
            let key = hive
                .open_subkey(path)
                .map_err(|e| NodeError::Access(e.to_string()))?;
            let name = path.rsplit('\\').next().unwrap_or(path).to_string();
            Ok(Self { name, key })
        }
    }

    impl SourceNode for RegistryNode {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn child_names(&self) -> Result<Vec<String>, NodeError> {
            Ok(self.key.enum_keys().filter_map(|k| k.ok()).collect())
        }

        fn open_child(&self, name: &str) -> Result<Self, NodeError> {
            let key = self
                .key
                .open_subkey(name)
                .map_err(|e| NodeError::Access(e.to_string()))?;
            Ok(Self::new(name, key))
        }

        fn scalar_names(&self) -> Result<Vec<String>, NodeError> {
            Ok(self
                .key
                .enum_values()
                .filter_map(|v| v.ok())
                .map(|(name, _)| name)
                .collect())
        }

        fn scalar(&self, field: &str) -> Result<String, NodeError> {
            self.key
                .get_value::<String, _>(field)
                .map_err(|e| NodeError::NotFound(format!("{field}: {e}")))
        }

        fn int(&self, field: &str) -> Result<i64, NodeError> {
            self.key
                .get_value::<u32, _>(field)
                .map(i64::from)
                .map_err(|e| NodeError::NotFound(format!("{field}: {e}")))
        }
    }
}
