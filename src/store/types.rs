//! Request and metadata types exchanged with the object store.
//!
//! Structs use camelCase serialization to match the JSON form of bucket
//! listings.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// User metadata key marking an object as a symlink; the value is the target.
pub const SYMLINK_TARGET_KEY: &str = "bucketfs_symlink_target";

/// Snapshot of an object's metadata at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    pub size: u64,
    /// Changes whenever the object's content changes.
    pub generation: i64,
    /// Changes whenever the object's metadata changes.
    pub meta_generation: i64,
    pub updated: SystemTime,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn symlink_target(&self) -> Option<&str> {
        self.metadata.get(SYMLINK_TARGET_KEY).map(String::as_str)
    }

    pub fn is_symlink(&self) -> bool {
        self.symlink_target().is_some()
    }
}

/// Parameters for `ObjectStore::list_objects`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// Collapse names that contain the delimiter after `prefix` into a single
    /// entry of [`ListResponse::prefixes`], ending at the first delimiter.
    pub delimiter: Option<String>,
    /// With a delimiter, also return objects whose name ends at the first
    /// delimiter (directory markers).
    pub include_trailing_delimiter: bool,
    /// Stop after this many objects plus prefixes. `None` lists everything.
    pub max_results: Option<usize>,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// One level of a `/`-separated hierarchy, markers included.
    pub fn children_of(prefix: impl Into<String>) -> Self {
        Self::new(prefix).with_delimiter("/").include_trailing_delimiter()
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn include_trailing_delimiter(mut self) -> Self {
        self.include_trailing_delimiter = true;
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// Result of `ObjectStore::list_objects`, both lists in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub objects: Vec<ObjectMetadata>,
    /// Collapsed name prefixes, each ending with the delimiter.
    #[serde(default)]
    pub prefixes: Vec<String>,
}

impl ListResponse {
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }
}

/// Parameters for `ObjectStore::create_object`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    pub name: String,
    pub contents: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    /// Create only if the object's current generation matches. Zero means
    /// "must not exist".
    pub generation_precondition: Option<i64>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            metadata: BTreeMap::new(),
            generation_precondition: None,
        }
    }

    /// Fail with `PreconditionFailed` if the object already exists.
    pub fn if_absent(mut self) -> Self {
        self.generation_precondition = Some(0);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
