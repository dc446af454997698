//! Remote object store contract.
//!
//! The wire client (transport, auth, retries) lives outside this crate. It is
//! consumed through the [`ObjectStore`] trait. [`InMemoryStore`] implements the
//! trait for tests and simulations.

pub mod memory;
pub mod types;

pub use memory::InMemoryStore;
pub use types::{CreateRequest, ListRequest, ListResponse, ObjectMetadata, SYMLINK_TARGET_KEY};

use thiserror::Error;

/// Errors returned by an object store. Surfaced verbatim by every layer above.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("precondition failed for object: {name}")]
    PreconditionFailed { name: String },
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Operations consumed from the remote store.
///
/// Implementations own their timeouts and cancellation; callers add no
/// retries.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Fetch metadata for a single object.
    async fn stat_object(&self, name: &str) -> Result<ObjectMetadata, StoreError>;

    /// List objects whose names start with `req.prefix`, in name order,
    /// collapsing deeper names into prefixes when `req.delimiter` is set.
    async fn list_objects(&self, req: &ListRequest) -> Result<ListResponse, StoreError>;

    /// Create or overwrite an object, returning the new metadata.
    async fn create_object(&self, req: CreateRequest) -> Result<ObjectMetadata, StoreError>;

    /// Delete an object. Returns `NotFound` if there was nothing to delete.
    async fn delete_object(&self, name: &str) -> Result<(), StoreError>;
}
