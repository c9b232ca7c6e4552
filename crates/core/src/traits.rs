//! Trait boundaries shared across crates so implementations (local-disk vs.
//! remote object store; Postgres vs. a test double) can be swapped without
//! the caller knowing which is in play.

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Uniform file persistence contract (C1). `stored_ref` is opaque to
/// callers. `put` must be atomic with respect to readers: it either
/// completes in full or leaves no trace (§4.1, §8 property 5).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        logical_name: &str
    ) -> Result<String, errors::ObjectStoreError>;

    async fn open_reader(
        &self,
        stored_ref: &str
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>, errors::ObjectStoreError>;

    async fn delete(&self, stored_ref: &str) -> Result<(), errors::ObjectStoreError>;

    async fn size(&self, stored_ref: &str) -> Result<u64, errors::ObjectStoreError>;
}
