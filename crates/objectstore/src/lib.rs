//! Uniform file persistence (C1): local-disk and S3-compatible backends
//! behind the `core::ObjectStore` trait.

pub mod local;
pub mod s3;

pub use local::LocalDiskStore;
pub use s3::S3CompatibleStore;

use std::sync::Arc;

use config::{ObjectStoreBackend, ObjectStoreConfig};
use core::ObjectStore;

/// Construct the configured backend behind a trait object, the way the
/// `api` crate wires dependencies at startup without caring which backend is
/// live (§9 "ambient runtime state... represent as explicit dependencies").
#[must_use]
pub fn build(config: &ObjectStoreConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        ObjectStoreBackend::LocalDisk => {
            Arc::new(LocalDiskStore::new(config.local_root.clone(), config.scratch_dir.clone()))
        }
        ObjectStoreBackend::S3Compatible => {
            let endpoint = config.s3_endpoint.clone().unwrap_or_default();
            let bucket = config.s3_bucket.clone().unwrap_or_default();
            Arc::new(S3CompatibleStore::new(endpoint, bucket))
        }
    }
}
