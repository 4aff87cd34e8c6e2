//! Asset resolution and persisted storage for the Vivid runtime.
//!
//! [`AssetLoader`] finds shaders and resources across executable-relative
//! and project-relative search roots (`VIVID_ASSET_PATH` prepends more),
//! with in-memory caches that hot-reload clears. [`Storage`] is the small
//! JSON key/value file projects use to keep values across runs.

mod loader;
mod storage;

pub use loader::{AssetLoader, ASSET_PATH_ENV};
pub use storage::{Storage, StorageError};
