//! Error types for hot-reload and the editor bridge.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the live subsystem.
#[derive(Debug, Error)]
pub enum LiveError {
    /// The chain module failed to compile. The previous module stays live.
    #[error("CompileFailed: {0}")]
    CompileFailed(String),

    /// The compiled artifact could not be loaded.
    #[error("failed to load chain module '{path}': {message}")]
    LoadFailed {
        /// Artifact path.
        path: PathBuf,
        /// Loader diagnostics.
        message: String,
    },

    /// The module was built against a different engine ABI.
    #[error("chain module ABI {found} does not match host ABI {expected}; rebuild the project")]
    AbiMismatch {
        /// Host ABI version.
        expected: u32,
        /// Module ABI version.
        found: u32,
    },

    /// The build succeeded but the expected artifact is missing.
    #[error("build produced no artifact at '{0}'")]
    MissingArtifact(PathBuf),

    /// The project directory is not a loadable chain crate.
    #[error("invalid chain project '{path}': {message}")]
    InvalidProject {
        /// Project directory.
        path: PathBuf,
        /// What was wrong.
        message: String,
    },

    /// Filesystem failure.
    #[error("io error on '{path}': {source}")]
    Io {
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The editor bridge socket failed.
    #[error("editor bridge: {0}")]
    Bridge(#[source] std::io::Error),
}
