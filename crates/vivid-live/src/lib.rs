//! Live-coding support for the Vivid runtime: hot-reload of the user's
//! chain module and the editor bridge.
//!
//! A chain project is a small `cdylib` crate exporting `setup`/`update`
//! through [`vivid_chain!`]. [`HotReload`] watches the source, rebuilds
//! with the platform toolchain, and swaps the loaded module; state
//! preservation happens through the chain's snapshot API, driven by the
//! host around the swap. [`EditorBridge`] is the JSON-over-TCP channel to
//! external editors: compile status and introspection out, reload and
//! parameter commands in.
//!
//! Re-exports [`Chain`] and [`Context`] so chain projects can depend on
//! this crate alone.

mod bridge;
mod error;
mod module;
mod reload;

pub use bridge::{
    EditorBridge, EditorCommand, OperatorInfo, OutgoingMessage, ParamInfo, DEFAULT_EDITOR_PORT,
    EDITOR_PORT_ENV,
};
pub use error::LiveError;
pub use module::{ChainModule, LoadedChain, ABI_VERSION};
pub use reload::HotReload;

// Re-exported for the `vivid_chain!` macro and chain-project signatures.
pub use vivid_core::{Chain, Context};
