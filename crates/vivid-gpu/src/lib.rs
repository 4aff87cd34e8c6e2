//! GPU backend interface for the Vivid runtime.
//!
//! The engine never talks to a graphics API directly. Texture operators
//! record [`RenderPass`] instructions into a per-frame [`CommandEncoder`],
//! and the host supplies a [`GpuBackend`] that owns texture storage,
//! compiles pipelines, and translates the recorded passes into real GPU
//! work at submit time.
//!
//! Two backends matter in practice:
//!
//! - the host's windowed backend (wgpu, Metal, whatever the host embeds) —
//!   out of scope for this workspace;
//! - [`HeadlessBackend`], which tracks resources and pass counts without
//!   rendering anything. It backs the test suites and the offline
//!   `vivid render` path.
//!
//! Resource handles are plain integers. The backend is the single owner of
//! the resources behind them; operators own *handles* and release them in
//! `cleanup`.

mod backend;
mod encoder;
mod headless;
mod texture;

pub use backend::{GpuBackend, GpuError};
pub use encoder::{CommandEncoder, RenderPass, MAX_PASS_SOURCES};
pub use headless::HeadlessBackend;
pub use texture::{PipelineHandle, TextureDesc, TextureFormat, TextureHandle, WriteLayout};

/// Texture format used for intermediate effect chains.
///
/// Half-float keeps highlight and feedback chains from clipping between
/// passes; the final present converts to the surface format.
pub const EFFECTS_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
