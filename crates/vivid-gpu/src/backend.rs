//! The backend trait the host implements.

use thiserror::Error;

use crate::encoder::CommandEncoder;
use crate::texture::{PipelineHandle, TextureDesc, TextureHandle, WriteLayout};

/// Errors reported by a GPU backend.
#[derive(Debug, Error)]
pub enum GpuError {
    /// A handle did not refer to a live resource.
    #[error("invalid {kind} handle {index}")]
    InvalidHandle {
        /// Resource kind ("texture" or "pipeline").
        kind: &'static str,
        /// Raw handle value.
        index: u64,
    },

    /// Shader source failed to compile.
    #[error("shader '{label}' failed to compile: {message}")]
    ShaderCompile {
        /// Pipeline label.
        label: String,
        /// Compiler diagnostics.
        message: String,
    },
}

/// Host-provided graphics collaborator.
///
/// One backend instance serves one session. All calls happen on the main
/// thread; the per-frame protocol is `begin_frame` → operator recording via
/// [`encoder`](Self::encoder) → `submit` → `present`.
///
/// Texture contents follow the engine's sharing rule: a texture is written
/// by the single pass that targets it and is read-only to every pass that
/// binds it as a source.
///
/// The `Any` supertrait lets a host recover its concrete backend from the
/// context when it needs API-specific calls (surface configuration,
/// readback) the engine does not model.
pub trait GpuBackend: std::any::Any {
    /// Allocates a texture and returns its handle.
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle;

    /// Releases a texture. Releasing an unknown handle is a logged no-op.
    fn release_texture(&mut self, texture: TextureHandle);

    /// Looks up the description a texture was created with.
    fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc>;

    /// Compiles WGSL source into a render pipeline.
    fn create_pipeline(&mut self, label: &str, source: &str) -> Result<PipelineHandle, GpuError>;

    /// Releases a pipeline. Releasing an unknown handle is a logged no-op.
    fn release_pipeline(&mut self, pipeline: PipelineHandle);

    /// Schedules a CPU→GPU copy into `texture` before the next submit.
    fn queue_write_texture(&mut self, texture: TextureHandle, bytes: &[u8], layout: WriteLayout);

    /// Starts a frame: clears the shared encoder.
    fn begin_frame(&mut self);

    /// The frame's shared encoder. Operators record passes here.
    fn encoder(&mut self) -> &mut CommandEncoder;

    /// Executes all recorded passes and queued writes.
    fn submit(&mut self);

    /// Presents `texture` as the frame's visual output.
    fn present(&mut self, texture: TextureHandle);
}
