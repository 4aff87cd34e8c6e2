//! Per-frame command recording.
//!
//! Operators do not call into the graphics API. They append [`RenderPass`]
//! records to the frame's [`CommandEncoder`]; the backend translates the
//! recorded passes at [`submit`](crate::GpuBackend::submit) time. Recording
//! keeps operator `process` synchronous and single-threaded, which is what
//! lets the scheduler dispatch GPU work without locking.

use crate::texture::{PipelineHandle, TextureHandle};

/// Maximum number of source textures a single pass may bind.
///
/// Matches the operator input-slot limit; a fixed bound keeps pass records
/// small and lets backends size bind groups statically.
pub const MAX_PASS_SOURCES: usize = 8;

/// One recorded fullscreen render pass.
///
/// The uniform block is an opaque run of floats; each pipeline's WGSL
/// declares the matching struct. Sources bind in slot order.
#[derive(Clone, Debug)]
pub struct RenderPass {
    /// Debug label, shown in captures and backend logs.
    pub label: &'static str,
    /// Compiled pipeline to run.
    pub pipeline: PipelineHandle,
    /// Render target. Must not also appear in `sources`.
    pub target: TextureHandle,
    /// Source textures, bound in order.
    pub sources: Vec<TextureHandle>,
    /// Uniform data pushed to the pipeline's uniform buffer.
    pub uniforms: Vec<f32>,
}

/// Per-frame list of recorded passes.
///
/// Owned by the backend, handed out through
/// [`GpuBackend::encoder`](crate::GpuBackend::encoder), cleared by
/// `begin_frame`.
#[derive(Default)]
pub struct CommandEncoder {
    passes: Vec<RenderPass>,
}

impl CommandEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pass at the end of the frame's list.
    pub fn push_pass(&mut self, pass: RenderPass) {
        debug_assert!(
            pass.sources.len() <= MAX_PASS_SOURCES,
            "pass '{}' binds {} sources (max {})",
            pass.label,
            pass.sources.len(),
            MAX_PASS_SOURCES
        );
        debug_assert!(
            !pass.sources.contains(&pass.target),
            "pass '{}' reads its own render target",
            pass.label
        );
        self.passes.push(pass);
    }

    /// Number of passes recorded this frame.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Recorded passes, in submission order.
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    /// Removes and returns all recorded passes.
    pub fn drain(&mut self) -> Vec<RenderPass> {
        std::mem::take(&mut self.passes)
    }

    /// Discards all recorded passes.
    pub fn clear(&mut self) {
        self.passes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_drain() {
        let mut enc = CommandEncoder::new();
        enc.push_pass(RenderPass {
            label: "noise",
            pipeline: PipelineHandle(1),
            target: TextureHandle(2),
            sources: vec![],
            uniforms: vec![4.0, 0.5],
        });
        enc.push_pass(RenderPass {
            label: "blur",
            pipeline: PipelineHandle(3),
            target: TextureHandle(4),
            sources: vec![TextureHandle(2)],
            uniforms: vec![5.0],
        });
        assert_eq!(enc.pass_count(), 2);

        let drained = enc.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].label, "noise");
        assert_eq!(drained[1].sources, vec![TextureHandle(2)]);
        assert_eq!(enc.pass_count(), 0);
    }
}
