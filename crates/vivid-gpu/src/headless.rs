//! Resource-tracking backend with no rendering.
//!
//! [`HeadlessBackend`] implements the full [`GpuBackend`] protocol against
//! in-memory tables. It is the collaborator used by the test suites and by
//! offline rendering, where pass bookkeeping matters but pixels do not.

use std::collections::HashMap;

use crate::backend::{GpuBackend, GpuError};
use crate::encoder::CommandEncoder;
use crate::texture::{PipelineHandle, TextureDesc, TextureHandle, WriteLayout};

/// A [`GpuBackend`] that tracks resources and counts work without a device.
#[derive(Default)]
pub struct HeadlessBackend {
    textures: HashMap<u64, TextureDesc>,
    pipelines: HashMap<u64, String>,
    encoder: CommandEncoder,
    next_texture: u64,
    next_pipeline: u64,
    queued_writes: usize,
    submitted_passes: usize,
    submit_count: usize,
    presented: Option<TextureHandle>,
}

impl HeadlessBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of live pipelines.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Total passes executed across all submits.
    pub fn submitted_passes(&self) -> usize {
        self.submitted_passes
    }

    /// Number of submits.
    pub fn submit_count(&self) -> usize {
        self.submit_count
    }

    /// Texture writes queued so far.
    pub fn queued_writes(&self) -> usize {
        self.queued_writes
    }

    /// The most recently presented texture, if any.
    pub fn presented(&self) -> Option<TextureHandle> {
        self.presented
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        self.next_texture += 1;
        self.textures.insert(self.next_texture, *desc);
        TextureHandle(self.next_texture)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_none() {
            tracing::warn!(handle = texture.0, "released unknown texture");
        }
    }

    fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc> {
        self.textures.get(&texture.0).copied()
    }

    fn create_pipeline(&mut self, label: &str, source: &str) -> Result<PipelineHandle, GpuError> {
        // No compiler here; an empty module is the one error worth modelling.
        if source.trim().is_empty() {
            return Err(GpuError::ShaderCompile {
                label: label.to_string(),
                message: "empty shader source".to_string(),
            });
        }
        self.next_pipeline += 1;
        self.pipelines.insert(self.next_pipeline, label.to_string());
        Ok(PipelineHandle(self.next_pipeline))
    }

    fn release_pipeline(&mut self, pipeline: PipelineHandle) {
        if self.pipelines.remove(&pipeline.0).is_none() {
            tracing::warn!(handle = pipeline.0, "released unknown pipeline");
        }
    }

    fn queue_write_texture(&mut self, texture: TextureHandle, _bytes: &[u8], _layout: WriteLayout) {
        if !self.textures.contains_key(&texture.0) {
            tracing::warn!(handle = texture.0, "write queued to unknown texture");
            return;
        }
        self.queued_writes += 1;
    }

    fn begin_frame(&mut self) {
        self.encoder.clear();
    }

    fn encoder(&mut self) -> &mut CommandEncoder {
        &mut self.encoder
    }

    fn submit(&mut self) {
        self.submitted_passes += self.encoder.pass_count();
        self.submit_count += 1;
        self.encoder.clear();
    }

    fn present(&mut self, texture: TextureHandle) {
        self.presented = Some(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::RenderPass;

    #[test]
    fn texture_lifecycle() {
        let mut gpu = HeadlessBackend::new();
        let desc = TextureDesc::new(640, 360);
        let tex = gpu.create_texture(&desc);
        assert_eq!(gpu.texture_desc(tex), Some(desc));
        assert_eq!(gpu.texture_count(), 1);

        gpu.release_texture(tex);
        assert_eq!(gpu.texture_count(), 0);
        assert_eq!(gpu.texture_desc(tex), None);
    }

    #[test]
    fn handles_are_not_reused() {
        let mut gpu = HeadlessBackend::new();
        let a = gpu.create_texture(&TextureDesc::new(8, 8));
        gpu.release_texture(a);
        let b = gpu.create_texture(&TextureDesc::new(8, 8));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_shader_is_rejected() {
        let mut gpu = HeadlessBackend::new();
        assert!(gpu.create_pipeline("bad", "   ").is_err());
        assert!(gpu.create_pipeline("ok", "@fragment fn main() {}").is_ok());
    }

    #[test]
    fn submit_counts_passes_and_clears() {
        let mut gpu = HeadlessBackend::new();
        let pipeline = gpu.create_pipeline("p", "fn main() {}").unwrap();
        let target = gpu.create_texture(&TextureDesc::new(4, 4));

        gpu.begin_frame();
        gpu.encoder().push_pass(RenderPass {
            label: "p",
            pipeline,
            target,
            sources: vec![],
            uniforms: vec![],
        });
        gpu.submit();
        gpu.present(target);

        assert_eq!(gpu.submitted_passes(), 1);
        assert_eq!(gpu.submit_count(), 1);
        assert_eq!(gpu.presented(), Some(target));

        gpu.begin_frame();
        gpu.submit();
        assert_eq!(gpu.submitted_passes(), 1);
        assert_eq!(gpu.submit_count(), 2);
    }
}
