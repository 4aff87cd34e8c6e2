//! Shared plumbing for texture operators: output targets and pipelines.

use vivid_core::Context;
use vivid_gpu::{GpuBackend, PipelineHandle, TextureDesc, TextureHandle, EFFECTS_FORMAT};

use vivid_assets::AssetLoader;

/// A backend texture sized to the frame, recreated on resize.
#[derive(Default)]
pub(crate) struct TextureTarget {
    texture: Option<TextureHandle>,
    width: u32,
    height: u32,
}

impl TextureTarget {
    /// Returns a texture of the requested size, releasing and recreating
    /// if the frame was resized.
    pub fn ensure(&mut self, ctx: &mut Context, width: u32, height: u32) -> TextureHandle {
        if let Some(texture) = self.texture
            && (self.width != width || self.height != height)
        {
            ctx.gpu().release_texture(texture);
            self.texture = None;
        }
        if let Some(texture) = self.texture {
            return texture;
        }
        self.width = width;
        self.height = height;
        let texture = ctx.gpu().create_texture(&TextureDesc {
            width,
            height,
            format: EFFECTS_FORMAT,
        });
        self.texture = Some(texture);
        texture
    }

    /// The current texture, if allocated.
    pub fn handle(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Releases the texture. Idempotent.
    pub fn release(&mut self, ctx: &mut Context) {
        if let Some(texture) = self.texture.take() {
            ctx.gpu().release_texture(texture);
        }
    }
}

/// A lazily compiled pipeline with asset-override shader lookup.
///
/// The built-in WGSL is compiled into the binary; if the asset loader
/// resolves `shaders/<name>.wgsl`, that file wins — which is what makes
/// shader edits land with a project reload instead of a rebuild.
pub(crate) struct EffectPipeline {
    name: &'static str,
    builtin: &'static str,
    pipeline: Option<PipelineHandle>,
    failed: bool,
}

impl EffectPipeline {
    /// Declares a pipeline with its embedded WGSL source.
    pub fn new(name: &'static str, builtin: &'static str) -> Self {
        Self {
            name,
            builtin,
            pipeline: None,
            failed: false,
        }
    }

    /// Compiles on first use; returns `None` (once-warned) on failure.
    pub fn ensure(&mut self, ctx: &mut Context) -> Option<PipelineHandle> {
        if let Some(pipeline) = self.pipeline {
            return Some(pipeline);
        }
        if self.failed {
            return None;
        }
        let source = AssetLoader::global()
            .load_text(&format!("shaders/{}.wgsl", self.name))
            .unwrap_or_else(|| self.builtin.to_string());
        match ctx.gpu().create_pipeline(self.name, &source) {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                Some(pipeline)
            }
            Err(err) => {
                tracing::warn!(shader = self.name, %err, "pipeline compile failed");
                self.failed = true;
                None
            }
        }
    }

    /// Releases the pipeline and allows recompilation. Idempotent.
    pub fn release(&mut self, ctx: &mut Context) {
        if let Some(pipeline) = self.pipeline.take() {
            ctx.gpu().release_pipeline(pipeline);
        }
        self.failed = false;
    }
}
