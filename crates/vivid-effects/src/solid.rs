//! Constant color fill.

use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{Context, Inputs, Operator, OperatorState, OutputKind};
use vivid_gpu::{GpuBackend, RenderPass, TextureHandle};

use crate::texture_op::{EffectPipeline, TextureTarget};

/// Fills its output with one RGBA color.
pub struct SolidColor {
    params: ParamSet,
    target: TextureTarget,
    pipeline: EffectPipeline,
}

impl SolidColor {
    const P_COLOR: usize = 0;

    /// Creates an opaque black fill.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("color", ParamKind::Color, 0.0, 1.0, [0.0, 0.0, 0.0, 1.0]);
        Self {
            params,
            target: TextureTarget::default(),
            pipeline: EffectPipeline::new("solid", include_str!("../shaders/solid.wgsl")),
        }
    }

    /// Sets the fill color.
    pub fn color(mut self, r: f32, g: f32, b: f32, a: f32) -> Self {
        self.params.set_raw(Self::P_COLOR, [r, g, b, a]);
        self
    }
}

impl Default for SolidColor {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for SolidColor {
    fn type_name(&self) -> &'static str {
        "SolidColor"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Texture
    }
    fn param_set(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }
    fn param_set_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }

    fn init(&mut self, ctx: &mut Context) {
        let (w, h) = (ctx.width(), ctx.height());
        self.target.ensure(ctx, w, h);
        self.pipeline.ensure(ctx);
    }

    fn process(&mut self, ctx: &mut Context, _inputs: &Inputs) {
        let (w, h) = (ctx.width(), ctx.height());
        let target = self.target.ensure(ctx, w, h);
        let Some(pipeline) = self.pipeline.ensure(ctx) else {
            return;
        };
        let color = self.params.raw(Self::P_COLOR);
        ctx.gpu().encoder().push_pass(RenderPass {
            label: "solid",
            pipeline,
            target,
            sources: vec![],
            uniforms: color.to_vec(),
        });
    }

    fn cleanup(&mut self, ctx: &mut Context) {
        self.target.release(ctx);
        self.pipeline.release(ctx);
    }

    fn needs_cook(&self, _ctx: &Context) -> bool {
        false
    }

    fn texture_output(&self) -> Option<TextureHandle> {
        self.target.handle()
    }

    fn save_state(&self) -> Option<Box<dyn OperatorState>> {
        Some(Box::new(self.params.save_values()))
    }
    fn load_state(&mut self, state: Box<dyn OperatorState>) {
        if let Some(values) = downcast_state::<ParamValues>(state) {
            self.params.apply_values(&values);
        }
    }
}
