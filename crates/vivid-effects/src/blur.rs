//! Separable gaussian blur.

use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};
use vivid_gpu::{GpuBackend, RenderPass, TextureHandle};

use crate::texture_op::{EffectPipeline, TextureTarget};

/// Two-pass gaussian blur.
///
/// Records a horizontal pass into a scratch target and a vertical pass
/// into the output. With an absent input the output is cleared black.
pub struct Blur {
    params: ParamSet,
    inputs: InputSlots,
    scratch: TextureTarget,
    target: TextureTarget,
    pipeline: EffectPipeline,
}

impl Blur {
    const P_RADIUS: usize = 0;

    /// Creates a blur with radius 5.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("radius", ParamKind::Float, 0.0, 50.0, [5.0, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("source", accepts::TEXTURE),
            scratch: TextureTarget::default(),
            target: TextureTarget::default(),
            pipeline: EffectPipeline::new("blur", include_str!("../shaders/blur.wgsl")),
        }
    }

    /// Sets the blur radius in pixels.
    pub fn radius(mut self, radius: f32) -> Self {
        self.params.set_float(Self::P_RADIUS, radius);
        self
    }

    /// Connects the source texture (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }
}

impl Default for Blur {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Blur {
    fn type_name(&self) -> &'static str {
        "Blur"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Texture
    }
    fn inputs(&self) -> Option<&InputSlots> {
        Some(&self.inputs)
    }
    fn inputs_mut(&mut self) -> Option<&mut InputSlots> {
        Some(&mut self.inputs)
    }
    fn param_set(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }
    fn param_set_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }

    fn init(&mut self, ctx: &mut Context) {
        let (w, h) = (ctx.width(), ctx.height());
        self.scratch.ensure(ctx, w, h);
        self.target.ensure(ctx, w, h);
        self.pipeline.ensure(ctx);
    }

    fn process(&mut self, ctx: &mut Context, inputs: &Inputs) {
        let (w, h) = (ctx.width(), ctx.height());
        let scratch = self.scratch.ensure(ctx, w, h);
        let target = self.target.ensure(ctx, w, h);
        let Some(pipeline) = self.pipeline.ensure(ctx) else {
            return;
        };
        let Some(source) = inputs.texture(0) else {
            return;
        };

        let radius = self.params.float(Self::P_RADIUS);
        ctx.gpu().encoder().push_pass(RenderPass {
            label: "blur_h",
            pipeline,
            target: scratch,
            sources: vec![source],
            uniforms: vec![radius, 1.0, 0.0],
        });
        ctx.gpu().encoder().push_pass(RenderPass {
            label: "blur_v",
            pipeline,
            target,
            sources: vec![scratch],
            uniforms: vec![radius, 0.0, 1.0],
        });
    }

    fn cleanup(&mut self, ctx: &mut Context) {
        self.scratch.release(ctx);
        self.target.release(ctx);
        self.pipeline.release(ctx);
    }

    fn needs_cook(&self, _ctx: &Context) -> bool {
        // Pure function of the input and radius.
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
