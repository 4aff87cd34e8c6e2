//! Hue/saturation/value adjustment.

use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};
use vivid_gpu::{GpuBackend, RenderPass, TextureHandle};

use crate::texture_op::{EffectPipeline, TextureTarget};

/// Shifts hue and scales saturation/value of its input.
pub struct Hsv {
    params: ParamSet,
    inputs: InputSlots,
    target: TextureTarget,
    pipeline: EffectPipeline,
}

impl Hsv {
    const P_HUE_SHIFT: usize = 0;
    const P_SATURATION: usize = 1;
    const P_VALUE: usize = 2;

    /// Creates a pass-through adjustment (no shift, unity scales).
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("hue_shift", ParamKind::Float, 0.0, 1.0, [0.0; 4]);
        params.register("saturation", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("value", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("source", accepts::TEXTURE),
            target: TextureTarget::default(),
            pipeline: EffectPipeline::new("hsv", include_str!("../shaders/hsv.wgsl")),
        }
    }

    /// Shifts hue by 0–1 (wraps around the color wheel).
    pub fn hue_shift(mut self, shift: f32) -> Self {
        self.params.set_float(Self::P_HUE_SHIFT, shift);
        self
    }

    /// Scales saturation (0 = grayscale).
    pub fn saturation(mut self, saturation: f32) -> Self {
        self.params.set_float(Self::P_SATURATION, saturation);
        self
    }

    /// Scales brightness.
    pub fn value(mut self, value: f32) -> Self {
        self.params.set_float(Self::P_VALUE, value);
        self
    }

    /// Connects the source texture (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }
}

impl Default for Hsv {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Hsv {
    fn type_name(&self) -> &'static str {
        "Hsv"
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
        self.target.ensure(ctx, w, h);
        self.pipeline.ensure(ctx);
    }

    fn process(&mut self, ctx: &mut Context, inputs: &Inputs) {
        let (w, h) = (ctx.width(), ctx.height());
        let target = self.target.ensure(ctx, w, h);
        let Some(pipeline) = self.pipeline.ensure(ctx) else {
            return;
        };
        let Some(source) = inputs.texture(0) else {
            return;
        };
        ctx.gpu().encoder().push_pass(RenderPass {
            label: "hsv",
            pipeline,
            target,
            sources: vec![source],
            uniforms: vec![
                self.params.float(Self::P_HUE_SHIFT),
                self.params.float(Self::P_SATURATION),
                self.params.float(Self::P_VALUE),
            ],
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
