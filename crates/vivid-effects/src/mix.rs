//! Two-input blend.

use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};
use vivid_gpu::{GpuBackend, RenderPass, TextureHandle};

use crate::texture_op::{EffectPipeline, TextureTarget};

/// Blend mode for [`Mix`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    /// Linear crossfade.
    Mix,
    /// Additive.
    Add,
    /// Multiplicative.
    Multiply,
    /// Screen.
    Screen,
    /// Absolute difference.
    Difference,
}

impl BlendMode {
    fn index(self) -> f32 {
        match self {
            BlendMode::Mix => 0.0,
            BlendMode::Add => 1.0,
            BlendMode::Multiply => 2.0,
            BlendMode::Screen => 3.0,
            BlendMode::Difference => 4.0,
        }
    }
}

/// Blends inputs `a` and `b`. With only `a` connected it passes `a`
/// through (amount has nothing to blend toward).
pub struct Mix {
    params: ParamSet,
    inputs: InputSlots,
    mode: BlendMode,
    target: TextureTarget,
    pipeline: EffectPipeline,
}

impl Mix {
    const P_AMOUNT: usize = 0;

    /// Creates a 50/50 crossfade.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("amount", ParamKind::Float, 0.0, 1.0, [0.5, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new()
                .slot("a", accepts::TEXTURE)
                .slot("b", accepts::TEXTURE),
            mode: BlendMode::Mix,
            target: TextureTarget::default(),
            pipeline: EffectPipeline::new("mix", include_str!("../shaders/mix.wgsl")),
        }
    }

    /// Sets the blend amount (0 = all `a`, 1 = full mode result).
    pub fn amount(mut self, amount: f32) -> Self {
        self.params.set_float(Self::P_AMOUNT, amount);
        self
    }

    /// Selects the blend mode.
    pub fn mode(mut self, mode: BlendMode) -> Self {
        self.mode = mode;
        self
    }

    /// Connects input `a` (builder form).
    pub fn input_a(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }

    /// Connects input `b` (builder form).
    pub fn input_b(mut self, name: &str) -> Self {
        self.inputs.connect(1, name);
        self
    }
}

impl Default for Mix {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Mix {
    fn type_name(&self) -> &'static str {
        "Mix"
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
        let (a, b) = (inputs.texture(0), inputs.texture(1));
        let (Some(a), Some(b)) = (a, b) else {
            // A single connected input passes through via a degenerate
            // blend; none connected leaves the previous contents.
            if let Some(single) = a.or(b) {
                ctx.gpu().encoder().push_pass(RenderPass {
                    label: "mix_pass",
                    pipeline,
                    target,
                    sources: vec![single, single],
                    uniforms: vec![0.0, BlendMode::Mix.index()],
                });
            }
            return;
        };

        ctx.gpu().encoder().push_pass(RenderPass {
            label: "mix",
            pipeline,
            target,
            sources: vec![a, b],
            uniforms: vec![self.params.float(Self::P_AMOUNT), self.mode.index()],
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
