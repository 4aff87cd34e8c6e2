//! Frame feedback accumulator.

use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};
use vivid_gpu::{GpuBackend, RenderPass, TextureHandle};

use crate::texture_op::{EffectPipeline, TextureTarget};

/// Blends each frame's input over a decaying copy of the previous output.
///
/// Ping-pongs between two internal targets: the last frame's result is a
/// read source while this frame's is the render target, which keeps the
/// write-target/read-source separation the backend requires.
pub struct Feedback {
    params: ParamSet,
    inputs: InputSlots,
    targets: [TextureTarget; 2],
    front: usize,
    pipeline: EffectPipeline,
}

impl Feedback {
    const P_DECAY: usize = 0;
    const P_ZOOM: usize = 1;

    /// Creates a feedback loop with 0.9 decay.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("decay", ParamKind::Float, 0.0, 0.999, [0.9, 0.0, 0.0, 0.0]);
        params.register("zoom", ParamKind::Float, 0.5, 2.0, [1.0, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("source", accepts::TEXTURE),
            targets: [TextureTarget::default(), TextureTarget::default()],
            front: 0,
            pipeline: EffectPipeline::new("feedback", include_str!("../shaders/feedback.wgsl")),
        }
    }

    /// Sets the trail decay per frame.
    pub fn decay(mut self, decay: f32) -> Self {
        self.params.set_float(Self::P_DECAY, decay);
        self
    }

    /// Sets the per-frame history zoom.
    pub fn zoom(mut self, zoom: f32) -> Self {
        self.params.set_float(Self::P_ZOOM, zoom);
        self
    }

    /// Connects the source texture (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }
}

impl Default for Feedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Feedback {
    fn type_name(&self) -> &'static str {
        "Feedback"
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
        self.targets[0].ensure(ctx, w, h);
        self.targets[1].ensure(ctx, w, h);
        self.pipeline.ensure(ctx);
    }

    fn process(&mut self, ctx: &mut Context, inputs: &Inputs) {
        let (w, h) = (ctx.width(), ctx.height());
        let back = 1 - self.front;
        let history = self.targets[self.front].ensure(ctx, w, h);
        let target = self.targets[back].ensure(ctx, w, h);
        let Some(pipeline) = self.pipeline.ensure(ctx) else {
            return;
        };
        let Some(source) = inputs.texture(0) else {
            return;
        };

        ctx.gpu().encoder().push_pass(RenderPass {
            label: "feedback",
            pipeline,
            target,
            sources: vec![source, history],
            uniforms: vec![
                self.params.float(Self::P_DECAY),
                self.params.float(Self::P_ZOOM),
            ],
        });
        self.front = back;
    }

    fn cleanup(&mut self, ctx: &mut Context) {
        self.targets[0].release(ctx);
        self.targets[1].release(ctx);
        self.pipeline.release(ctx);
        self.front = 0;
    }

    // Accumulates every frame by nature.

    fn texture_output(&self) -> Option<TextureHandle> {
        self.targets[self.front].handle()
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
