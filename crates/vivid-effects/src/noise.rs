//! Fractal noise generator.

use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{Context, Inputs, Operator, OperatorState, OutputKind};
use vivid_gpu::{GpuBackend, RenderPass, TextureHandle};

use crate::texture_op::{EffectPipeline, TextureTarget};

/// Noise algorithm selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseType {
    /// Classic gradient noise.
    Perlin,
    /// Improved gradient noise, fewer artifacts.
    Simplex,
    /// Cellular/Voronoi patterns.
    Worley,
    /// Interpolated random values, blocky.
    Value,
}

impl NoiseType {
    fn index(self) -> f32 {
        match self {
            NoiseType::Perlin => 0.0,
            NoiseType::Simplex => 1.0,
            NoiseType::Worley => 2.0,
            NoiseType::Value => 3.0,
        }
    }
}

/// Animated fractal noise texture.
///
/// ```rust,ignore
/// chain.add("noise", Noise::new().scale(4.0).speed(0.5).octaves(4))?;
/// ```
pub struct Noise {
    params: ParamSet,
    noise_type: NoiseType,
    target: TextureTarget,
    pipeline: EffectPipeline,
}

impl Noise {
    const P_SCALE: usize = 0;
    const P_SPEED: usize = 1;
    const P_OCTAVES: usize = 2;
    const P_LACUNARITY: usize = 3;
    const P_PERSISTENCE: usize = 4;
    const P_OFFSET: usize = 5;

    /// Creates a noise generator with the classic defaults.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("scale", ParamKind::Float, 0.1, 20.0, [4.0, 0.0, 0.0, 0.0]);
        params.register("speed", ParamKind::Float, 0.0, 5.0, [0.5, 0.0, 0.0, 0.0]);
        params.register("octaves", ParamKind::Int, 1.0, 8.0, [4.0, 0.0, 0.0, 0.0]);
        params.register("lacunarity", ParamKind::Float, 1.0, 4.0, [2.0, 0.0, 0.0, 0.0]);
        params.register("persistence", ParamKind::Float, 0.0, 1.0, [0.5, 0.0, 0.0, 0.0]);
        params.register("offset", ParamKind::Vec3, -100.0, 100.0, [0.0; 4]);
        Self {
            params,
            noise_type: NoiseType::Perlin,
            target: TextureTarget::default(),
            pipeline: EffectPipeline::new("noise", include_str!("../shaders/noise.wgsl")),
        }
    }

    /// Noise scale; higher means finer detail.
    pub fn scale(mut self, scale: f32) -> Self {
        self.params.set_float(Self::P_SCALE, scale);
        self
    }

    /// Animation speed.
    pub fn speed(mut self, speed: f32) -> Self {
        self.params.set_float(Self::P_SPEED, speed);
        self
    }

    /// Number of fractal layers.
    pub fn octaves(mut self, octaves: i32) -> Self {
        self.params.set_float(Self::P_OCTAVES, octaves as f32);
        self
    }

    /// Frequency multiplier per octave.
    pub fn lacunarity(mut self, lacunarity: f32) -> Self {
        self.params.set_float(Self::P_LACUNARITY, lacunarity);
        self
    }

    /// Amplitude multiplier per octave.
    pub fn persistence(mut self, persistence: f32) -> Self {
        self.params.set_float(Self::P_PERSISTENCE, persistence);
        self
    }

    /// Spatial offset.
    pub fn offset(mut self, x: f32, y: f32, z: f32) -> Self {
        self.params.set_raw(Self::P_OFFSET, [x, y, z, 0.0]);
        self
    }

    /// Selects the noise algorithm.
    pub fn noise_type(mut self, noise_type: NoiseType) -> Self {
        self.noise_type = noise_type;
        self
    }
}

impl Default for Noise {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Noise {
    fn type_name(&self) -> &'static str {
        "Noise"
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

        let offset = self.params.vec3(Self::P_OFFSET);
        let uniforms = vec![
            ctx.time() * self.params.float(Self::P_SPEED),
            self.params.float(Self::P_SCALE),
            self.params.float(Self::P_OCTAVES),
            self.params.float(Self::P_LACUNARITY),
            self.params.float(Self::P_PERSISTENCE),
            offset[0],
            offset[1],
            offset[2],
            self.noise_type.index(),
        ];
        ctx.gpu().encoder().push_pass(RenderPass {
            label: "noise",
            pipeline,
            target,
            sources: vec![],
            uniforms,
        });
    }

    fn cleanup(&mut self, ctx: &mut Context) {
        self.target.release(ctx);
        self.pipeline.release(ctx);
    }

    fn needs_cook(&self, _ctx: &Context) -> bool {
        // Static noise (speed 0) is cacheable; animated noise is not.
        self.params.float(Self::P_SPEED) != 0.0
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
