//! White noise generator.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{Context, Inputs, Operator, OperatorState, OutputKind};

/// Uncorrelated stereo white noise.
pub struct NoiseGen {
    params: ParamSet,
    output: AudioBuffer,
    rng: u32,
    active: bool,
}

impl NoiseGen {
    const P_VOLUME: usize = 0;

    /// Creates a generator at the given volume (0–1).
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("volume", ParamKind::Float, 0.0, 1.0, [0.5, 0.0, 0.0, 0.0]);
        Self {
            params,
            output: AudioBuffer::default(),
            rng: 0x9e3779b9,
            active: true,
        }
    }

    /// Sets the output volume.
    pub fn volume(mut self, volume: f32) -> Self {
        self.params.set_float(Self::P_VOLUME, volume);
        self
    }
}

impl Default for NoiseGen {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for NoiseGen {
    fn type_name(&self) -> &'static str {
        "NoiseGen"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Audio
    }
    fn param_set(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }
    fn param_set_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
    fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {}
    fn audio_output(&self) -> Option<&AudioBuffer> {
        Some(&self.output)
    }
    fn cleanup(&mut self, _ctx: &mut Context) {
        self.output.release();
    }
    fn as_audio(&mut self) -> Option<&mut dyn AudioOperator> {
        Some(self)
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

impl AudioOperator for NoiseGen {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, _inputs: &AudioInputs) {
        let volume = self.params.float(Self::P_VOLUME);
        let active = self.active;
        // xorshift32; good enough for noise, no per-sample allocation.
        let mut x = self.rng;
        let out = self.output.write_frames(block.frames);
        if active {
            for sample in out.iter_mut() {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                *sample = ((x as f32 / u32::MAX as f32) * 2.0 - 1.0) * volume;
            }
        }
        self.rng = x;
    }

    fn handle_event(&mut self, event: &AudioEvent) {
        match event.kind {
            AudioEventKind::NoteOn | AudioEventKind::Trigger => self.active = true,
            AudioEventKind::NoteOff => self.active = false,
            AudioEventKind::ParamChange => {
                self.params
                    .set_component(event.param as usize, 0, event.value1);
            }
            AudioEventKind::Reset => {
                self.rng = 0x9e3779b9;
                self.active = true;
            }
        }
    }

    fn output(&self) -> &AudioBuffer {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_fills_range() {
        let mut r#gen = NoiseGen::new().volume(1.0);
        r#gen.prepare(48000, 2048);
        r#gen.generate(
            &BlockContext {
                sample_rate: 48000,
                frames: 512,
                start_frame: 0,
            },
            &AudioInputs::empty(),
        );
        let samples = r#gen.output.samples();
        assert!(samples.iter().any(|&s| s > 0.1));
        assert!(samples.iter().any(|&s| s < -0.1));
        assert!(samples.iter().all(|&s| s.abs() <= 1.0));
    }
}
