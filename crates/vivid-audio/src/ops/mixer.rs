//! Fan-in bus: sums up to four audio inputs with per-input levels.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};

const MIXER_INPUTS: usize = 4;

/// Sums its connected inputs, each scaled by a level parameter.
///
/// Absent inputs contribute silence, so a partially wired mixer still
/// produces the connected channels.
pub struct AudioMixer {
    params: ParamSet,
    inputs: InputSlots,
    output: AudioBuffer,
}

impl AudioMixer {
    /// Creates a four-input mixer at unity levels.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("level1", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("level2", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("level3", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("level4", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new()
                .slot("in1", accepts::AUDIO)
                .slot("in2", accepts::AUDIO)
                .slot("in3", accepts::AUDIO)
                .slot("in4", accepts::AUDIO),
            output: AudioBuffer::default(),
        }
    }

    /// Connects input slot `slot` (0–3) to `name` (builder form).
    pub fn input(mut self, slot: usize, name: &str) -> Self {
        self.inputs.connect(slot, name);
        self
    }

    /// Sets the level for input slot `slot` (builder form).
    pub fn level(mut self, slot: usize, level: f32) -> Self {
        self.params.set_float(slot, level);
        self
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for AudioMixer {
    fn type_name(&self) -> &'static str {
        "AudioMixer"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Audio
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

impl AudioOperator for AudioMixer {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs) {
        let levels: [f32; MIXER_INPUTS] = std::array::from_fn(|i| self.params.float(i));
        let out = self.output.write_frames(block.frames);
        for (slot, level) in levels.iter().enumerate() {
            let Some(buf) = inputs.buffer(slot) else {
                continue;
            };
            let src = buf.samples();
            let n = out.len().min(src.len());
            for i in 0..n {
                out[i] += src[i] * level;
            }
        }
    }

    fn handle_event(&mut self, event: &AudioEvent) {
        if event.kind == AudioEventKind::ParamChange {
            self.params
                .set_component(event.param as usize, 0, event.value1);
        }
    }

    fn output(&self) -> &AudioBuffer {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_core::audio::AudioInputRef;

    #[test]
    fn sums_connected_inputs_with_levels() {
        let mut a = AudioBuffer::new(48000);
        a.write_frames(8).fill(0.25);
        let mut b = AudioBuffer::new(48000);
        b.write_frames(8).fill(0.5);

        let mut mixer = AudioMixer::new().level(1, 0.5);
        mixer.prepare(48000, 2048);
        let inputs = AudioInputs::new(vec![
            AudioInputRef { buffer: Some(&a), scalar: None },
            AudioInputRef { buffer: Some(&b), scalar: None },
            AudioInputRef { buffer: None, scalar: None },
            AudioInputRef { buffer: None, scalar: None },
        ]);
        mixer.generate(
            &BlockContext { sample_rate: 48000, frames: 8, start_frame: 0 },
            &inputs,
        );
        // 0.25 * 1.0 + 0.5 * 0.5 = 0.5
        assert!(mixer.output.samples().iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }
}
