//! Gain stage with dry/wet mix and bypass.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};

/// Linear gain applied to one audio input.
///
/// Carries the common effect controls: `mix` blends dry and processed
/// signal, `bypass` copies the input through while keeping the node in the
/// graph so downstream wiring is unaffected.
pub struct AudioGain {
    params: ParamSet,
    inputs: InputSlots,
    output: AudioBuffer,
}

impl AudioGain {
    const P_GAIN: usize = 0;
    const P_MIX: usize = 1;
    const P_BYPASS: usize = 2;

    /// Creates a unity gain stage.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("gain", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("mix", ParamKind::Float, 0.0, 1.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("bypass", ParamKind::Bool, 0.0, 1.0, [0.0; 4]);
        Self {
            params,
            inputs: InputSlots::new().slot("in", accepts::AUDIO),
            output: AudioBuffer::default(),
        }
    }

    /// Sets the linear gain (0–2).
    pub fn gain(mut self, gain: f32) -> Self {
        self.params.set_float(Self::P_GAIN, gain);
        self
    }

    /// Sets the dry/wet mix (0 = dry, 1 = wet).
    pub fn mix(mut self, mix: f32) -> Self {
        self.params.set_float(Self::P_MIX, mix);
        self
    }

    /// Toggles pass-through.
    pub fn bypass(mut self, bypass: bool) -> Self {
        self.params
            .set_float(Self::P_BYPASS, if bypass { 1.0 } else { 0.0 });
        self
    }

    /// Connects the audio input (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }
}

impl Default for AudioGain {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for AudioGain {
    fn type_name(&self) -> &'static str {
        "AudioGain"
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

impl AudioOperator for AudioGain {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs) {
        let gain = self.params.float(Self::P_GAIN);
        let mix = self.params.float(Self::P_MIX);
        let bypass = self.params.flag(Self::P_BYPASS);
        let source = inputs.buffer(0);
        let out = self.output.write_frames(block.frames);

        let Some(buf) = source else { return };
        let dry = buf.samples();
        let n = out.len().min(dry.len());
        if bypass {
            out[..n].copy_from_slice(&dry[..n]);
            return;
        }
        for i in 0..n {
            let wet = dry[i] * gain;
            out[i] = dry[i] + (wet - dry[i]) * mix;
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

    fn source_buffer(value: f32, frames: usize) -> AudioBuffer {
        let mut buf = AudioBuffer::new(48000);
        buf.write_frames(frames).fill(value);
        buf
    }

    fn run(gain: &mut AudioGain, src: &AudioBuffer, frames: usize) {
        let inputs = AudioInputs::new(vec![AudioInputRef {
            buffer: Some(src),
            scalar: None,
        }]);
        gain.generate(
            &BlockContext {
                sample_rate: 48000,
                frames,
                start_frame: 0,
            },
            &inputs,
        );
    }

    #[test]
    fn applies_gain() {
        let mut gain = AudioGain::new().gain(0.5);
        gain.prepare(48000, 2048);
        let src = source_buffer(0.8, 16);
        run(&mut gain, &src, 16);
        assert!(gain.output.samples().iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn mix_blends_dry_and_wet() {
        let mut gain = AudioGain::new().gain(2.0).mix(0.5);
        gain.prepare(48000, 2048);
        let src = source_buffer(0.4, 16);
        run(&mut gain, &src, 16);
        // dry 0.4, wet 0.8, halfway = 0.6
        assert!(gain.output.samples().iter().all(|&s| (s - 0.6).abs() < 1e-6));
    }

    #[test]
    fn bypass_passes_through() {
        let mut gain = AudioGain::new().gain(0.0).bypass(true);
        gain.prepare(48000, 2048);
        let src = source_buffer(0.3, 16);
        run(&mut gain, &src, 16);
        assert!(gain.output.samples().iter().all(|&s| (s - 0.3).abs() < 1e-6));
    }

    #[test]
    fn absent_input_is_silence() {
        let mut gain = AudioGain::new();
        gain.prepare(48000, 2048);
        gain.generate(
            &BlockContext {
                sample_rate: 48000,
                frames: 16,
                start_frame: 0,
            },
            &AudioInputs::empty(),
        );
        assert!(gain.output.samples().iter().all(|&s| s == 0.0));
    }
}
