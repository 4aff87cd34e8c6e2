//! Feedback delay line.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};

/// Longest supported delay time.
const MAX_DELAY_MS: f32 = 2000.0;

/// Stereo feedback delay.
///
/// The line is allocated for [`MAX_DELAY_MS`] at `prepare` time, so the
/// `time` parameter can move freely on the audio thread without
/// reallocation.
pub struct AudioDelay {
    params: ParamSet,
    inputs: InputSlots,
    output: AudioBuffer,
    line: Vec<f32>,
    write_pos: usize,
    sample_rate: u32,
}

impl AudioDelay {
    const P_TIME: usize = 0;
    const P_FEEDBACK: usize = 1;
    const P_MIX: usize = 2;

    /// Creates a 250 ms delay with moderate feedback.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("time", ParamKind::Float, 1.0, MAX_DELAY_MS, [250.0, 0.0, 0.0, 0.0]);
        params.register("feedback", ParamKind::Float, 0.0, 0.95, [0.3, 0.0, 0.0, 0.0]);
        params.register("mix", ParamKind::Float, 0.0, 1.0, [0.4, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("in", accepts::AUDIO),
            output: AudioBuffer::default(),
            line: Vec::new(),
            write_pos: 0,
            sample_rate: 0,
        }
    }

    /// Sets the delay time in milliseconds.
    pub fn time(mut self, ms: f32) -> Self {
        self.params.set_float(Self::P_TIME, ms);
        self
    }

    /// Sets the feedback amount (0–0.95).
    pub fn feedback(mut self, feedback: f32) -> Self {
        self.params.set_float(Self::P_FEEDBACK, feedback);
        self
    }

    /// Sets the dry/wet mix.
    pub fn mix(mut self, mix: f32) -> Self {
        self.params.set_float(Self::P_MIX, mix);
        self
    }

    /// Connects the audio input (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }
}

impl Default for AudioDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for AudioDelay {
    fn type_name(&self) -> &'static str {
        "AudioDelay"
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
        self.line = Vec::new();
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

impl AudioOperator for AudioDelay {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.sample_rate = sample_rate;
        self.output = AudioBuffer::new(sample_rate);
        let frames = ((MAX_DELAY_MS / 1000.0) * sample_rate as f32).ceil() as usize + 1;
        self.line = vec![0.0; frames * 2];
        self.write_pos = 0;
    }

    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs) {
        let delay_frames = ((self.params.float(Self::P_TIME) / 1000.0)
            * self.sample_rate as f32)
            .round()
            .max(1.0) as usize;
        let feedback = self.params.float(Self::P_FEEDBACK);
        let mix = self.params.float(Self::P_MIX);
        let source = inputs.buffer(0);
        let line_frames = self.line.len() / 2;

        let out = self.output.write_frames(block.frames);
        if self.line.is_empty() {
            return;
        }
        let delay_frames = delay_frames.min(line_frames - 1);

        for (i, frame) in out.chunks_exact_mut(2).enumerate() {
            let dry_l = source
                .map(|b| b.samples().get(i * 2).copied().unwrap_or(0.0))
                .unwrap_or(0.0);
            let dry_r = source
                .map(|b| b.samples().get(i * 2 + 1).copied().unwrap_or(0.0))
                .unwrap_or(0.0);

            let read_pos = (self.write_pos + line_frames - delay_frames) % line_frames;
            let delayed_l = self.line[read_pos * 2];
            let delayed_r = self.line[read_pos * 2 + 1];

            self.line[self.write_pos * 2] = dry_l + delayed_l * feedback;
            self.line[self.write_pos * 2 + 1] = dry_r + delayed_r * feedback;
            self.write_pos = (self.write_pos + 1) % line_frames;

            frame[0] = dry_l + (delayed_l - dry_l) * mix;
            frame[1] = dry_r + (delayed_r - dry_r) * mix;
        }
    }

    fn handle_event(&mut self, event: &AudioEvent) {
        match event.kind {
            AudioEventKind::ParamChange => {
                self.params
                    .set_component(event.param as usize, 0, event.value1);
            }
            AudioEventKind::Reset => self.reset(),
            _ => {}
        }
    }

    fn output(&self) -> &AudioBuffer {
        &self.output
    }

    fn reset(&mut self) {
        self.line.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_core::audio::AudioInputRef;

    #[test]
    fn impulse_reappears_after_delay_time() {
        let mut delay = AudioDelay::new().time(1.0).feedback(0.0).mix(1.0);
        delay.prepare(48000, 2048);
        // 1 ms at 48 kHz = 48 frames.
        let mut src = AudioBuffer::new(48000);
        let s = src.write_frames(256);
        s[0] = 1.0;
        s[1] = 1.0;

        let inputs = AudioInputs::new(vec![AudioInputRef {
            buffer: Some(&src),
            scalar: None,
        }]);
        delay.generate(
            &BlockContext { sample_rate: 48000, frames: 256, start_frame: 0 },
            &inputs,
        );

        let out = delay.output.samples();
        assert_eq!(out[0], 0.0, "fully wet output starts silent");
        assert!(out[48 * 2] > 0.9, "impulse arrives 48 frames later");
    }
}
