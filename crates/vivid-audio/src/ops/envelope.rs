//! Attack/release envelope, usable as a VCA or a control source.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Release,
}

/// AR envelope generator.
///
/// `Trigger`/`NoteOn` starts the attack ramp, `NoteOff` (or the attack
/// peak) enters release. With an audio input connected the envelope
/// multiplies it (VCA); standalone it writes the envelope itself, and its
/// scalar — the current level — is readable from the main thread, which is
/// what makes audio-reactive visuals one connection away.
pub struct ArEnvelope {
    params: ParamSet,
    inputs: InputSlots,
    output: AudioBuffer,
    sample_rate: u32,
    stage: Stage,
    level: f32,
}

impl ArEnvelope {
    const P_ATTACK: usize = 0;
    const P_RELEASE: usize = 1;

    /// Creates an envelope with a 10 ms attack and 200 ms release.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("attack", ParamKind::Float, 1.0, 5000.0, [10.0, 0.0, 0.0, 0.0]);
        params.register("release", ParamKind::Float, 1.0, 10000.0, [200.0, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("in", accepts::AUDIO),
            output: AudioBuffer::default(),
            sample_rate: 0,
            stage: Stage::Idle,
            level: 0.0,
        }
    }

    /// Sets the attack time in milliseconds.
    pub fn attack(mut self, ms: f32) -> Self {
        self.params.set_float(Self::P_ATTACK, ms);
        self
    }

    /// Sets the release time in milliseconds.
    pub fn release(mut self, ms: f32) -> Self {
        self.params.set_float(Self::P_RELEASE, ms);
        self
    }

    /// Connects the audio input (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }

    /// Current envelope level (0–1).
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Default for ArEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for ArEnvelope {
    fn type_name(&self) -> &'static str {
        "ArEnvelope"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::AudioValue
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
    fn value_output(&self) -> Option<f32> {
        Some(self.level)
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

impl AudioOperator for ArEnvelope {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.sample_rate = sample_rate;
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs) {
        let attack_step = step_per_sample(self.params.float(Self::P_ATTACK), block.sample_rate);
        let release_step = step_per_sample(self.params.float(Self::P_RELEASE), block.sample_rate);
        let source = inputs.buffer(0);

        let mut stage = self.stage;
        let mut level = self.level;
        let out = self.output.write_frames(block.frames);

        for (i, frame) in out.chunks_exact_mut(2).enumerate() {
            match stage {
                Stage::Attack => {
                    level += attack_step;
                    if level >= 1.0 {
                        level = 1.0;
                        stage = Stage::Release;
                    }
                }
                Stage::Release => {
                    level -= release_step;
                    if level <= 0.0 {
                        level = 0.0;
                        stage = Stage::Idle;
                    }
                }
                Stage::Idle => {}
            }
            match source {
                Some(buf) => {
                    let samples = buf.samples();
                    frame[0] = samples.get(i * 2).copied().unwrap_or(0.0) * level;
                    frame[1] = samples.get(i * 2 + 1).copied().unwrap_or(0.0) * level;
                }
                None => {
                    frame[0] = level;
                    frame[1] = level;
                }
            }
        }

        self.stage = stage;
        self.level = level;
    }

    fn handle_event(&mut self, event: &AudioEvent) {
        match event.kind {
            AudioEventKind::Trigger | AudioEventKind::NoteOn => self.stage = Stage::Attack,
            AudioEventKind::NoteOff => {
                if self.stage != Stage::Idle {
                    self.stage = Stage::Release;
                }
            }
            AudioEventKind::ParamChange => {
                self.params
                    .set_component(event.param as usize, 0, event.value1);
            }
            AudioEventKind::Reset => self.reset(),
        }
    }

    fn output(&self) -> &AudioBuffer {
        &self.output
    }

    fn scalar(&self) -> Option<f32> {
        Some(self.level)
    }

    fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
    }
}

fn step_per_sample(ms: f32, sample_rate: u32) -> f32 {
    let samples = (ms / 1000.0) * sample_rate as f32;
    if samples <= 1.0 { 1.0 } else { 1.0 / samples }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(frames: usize, start_frame: u64) -> BlockContext {
        BlockContext {
            sample_rate: 48000,
            frames,
            start_frame,
        }
    }

    #[test]
    fn idle_until_triggered() {
        let mut env = ArEnvelope::new();
        env.prepare(48000, 2048);
        env.generate(&block(128, 0), &AudioInputs::empty());
        assert!(env.output.samples().iter().all(|&s| s == 0.0));

        env.handle_event(&AudioEvent::trigger(0));
        env.generate(&block(128, 128), &AudioInputs::empty());
        assert!(env.output.samples().iter().any(|&s| s > 0.0));
    }

    #[test]
    fn attack_reaches_peak_then_releases() {
        let mut env = ArEnvelope::new().attack(1.0).release(1.0);
        env.prepare(48000, 2048);
        env.handle_event(&AudioEvent::trigger(0));
        // 1 ms at 48 kHz is 48 samples each way; 512 frames covers both.
        env.generate(&block(512, 0), &AudioInputs::empty());
        let samples = env.output.samples();
        assert!(samples.iter().any(|&s| s > 0.99));
        assert_eq!(env.level(), 0.0);
    }
}
