//! RMS and peak level analysis.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};

/// Amplitude analyzer.
///
/// Passes its input through untouched and publishes smoothed RMS as its
/// scalar, so a single connection drives audio-reactive visuals:
///
/// ```rust,ignore
/// chain.add("levels", Levels::new().input("master"))?;
/// // main thread, any frame:
/// let loudness = chain.value_of("levels").unwrap_or(0.0);
/// ```
pub struct Levels {
    params: ParamSet,
    inputs: InputSlots,
    output: AudioBuffer,
    rms: f32,
    peak: f32,
}

impl Levels {
    const P_SMOOTHING: usize = 0;

    /// Creates an analyzer with 0.9 smoothing.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("smoothing", ParamKind::Float, 0.0, 0.999, [0.9, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("in", accepts::AUDIO),
            output: AudioBuffer::default(),
            rms: 0.0,
            peak: 0.0,
        }
    }

    /// Sets the smoothing factor (0 = instant, 0.999 = very slow).
    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.params.set_float(Self::P_SMOOTHING, smoothing);
        self
    }

    /// Connects the audio input (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }

    /// Smoothed RMS level (0–1).
    pub fn rms(&self) -> f32 {
        self.rms
    }

    /// Smoothed peak level (0–1).
    pub fn peak(&self) -> f32 {
        self.peak
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Levels {
    fn type_name(&self) -> &'static str {
        "Levels"
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
        Some(self.rms)
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

impl AudioOperator for Levels {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs) {
        let smoothing = self.params.float(Self::P_SMOOTHING);
        let source = inputs.buffer(0);
        let out = self.output.write_frames(block.frames);

        let Some(buf) = source else {
            self.rms *= smoothing;
            self.peak *= smoothing;
            return;
        };

        let src = buf.samples();
        let n = out.len().min(src.len());
        out[..n].copy_from_slice(&src[..n]);

        let mut sum_sq = 0.0f32;
        let mut peak = 0.0f32;
        for &s in &src[..n] {
            sum_sq += s * s;
            peak = peak.max(s.abs());
        }
        let block_rms = if n > 0 { (sum_sq / n as f32).sqrt() } else { 0.0 };

        self.rms = self.rms * smoothing + block_rms * (1.0 - smoothing);
        self.peak = self.peak * smoothing + peak * (1.0 - smoothing);
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

    fn scalar(&self) -> Option<f32> {
        Some(self.rms)
    }

    fn reset(&mut self) {
        self.rms = 0.0;
        self.peak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_core::audio::AudioInputRef;

    #[test]
    fn rms_tracks_signal_and_passes_through() {
        let mut levels = Levels::new().smoothing(0.0);
        levels.prepare(48000, 2048);

        let mut src = AudioBuffer::new(48000);
        src.write_frames(128).fill(0.5);
        let inputs = AudioInputs::new(vec![AudioInputRef {
            buffer: Some(&src),
            scalar: None,
        }]);
        levels.generate(
            &BlockContext { sample_rate: 48000, frames: 128, start_frame: 0 },
            &inputs,
        );

        assert!((levels.rms() - 0.5).abs() < 1e-4);
        assert!((levels.peak() - 0.5).abs() < 1e-4);
        assert_eq!(levels.output.samples(), src.samples());
    }
}
