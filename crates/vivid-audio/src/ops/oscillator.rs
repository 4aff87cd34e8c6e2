//! Band-unlimited oscillator with five waveforms and stereo detune.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{Context, Inputs, Operator, OperatorState, OutputKind};

/// Oscillator waveform selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    /// Pure sine.
    Sine,
    /// Linear triangle.
    Triangle,
    /// 50% square.
    Square,
    /// Rising sawtooth.
    Saw,
    /// Variable-width pulse (see the `pulse_width` parameter).
    Pulse,
}

impl Waveform {
    fn from_index(index: i32) -> Self {
        match index {
            1 => Waveform::Triangle,
            2 => Waveform::Square,
            3 => Waveform::Saw,
            4 => Waveform::Pulse,
            _ => Waveform::Sine,
        }
    }

    fn index(self) -> f32 {
        match self {
            Waveform::Sine => 0.0,
            Waveform::Triangle => 1.0,
            Waveform::Square => 2.0,
            Waveform::Saw => 3.0,
            Waveform::Pulse => 4.0,
        }
    }
}

/// Stereo oscillator.
///
/// Runs free by default; `NoteOn` retunes it (and applies velocity),
/// `NoteOff` gates it silent, `Trigger` restarts the phase.
///
/// ```rust,ignore
/// chain.add("osc", Oscillator::new().frequency(220.0).waveform(Waveform::Saw))?;
/// ```
pub struct Oscillator {
    params: ParamSet,
    output: AudioBuffer,
    sample_rate: u32,
    phase_l: f32,
    phase_r: f32,
    velocity: f32,
    active: bool,
}

impl Oscillator {
    const P_FREQUENCY: usize = 0;
    const P_VOLUME: usize = 1;
    const P_WAVEFORM: usize = 2;
    const P_DETUNE: usize = 3;
    const P_STEREO_DETUNE: usize = 4;
    const P_PULSE_WIDTH: usize = 5;

    /// Creates an oscillator at 440 Hz, sine, half volume.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("frequency", ParamKind::Float, 20.0, 8000.0, [440.0, 0.0, 0.0, 0.0]);
        params.register("volume", ParamKind::Float, 0.0, 1.0, [0.5, 0.0, 0.0, 0.0]);
        params.register("waveform", ParamKind::Int, 0.0, 4.0, [0.0; 4]);
        params.register("detune", ParamKind::Float, -1200.0, 1200.0, [0.0; 4]);
        params.register("stereo_detune", ParamKind::Float, 0.0, 50.0, [0.0; 4]);
        params.register("pulse_width", ParamKind::Float, 0.01, 0.99, [0.5, 0.0, 0.0, 0.0]);
        Self {
            params,
            output: AudioBuffer::default(),
            sample_rate: 0,
            phase_l: 0.0,
            phase_r: 0.0,
            velocity: 1.0,
            active: true,
        }
    }

    /// Sets the base frequency in Hz.
    pub fn frequency(mut self, hz: f32) -> Self {
        self.params.set_float(Self::P_FREQUENCY, hz);
        self
    }

    /// Sets the output volume (0–1).
    pub fn volume(mut self, volume: f32) -> Self {
        self.params.set_float(Self::P_VOLUME, volume);
        self
    }

    /// Selects the waveform.
    pub fn waveform(mut self, waveform: Waveform) -> Self {
        self.params.set_float(Self::P_WAVEFORM, waveform.index());
        self
    }

    /// Detunes by cents.
    pub fn detune(mut self, cents: f32) -> Self {
        self.params.set_float(Self::P_DETUNE, cents);
        self
    }

    /// Spreads left/right by cents (left down, right up).
    pub fn stereo_detune(mut self, cents: f32) -> Self {
        self.params.set_float(Self::P_STEREO_DETUNE, cents);
        self
    }

    /// Sets the pulse width for [`Waveform::Pulse`].
    pub fn pulse_width(mut self, width: f32) -> Self {
        self.params.set_float(Self::P_PULSE_WIDTH, width);
        self
    }

}

fn wave_sample(waveform: Waveform, pulse_width: f32, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
        Waveform::Triangle => {
            if phase < 0.5 {
                4.0 * phase - 1.0
            } else {
                3.0 - 4.0 * phase
            }
        }
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Saw => 2.0 * phase - 1.0,
        Waveform::Pulse => {
            if phase < pulse_width {
                1.0
            } else {
                -1.0
            }
        }
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

fn cents_to_ratio(cents: f32) -> f32 {
    (cents / 1200.0).exp2()
}

impl Operator for Oscillator {
    fn type_name(&self) -> &'static str {
        "Oscillator"
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
    fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {
        // Audio-kind: generated in the audio callback, nothing per frame.
    }
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

impl AudioOperator for Oscillator {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.sample_rate = sample_rate;
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, _inputs: &AudioInputs) {
        let out = self.output.write_frames(block.frames);
        if !self.active || self.sample_rate == 0 {
            return;
        }

        let base = self.params.float(Self::P_FREQUENCY)
            * cents_to_ratio(self.params.float(Self::P_DETUNE));
        let spread = self.params.float(Self::P_STEREO_DETUNE);
        let (freq_l, freq_r) = if spread > 0.0 {
            let ratio = cents_to_ratio(spread);
            (base / ratio, base * ratio)
        } else {
            (base, base)
        };

        let inc_l = freq_l / self.sample_rate as f32;
        let inc_r = freq_r / self.sample_rate as f32;
        let amp = self.params.float(Self::P_VOLUME) * self.velocity;
        let waveform = Waveform::from_index(self.params.int(Self::P_WAVEFORM));
        let pulse_width = self.params.float(Self::P_PULSE_WIDTH);

        for frame in out.chunks_exact_mut(2) {
            frame[0] = wave_sample(waveform, pulse_width, self.phase_l) * amp;
            frame[1] = wave_sample(waveform, pulse_width, self.phase_r) * amp;
            self.phase_l += inc_l;
            self.phase_r += inc_r;
            if self.phase_l >= 1.0 {
                self.phase_l -= 1.0;
            }
            if self.phase_r >= 1.0 {
                self.phase_r -= 1.0;
            }
        }
    }

    fn handle_event(&mut self, event: &AudioEvent) {
        match event.kind {
            AudioEventKind::NoteOn => {
                self.params.set_float(Self::P_FREQUENCY, event.value1);
                self.velocity = event.value2.clamp(0.0, 1.0);
                self.active = true;
            }
            AudioEventKind::NoteOff => self.active = false,
            AudioEventKind::Trigger => {
                self.phase_l = 0.0;
                self.phase_r = 0.0;
                self.active = true;
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

    fn reset(&mut self) {
        self.phase_l = 0.0;
        self.phase_r = 0.0;
        self.velocity = 1.0;
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(frames: usize) -> BlockContext {
        BlockContext {
            sample_rate: 48000,
            frames,
            start_frame: 0,
        }
    }

    #[test]
    fn generates_bounded_samples() {
        let mut osc = Oscillator::new().frequency(440.0).volume(1.0);
        osc.prepare(48000, 2048);
        osc.generate(&block(256), &AudioInputs::empty());
        let samples = osc.output.samples();
        assert_eq!(samples.len(), 512);
        assert!(samples.iter().any(|&s| s != 0.0));
        assert!(samples.iter().all(|&s| s.abs() <= 1.0));
    }

    #[test]
    fn note_off_silences_note_on_retunes() {
        let mut osc = Oscillator::new().volume(1.0);
        osc.prepare(48000, 2048);

        osc.handle_event(&AudioEvent::note_off(0));
        osc.generate(&block(64), &AudioInputs::empty());
        assert!(osc.output.samples().iter().all(|&s| s == 0.0));

        osc.handle_event(&AudioEvent::note_on(0, 880.0, 1.0));
        assert_eq!(osc.params.float(Oscillator::P_FREQUENCY), 880.0);
        osc.generate(&block(64), &AudioInputs::empty());
        assert!(osc.output.samples().iter().any(|&s| s != 0.0));
    }

    #[test]
    fn param_change_event_is_clamped() {
        let mut osc = Oscillator::new();
        osc.prepare(48000, 2048);
        osc.handle_event(&AudioEvent::param_change(
            0,
            Oscillator::P_VOLUME as u32,
            4.0,
        ));
        assert_eq!(osc.params.float(Oscillator::P_VOLUME), 1.0);
    }
}
