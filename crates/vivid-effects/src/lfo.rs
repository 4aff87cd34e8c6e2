//! Low-frequency oscillator producing a scalar.

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{Context, Inputs, Operator, OperatorState, OutputKind};

/// LFO waveform selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LfoWave {
    /// Sine wave.
    Sine,
    /// Linear triangle.
    Triangle,
    /// Square wave.
    Square,
    /// Rising saw.
    Saw,
}

impl LfoWave {
    fn index(self) -> f32 {
        match self {
            LfoWave::Sine => 0.0,
            LfoWave::Triangle => 1.0,
            LfoWave::Square => 2.0,
            LfoWave::Saw => 3.0,
        }
    }

    fn from_index(index: i32) -> Self {
        match index {
            1 => LfoWave::Triangle,
            2 => LfoWave::Square,
            3 => LfoWave::Saw,
            _ => LfoWave::Sine,
        }
    }
}

/// Value-kind modulation source.
///
/// On the main thread the value is evaluated from `ctx.time()` each frame;
/// wired into the audio subgraph it evaluates from the audio clock per
/// block, so it can modulate either side of the engine:
///
/// ```rust,ignore
/// chain.add("wobble", Lfo::new().frequency(0.25).amplitude(3.0))?;
/// // update():
/// let radius = 5.0 + chain.value_of("wobble").unwrap_or(0.0);
/// ```
pub struct Lfo {
    params: ParamSet,
    output: AudioBuffer,
    value: f32,
}

impl Lfo {
    const P_FREQUENCY: usize = 0;
    const P_AMPLITUDE: usize = 1;
    const P_OFFSET: usize = 2;
    const P_PHASE: usize = 3;
    const P_WAVE: usize = 4;

    /// Creates a 1 Hz unit-amplitude sine LFO.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("frequency", ParamKind::Float, 0.0, 20.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("amplitude", ParamKind::Float, 0.0, 10.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("offset", ParamKind::Float, -10.0, 10.0, [0.0; 4]);
        params.register("phase", ParamKind::Float, 0.0, 1.0, [0.0; 4]);
        params.register("wave", ParamKind::Int, 0.0, 3.0, [0.0; 4]);
        Self {
            params,
            output: AudioBuffer::default(),
            value: 0.0,
        }
    }

    /// Sets the rate in Hz.
    pub fn frequency(mut self, hz: f32) -> Self {
        self.params.set_float(Self::P_FREQUENCY, hz);
        self
    }

    /// Sets the amplitude.
    pub fn amplitude(mut self, amplitude: f32) -> Self {
        self.params.set_float(Self::P_AMPLITUDE, amplitude);
        self
    }

    /// Sets the center offset.
    pub fn offset(mut self, offset: f32) -> Self {
        self.params.set_float(Self::P_OFFSET, offset);
        self
    }

    /// Sets the phase offset (0–1 of a cycle).
    pub fn phase(mut self, phase: f32) -> Self {
        self.params.set_float(Self::P_PHASE, phase);
        self
    }

    /// Selects the waveform.
    pub fn wave(mut self, wave: LfoWave) -> Self {
        self.params.set_float(Self::P_WAVE, wave.index());
        self
    }

    /// The most recently evaluated value.
    pub fn value(&self) -> f32 {
        self.value
    }

    fn evaluate(&self, time: f64) -> f32 {
        let freq = self.params.float(Self::P_FREQUENCY);
        let phase = (time * f64::from(freq)).fract() as f32 + self.params.float(Self::P_PHASE);
        let phase = phase.fract();
        let shape = match LfoWave::from_index(self.params.int(Self::P_WAVE)) {
            LfoWave::Sine => (phase * std::f32::consts::TAU).sin(),
            LfoWave::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            LfoWave::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWave::Saw => 2.0 * phase - 1.0,
        };
        self.params.float(Self::P_OFFSET) + shape * self.params.float(Self::P_AMPLITUDE)
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Lfo {
    fn type_name(&self) -> &'static str {
        "Lfo"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Value
    }
    fn param_set(&self) -> Option<&ParamSet> {
        Some(&self.params)
    }
    fn param_set_mut(&mut self) -> Option<&mut ParamSet> {
        Some(&mut self.params)
    }
    fn process(&mut self, ctx: &mut Context, _inputs: &Inputs) {
        self.value = self.evaluate(ctx.time_f64());
    }
    fn value_output(&self) -> Option<f32> {
        Some(self.value)
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

impl AudioOperator for Lfo {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.output = AudioBuffer::new(sample_rate);
    }

    fn generate(&mut self, block: &BlockContext, _inputs: &AudioInputs) {
        let value = self.evaluate(block.time());
        self.value = value;
        let out = self.output.write_frames(block.frames);
        out.fill(value);
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

    fn scalar(&self) -> Option<f32> {
        Some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_lfo_sweeps_symmetrically() {
        let lfo = Lfo::new().frequency(1.0).amplitude(2.0);
        assert!((lfo.evaluate(0.0)).abs() < 1e-6);
        assert!((lfo.evaluate(0.25) - 2.0).abs() < 1e-4);
        assert!((lfo.evaluate(0.75) + 2.0).abs() < 1e-4);
    }

    #[test]
    fn offset_shifts_center() {
        let lfo = Lfo::new().amplitude(0.0).offset(3.5);
        assert_eq!(lfo.evaluate(0.42), 3.5);
    }
}
