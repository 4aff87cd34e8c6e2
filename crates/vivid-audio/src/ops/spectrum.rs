//! FFT band analyzer.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OperatorState, OutputKind};

/// Analysis window length in samples.
const FFT_SIZE: usize = 1024;

/// Number of log-spaced output bands.
pub const SPECTRUM_BANDS: usize = 8;

/// Spectral analyzer.
///
/// Accumulates a mono mix of its input into a [`FFT_SIZE`] window and runs
/// a Hann-windowed FFT whenever the window fills, folding the magnitudes
/// into [`SPECTRUM_BANDS`] log-spaced bands. Audio passes through; the
/// published scalar is the smoothed overall energy.
///
/// The FFT plan and scratch space are allocated in `prepare` on the main
/// thread; the per-block path does not allocate.
pub struct Spectrum {
    params: ParamSet,
    inputs: InputSlots,
    output: AudioBuffer,
    fft: Option<Arc<dyn Fft<f32>>>,
    window: Vec<f32>,
    window_fill: usize,
    fft_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    hann: Vec<f32>,
    bands: [f32; SPECTRUM_BANDS],
    energy: f32,
}

impl Spectrum {
    const P_SMOOTHING: usize = 0;

    /// Creates an analyzer with 0.8 smoothing.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("smoothing", ParamKind::Float, 0.0, 0.999, [0.8, 0.0, 0.0, 0.0]);
        Self {
            params,
            inputs: InputSlots::new().slot("in", accepts::AUDIO),
            output: AudioBuffer::default(),
            fft: None,
            window: Vec::new(),
            window_fill: 0,
            fft_buf: Vec::new(),
            scratch: Vec::new(),
            hann: Vec::new(),
            bands: [0.0; SPECTRUM_BANDS],
            energy: 0.0,
        }
    }

    /// Sets the band smoothing factor.
    pub fn smoothing(mut self, smoothing: f32) -> Self {
        self.params.set_float(Self::P_SMOOTHING, smoothing);
        self
    }

    /// Connects the audio input (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }

    /// Smoothed energy of band `index` (0 = lowest).
    pub fn band(&self, index: usize) -> f32 {
        self.bands.get(index).copied().unwrap_or(0.0)
    }

    /// Smoothed overall spectral energy.
    pub fn energy(&self) -> f32 {
        self.energy
    }

    fn run_fft(&mut self) {
        let Some(fft) = self.fft.as_ref() else { return };
        for (i, c) in self.fft_buf.iter_mut().enumerate() {
            *c = Complex::new(self.window[i] * self.hann[i], 0.0);
        }
        fft.process_with_scratch(&mut self.fft_buf, &mut self.scratch);

        let smoothing = self.params.float(Self::P_SMOOTHING);
        let half = FFT_SIZE / 2;
        let mut total = 0.0f32;
        for band in 0..SPECTRUM_BANDS {
            // Log-spaced bin ranges: each band covers twice the bins of
            // the previous one, starting at bin 1 (skip DC).
            let lo = (half >> (SPECTRUM_BANDS - band)).max(1);
            let hi = (half >> (SPECTRUM_BANDS - band - 1)).max(lo + 1);
            let mut sum = 0.0f32;
            for bin in lo..hi.min(half) {
                sum += self.fft_buf[bin].norm();
            }
            let value = (sum / (hi - lo) as f32 / half as f32).min(1.0);
            self.bands[band] = self.bands[band] * smoothing + value * (1.0 - smoothing);
            total += self.bands[band];
        }
        self.energy = (total / SPECTRUM_BANDS as f32).min(1.0);
    }
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Spectrum {
    fn type_name(&self) -> &'static str {
        "Spectrum"
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
        Some(self.energy)
    }
    fn cleanup(&mut self, _ctx: &mut Context) {
        self.output.release();
        self.fft = None;
        self.window = Vec::new();
        self.fft_buf = Vec::new();
        self.scratch = Vec::new();
        self.hann = Vec::new();
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

impl AudioOperator for Spectrum {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.output = AudioBuffer::new(sample_rate);
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        self.scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        self.fft = Some(fft);
        self.window = vec![0.0; FFT_SIZE];
        self.window_fill = 0;
        self.fft_buf = vec![Complex::default(); FFT_SIZE];
        self.hann = (0..FFT_SIZE)
            .map(|i| {
                let x = i as f32 / (FFT_SIZE - 1) as f32;
                0.5 - 0.5 * (std::f32::consts::TAU * x).cos()
            })
            .collect();
    }

    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs) {
        let source = inputs.buffer(0);
        let out = self.output.write_frames(block.frames);

        let Some(buf) = source else { return };
        let src = buf.samples();
        let n = out.len().min(src.len());
        out[..n].copy_from_slice(&src[..n]);

        // Accumulate a mono mix; run the FFT each time the window fills.
        let mut filled_windows = 0usize;
        for frame in src[..n].chunks_exact(2) {
            self.window[self.window_fill] = (frame[0] + frame[1]) * 0.5;
            self.window_fill += 1;
            if self.window_fill == FFT_SIZE {
                self.window_fill = 0;
                filled_windows += 1;
            }
        }
        for _ in 0..filled_windows {
            self.run_fft();
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

    fn scalar(&self) -> Option<f32> {
        Some(self.energy)
    }

    fn reset(&mut self) {
        self.window_fill = 0;
        self.bands = [0.0; SPECTRUM_BANDS];
        self.energy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_core::audio::AudioInputRef;

    #[test]
    fn sine_input_raises_energy() {
        let mut spectrum = Spectrum::new().smoothing(0.0);
        spectrum.prepare(48000, 2048);

        let mut src = AudioBuffer::new(48000);
        let samples = src.write_frames(FFT_SIZE);
        for (i, frame) in samples.chunks_exact_mut(2).enumerate() {
            let s = (std::f32::consts::TAU * 440.0 * i as f32 / 48000.0).sin();
            frame[0] = s;
            frame[1] = s;
        }

        let inputs = AudioInputs::new(vec![AudioInputRef {
            buffer: Some(&src),
            scalar: None,
        }]);
        spectrum.generate(
            &BlockContext { sample_rate: 48000, frames: FFT_SIZE, start_frame: 0 },
            &inputs,
        );

        assert!(spectrum.energy() > 0.0);
        assert!(spectrum.bands.iter().any(|&b| b > 0.0));
    }
}
