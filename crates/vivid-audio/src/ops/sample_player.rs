//! WAV sample playback.

use std::path::{Path, PathBuf};

use vivid_core::audio::{
    AudioBuffer, AudioEvent, AudioEventKind, AudioInputs, AudioOperator, BlockContext,
};
use vivid_core::param::{ParamKind, ParamSet, ParamValues};
use vivid_core::state::downcast_state;
use vivid_core::{Context, Inputs, Operator, OperatorState, OutputKind};

/// One-shot / looping WAV player.
///
/// The file is decoded to interleaved stereo f32 in `prepare` (main
/// thread); playback on the audio thread is a resampling copy. `Trigger`
/// restarts playback from the top, `NoteOff` stops it.
pub struct SamplePlayer {
    params: ParamSet,
    output: AudioBuffer,
    path: Option<PathBuf>,
    samples: Vec<f32>,
    source_rate: u32,
    sample_rate: u32,
    position: f64,
    playing: bool,
}

impl SamplePlayer {
    const P_GAIN: usize = 0;
    const P_LOOPING: usize = 1;

    /// Creates a player with no file loaded.
    pub fn new() -> Self {
        let mut params = ParamSet::new();
        params.register("gain", ParamKind::Float, 0.0, 2.0, [1.0, 0.0, 0.0, 0.0]);
        params.register("looping", ParamKind::Bool, 0.0, 1.0, [0.0; 4]);
        Self {
            params,
            output: AudioBuffer::default(),
            path: None,
            samples: Vec::new(),
            source_rate: 0,
            sample_rate: 0,
            position: 0.0,
            playing: false,
        }
    }

    /// Sets the WAV file to play (builder form). Resolve the path through
    /// the asset loader before handing it here.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets playback gain.
    pub fn gain(mut self, gain: f32) -> Self {
        self.params.set_float(Self::P_GAIN, gain);
        self
    }

    /// Enables looping playback.
    pub fn looping(mut self, looping: bool) -> Self {
        self.params
            .set_float(Self::P_LOOPING, if looping { 1.0 } else { 0.0 });
        self
    }

    /// Returns `true` while the sample is playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn load(&mut self, path: &Path) {
        let reader = match hound::WavReader::open(path) {
            Ok(reader) => reader,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to open sample");
                return;
            }
        };
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let mono_or_more: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .filter_map(Result::ok)
                .collect(),
            hound::SampleFormat::Int => {
                let scale = 1.0 / f32::from(2u16).powi(i32::from(spec.bits_per_sample) - 1);
                reader
                    .into_samples::<i32>()
                    .filter_map(Result::ok)
                    .map(|s| s as f32 * scale)
                    .collect()
            }
        };

        // Fold to interleaved stereo.
        self.samples = mono_or_more
            .chunks(channels)
            .flat_map(|frame| {
                let l = frame.first().copied().unwrap_or(0.0);
                let r = frame.get(1).copied().unwrap_or(l);
                [l, r]
            })
            .collect();
        self.source_rate = spec.sample_rate;
        tracing::info!(
            path = %path.display(),
            frames = self.samples.len() / 2,
            rate = spec.sample_rate,
            "sample loaded"
        );
    }
}

impl Default for SamplePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for SamplePlayer {
    fn type_name(&self) -> &'static str {
        "SamplePlayer"
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
        self.samples = Vec::new();
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

impl AudioOperator for SamplePlayer {
    fn prepare(&mut self, sample_rate: u32, _max_block_frames: usize) {
        self.sample_rate = sample_rate;
        self.output = AudioBuffer::new(sample_rate);
        if self.samples.is_empty()
            && let Some(path) = self.path.clone()
        {
            self.load(&path);
        }
    }

    fn generate(&mut self, block: &BlockContext, _inputs: &AudioInputs) {
        let gain = self.params.float(Self::P_GAIN);
        let looping = self.params.flag(Self::P_LOOPING);
        let frame_count = self.samples.len() / 2;
        let step = if self.sample_rate > 0 {
            f64::from(self.source_rate) / f64::from(self.sample_rate)
        } else {
            1.0
        };

        let mut position = self.position;
        let mut playing = self.playing;
        let out = self.output.write_frames(block.frames);
        if !playing || frame_count == 0 {
            self.playing = playing;
            return;
        }

        for frame in out.chunks_exact_mut(2) {
            let mut idx = position as usize;
            if idx >= frame_count {
                if !looping {
                    playing = false;
                    break;
                }
                position %= frame_count as f64;
                idx = position as usize;
            }
            frame[0] = self.samples[idx * 2] * gain;
            frame[1] = self.samples[idx * 2 + 1] * gain;
            position += step;
        }

        self.position = position;
        self.playing = playing;
    }

    fn handle_event(&mut self, event: &AudioEvent) {
        match event.kind {
            AudioEventKind::Trigger | AudioEventKind::NoteOn => {
                self.position = 0.0;
                self.playing = true;
            }
            AudioEventKind::NoteOff => self.playing = false,
            AudioEventKind::ParamChange => {
                self.params
                    .set_component(event.param as usize, 0, event.value1);
            }
            AudioEventKind::Reset => {
                self.position = 0.0;
                self.playing = false;
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

    fn write_test_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(i16::MAX / 2).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn triggered_sample_plays_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("hit.wav");
        write_test_wav(&wav, 64);

        let mut player = SamplePlayer::new().file(&wav).gain(1.0);
        player.prepare(48000, 2048);
        assert_eq!(player.samples.len(), 64 * 2);

        let block = BlockContext { sample_rate: 48000, frames: 128, start_frame: 0 };

        // Untriggered: silence.
        player.generate(&block, &AudioInputs::empty());
        assert!(player.output.samples().iter().all(|&s| s == 0.0));

        player.handle_event(&AudioEvent::trigger(0));
        player.generate(&block, &AudioInputs::empty());
        let out = player.output.samples();
        assert!(out[0] > 0.4, "mono folds to both channels");
        assert!(out[1] > 0.4);
        // The 64-frame sample ends inside the block.
        assert!(out[64 * 2..].iter().all(|&s| s == 0.0));
        assert!(!player.is_playing());
    }

    #[test]
    fn missing_file_is_silent_not_fatal() {
        let mut player = SamplePlayer::new().file("/nonexistent/sample.wav");
        player.prepare(48000, 2048);
        player.handle_event(&AudioEvent::trigger(0));
        player.generate(
            &BlockContext { sample_rate: 48000, frames: 32, start_frame: 0 },
            &AudioInputs::empty(),
        );
        assert!(player.output.samples().iter().all(|&s| s == 0.0));
    }
}
