//! Audio leaf operators.
//!
//! Every operator here implements both faces of the audio contract: the
//! chain-side [`Operator`](vivid_core::Operator) (wiring, parameters, state
//! snapshot) and the audio-thread [`AudioOperator`](vivid_core::audio::AudioOperator)
//! (block generation, event handling). Parameter edits while installed
//! arrive as `ParamChange` events; the parameter index constants on each
//! type are the event `param` values.

mod delay;
mod envelope;
mod gain;
mod levels;
mod mixer;
mod noise_gen;
mod oscillator;
mod sample_player;
mod spectrum;

pub use delay::AudioDelay;
pub use envelope::ArEnvelope;
pub use gain::AudioGain;
pub use levels::Levels;
pub use mixer::AudioMixer;
pub use noise_gen::NoiseGen;
pub use oscillator::{Oscillator, Waveform};
pub use sample_player::SamplePlayer;
pub use spectrum::{Spectrum, SPECTRUM_BANDS};
