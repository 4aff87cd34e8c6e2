//! Audio-side contracts: buffers, events, and the narrow audio trait.
//!
//! The chain schedules every operator, but only the audio thread runs
//! audio-kind operators. That split lives in two traits:
//! [`Operator`](crate::Operator) is what the chain sees;
//! [`AudioOperator`] is the narrower contract the audio graph drives per
//! block. An operator advertises the second trait through
//! [`Operator::as_audio`](crate::Operator::as_audio) — the engine never
//! downcasts concrete types.

use std::sync::atomic::{AtomicU32, Ordering};

/// Number of interleaved channels in every audio buffer.
pub const AUDIO_CHANNELS: usize = 2;

/// Largest block an operator output buffer must absorb without allocating.
///
/// Covers low-latency configurations and offline export. Pulls larger than
/// this still work; the allocation is accepted and counted.
pub const MAX_BLOCK_FRAMES: usize = 2048;

/// Interleaved stereo sample buffer owned by one audio operator.
///
/// The producing operator is the only writer; downstream operators read it
/// through [`AudioInputs`]. Capacity is reserved up front on the main
/// thread so per-block resizes stay allocation-free up to
/// [`MAX_BLOCK_FRAMES`].
#[derive(Default)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    frames: usize,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer with capacity reserved for [`MAX_BLOCK_FRAMES`].
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::with_capacity(MAX_BLOCK_FRAMES * AUDIO_CHANNELS),
            frames: 0,
            sample_rate,
        }
    }

    /// Sample rate the contents were produced at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sets the sample rate (main thread, at install time).
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Frames currently held.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns `true` if the buffer holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Resizes to `frames` frames of silence-initialized storage and
    /// returns the writable sample slice.
    ///
    /// Within reserved capacity this never allocates.
    pub fn write_frames(&mut self, frames: usize) -> &mut [f32] {
        self.frames = frames;
        self.samples.clear();
        self.samples.resize(frames * AUDIO_CHANNELS, 0.0);
        &mut self.samples
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Zeroes the current contents without changing the frame count.
    pub fn silence(&mut self) {
        self.samples.fill(0.0);
    }

    /// Drops the heap storage. Called from operator `cleanup`.
    pub fn release(&mut self) {
        self.samples = Vec::new();
        self.frames = 0;
    }
}

/// Kind of a cross-thread audio event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioEventKind {
    /// Start a note; `value1` is frequency in Hz, `value2` velocity 0–1.
    NoteOn,
    /// Release a note.
    NoteOff,
    /// One-shot trigger (drums, envelopes).
    Trigger,
    /// Parameter write; `param` indexes the target's parameter set,
    /// `value1` is the new component-0 value.
    ParamChange,
    /// Reset the operator's internal state.
    Reset,
}

/// Value record sent from the main thread to the audio thread.
///
/// Events apply at the start of the first block that begins after they are
/// popped — block-quantized, not sample-accurate within a block, which
/// keeps the per-sample loops branch-free.
#[derive(Clone, Copy, Debug)]
pub struct AudioEvent {
    /// Event kind.
    pub kind: AudioEventKind,
    /// Target operator: index into the audio-subgraph execution order.
    pub target: u32,
    /// Parameter index for [`AudioEventKind::ParamChange`].
    pub param: u32,
    /// Primary payload (frequency, parameter value).
    pub value1: f32,
    /// Secondary payload (velocity).
    pub value2: f32,
}

impl AudioEvent {
    /// A `NoteOn` event.
    pub fn note_on(target: u32, freq: f32, velocity: f32) -> Self {
        Self {
            kind: AudioEventKind::NoteOn,
            target,
            param: 0,
            value1: freq,
            value2: velocity,
        }
    }

    /// A `NoteOff` event.
    pub fn note_off(target: u32) -> Self {
        Self {
            kind: AudioEventKind::NoteOff,
            target,
            param: 0,
            value1: 0.0,
            value2: 0.0,
        }
    }

    /// A one-shot `Trigger` event.
    pub fn trigger(target: u32) -> Self {
        Self {
            kind: AudioEventKind::Trigger,
            target,
            param: 0,
            value1: 0.0,
            value2: 0.0,
        }
    }

    /// A `ParamChange` event.
    pub fn param_change(target: u32, param: u32, value: f32) -> Self {
        Self {
            kind: AudioEventKind::ParamChange,
            target,
            param,
            value1: value,
            value2: 0.0,
        }
    }

    /// A `Reset` event.
    pub fn reset(target: u32) -> Self {
        Self {
            kind: AudioEventKind::Reset,
            target,
            param: 0,
            value1: 0.0,
            value2: 0.0,
        }
    }
}

/// Per-block timing passed to [`AudioOperator::generate`].
#[derive(Clone, Copy, Debug)]
pub struct BlockContext {
    /// Session sample rate.
    pub sample_rate: u32,
    /// Frames requested this block.
    pub frames: usize,
    /// Absolute frame index of the block's first sample.
    pub start_frame: u64,
}

impl BlockContext {
    /// Seconds at the start of this block.
    pub fn time(&self) -> f64 {
        self.start_frame as f64 / f64::from(self.sample_rate)
    }
}

/// Resolved upstream outputs handed to [`AudioOperator::generate`].
///
/// Slots mirror the operator's chain input slots; an absent slot means the
/// input did not resolve and the operator substitutes silence.
pub struct AudioInputs<'a> {
    entries: Vec<AudioInputRef<'a>>,
}

/// One resolved audio input.
pub struct AudioInputRef<'a> {
    /// Upstream buffer, for `Audio`/`AudioValue` producers.
    pub buffer: Option<&'a AudioBuffer>,
    /// Upstream scalar, for `Value`/`AudioValue` producers.
    pub scalar: Option<f32>,
}

impl<'a> AudioInputs<'a> {
    /// Builds a view from per-slot entries.
    pub fn new(entries: Vec<AudioInputRef<'a>>) -> Self {
        Self { entries }
    }

    /// An empty view (generator operators).
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Upstream buffer at `slot`, if connected and audio-producing.
    pub fn buffer(&self, slot: usize) -> Option<&'a AudioBuffer> {
        self.entries.get(slot).and_then(|e| e.buffer)
    }

    /// Upstream scalar at `slot`, if connected and value-producing.
    pub fn scalar(&self, slot: usize) -> Option<f32> {
        self.entries.get(slot).and_then(|e| e.scalar)
    }
}

/// The narrow trait the audio graph drives on the audio thread.
///
/// Everything here runs under real-time constraints: no allocation beyond
/// the accepted oversize-block case, no locking, no blocking on the main
/// thread.
pub trait AudioOperator {
    /// Called once on the main thread when the graph is installed.
    /// Pre-allocates the output buffer and latches the session format.
    fn prepare(&mut self, sample_rate: u32, max_block_frames: usize);

    /// Produces `block.frames` frames into the output buffer.
    ///
    /// All resolved inputs were generated earlier in the same block.
    fn generate(&mut self, block: &BlockContext, inputs: &AudioInputs);

    /// Applies one event at a block boundary.
    fn handle_event(&mut self, event: &AudioEvent);

    /// The operator's output buffer.
    fn output(&self) -> &AudioBuffer;

    /// Synchronously readable scalar, for `Value` and `AudioValue` kinds.
    fn scalar(&self) -> Option<f32> {
        None
    }

    /// Clears internal DSP state without touching parameters.
    fn reset(&mut self) {}
}

/// Main-thread handle to an installed audio graph.
///
/// Implemented by the audio crate; the [`Context`](crate::Context) stores
/// it as a trait object so user code can queue events without the core
/// depending on the ring-buffer implementation.
pub trait AudioEvents {
    /// Queues an event. Returns `false` (and counts a drop) when full.
    fn push(&mut self, event: AudioEvent) -> bool;

    /// Events dropped because the queue was full.
    fn dropped_count(&self) -> u64;

    /// Resolves a chain instance name to its audio-order index.
    fn operator_index(&self, name: &str) -> Option<u32>;

    /// Session sample rate.
    fn sample_rate(&self) -> u32;

    /// Session block size in frames.
    fn block_size(&self) -> usize;
}

/// A scalar published from the audio thread, readable from the main thread.
///
/// f32 bits in an `AtomicU32`; relaxed ordering is enough for a monitoring
/// value that changes once per block.
#[derive(Default)]
pub struct SharedScalar(AtomicU32);

impl SharedScalar {
    /// Creates a shared scalar holding `value`.
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// Publishes a new value (audio thread).
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Reads the latest value (any thread).
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_write_within_capacity_is_stable() {
        let mut buf = AudioBuffer::new(48000);
        let base = buf.write_frames(256).as_ptr();
        buf.write_frames(1024);
        buf.write_frames(MAX_BLOCK_FRAMES);
        // Same allocation across every in-capacity resize.
        assert_eq!(buf.write_frames(256).as_ptr(), base);
        assert_eq!(buf.frames(), 256);
        assert_eq!(buf.samples().len(), 256 * AUDIO_CHANNELS);
    }

    #[test]
    fn write_frames_clears_previous_content() {
        let mut buf = AudioBuffer::new(48000);
        buf.write_frames(4).fill(0.7);
        let out = buf.write_frames(8);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn block_time() {
        let block = BlockContext {
            sample_rate: 48000,
            frames: 256,
            start_frame: 48000,
        };
        assert!((block.time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn shared_scalar_roundtrip() {
        let s = SharedScalar::new(0.0);
        s.store(-3.25);
        assert_eq!(s.load(), -3.25);
    }
}
