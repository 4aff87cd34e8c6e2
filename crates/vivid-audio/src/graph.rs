//! The audio-side scheduler.
//!
//! [`AudioGraph::install`] carves the audio subgraph out of a built chain:
//! every audio-capable operator that feeds the audio output selector is
//! moved into the graph (which the audio thread then owns), and a tap node
//! takes its place in the chain so visual consumers keep resolving the same
//! instance name and reading its scalar. [`AudioGraph::uninstall`] moves
//! the operators back — required before snapshotting state or tearing the
//! chain down for a hot-reload.
//!
//! Ownership transfer is the whole concurrency story: after install, the
//! audio thread is the only code touching audio-operator state, and the
//! main thread talks to it exclusively through the event bus and atomics.
//! Parameter writes to installed operators travel as `ParamChange` events,
//! applied at block boundaries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use vivid_core::audio::{
    AudioEvent, AudioEvents, AudioInputRef, AudioInputs, BlockContext, SharedScalar,
    AUDIO_CHANNELS, MAX_BLOCK_FRAMES,
};
use vivid_core::{Chain, Context, Inputs, Operator, OutputKind};

use crate::bus::{event_bus, EventReceiver, EventSender, DEFAULT_EVENT_CAPACITY};

/// Errors raised while building the audio graph.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The chain has no audio output selector, or nothing audio-capable
    /// feeds it.
    #[error("chain has no installable audio subgraph")]
    NoAudioOutput,
}

/// Counters the audio thread publishes for the monitoring overlay.
#[derive(Default)]
pub struct AudioMonitor {
    audio_thread_allocs: AtomicU64,
    blocks_processed: AtomicU64,
    unroutable_events: AtomicU64,
}

impl AudioMonitor {
    /// Blocks whose requested size exceeded the pre-allocated capacity.
    pub fn audio_thread_allocs(&self) -> u64 {
        self.audio_thread_allocs.load(Ordering::Relaxed)
    }

    /// Blocks pulled since install.
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed.load(Ordering::Relaxed)
    }

    /// Events whose target index did not resolve to a node.
    pub fn unroutable_events(&self) -> u64 {
        self.unroutable_events.load(Ordering::Relaxed)
    }
}

/// Stand-in left in the chain for an operator moved to the audio thread.
///
/// Reports the original output kind so downstream kind checks keep
/// passing, and republishes the moved operator's scalar through the shared
/// atomic.
struct ScalarTap {
    kind: OutputKind,
    shared: Arc<SharedScalar>,
}

impl Operator for ScalarTap {
    fn type_name(&self) -> &'static str {
        "AudioTap"
    }
    fn output_kind(&self) -> OutputKind {
        self.kind
    }
    fn process(&mut self, _ctx: &mut Context, _inputs: &Inputs) {}
    fn needs_cook(&self, _ctx: &Context) -> bool {
        false
    }
    fn value_output(&self) -> Option<f32> {
        Some(self.shared.load())
    }
}

struct AudioNode {
    name: String,
    op: Option<Box<dyn Operator>>,
    tap: Arc<SharedScalar>,
    /// Per input slot: producer index within `nodes`.
    resolved: Vec<Option<usize>>,
}

/// Execution-ordered audio subgraph, owned by the audio callback.
pub struct AudioGraph {
    nodes: Vec<AudioNode>,
    output_index: Option<usize>,
    events: EventReceiver,
    sample_rate: u32,
    frame_counter: u64,
    monitor: Arc<AudioMonitor>,
}

/// Main-thread handle to an installed [`AudioGraph`].
///
/// Installed into the [`Context`] so user code can queue events by
/// instance name; also exposes the monitoring counters for the inspector.
pub struct AudioHandle {
    sender: EventSender,
    indices: HashMap<String, u32>,
    sample_rate: u32,
    block_size: usize,
    monitor: Arc<AudioMonitor>,
}

impl AudioGraph {
    /// Extracts the audio subgraph from `chain` and returns the graph
    /// (move it to the audio callback) plus the main-thread handle.
    ///
    /// Members are the audio-eligible ancestors of the audio output
    /// selector, taken in execution order. Operators of audio kind that do
    /// not expose [`Operator::as_audio`] are left in the chain with a
    /// warning.
    pub fn install(
        chain: &mut Chain,
        sample_rate: u32,
        block_size: usize,
    ) -> Result<(AudioGraph, AudioHandle), AudioError> {
        let member_names = chain.audio_subgraph();

        let mut nodes: Vec<AudioNode> = Vec::new();
        for name in &member_names {
            let capable = chain
                .get_dyn_mut(name)
                .is_some_and(|op| op.as_audio().is_some());
            if !capable {
                tracing::warn!(name = %name, "audio-kind operator without an audio face; skipping");
                continue;
            }
            let kind = chain.get_dyn(name).map(|op| op.output_kind()).unwrap();
            let tap = Arc::new(SharedScalar::new(0.0));
            let op = chain
                .replace_operator(
                    name,
                    Box::new(ScalarTap {
                        kind,
                        shared: Arc::clone(&tap),
                    }),
                )
                .expect("audio member exists in chain");
            nodes.push(AudioNode {
                name: name.clone(),
                op: Some(op),
                tap,
                resolved: Vec::new(),
            });
        }

        if nodes.is_empty() {
            return Err(AudioError::NoAudioOutput);
        }

        let indices: HashMap<String, u32> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i as u32))
            .collect();

        // Resolve input names within the member list. Anything else
        // (visual operators, missing names) runs as an absent slot.
        for i in 0..nodes.len() {
            let resolved: Vec<Option<usize>> = {
                let op = nodes[i].op.as_deref().unwrap();
                op.inputs().map_or_else(Vec::new, |slots| {
                    (0..slots.len())
                        .map(|s| {
                            slots
                                .name(s)
                                .and_then(|n| indices.get(n).copied())
                                .map(|p| p as usize)
                                .filter(|&p| p != i)
                        })
                        .collect()
                })
            };
            nodes[i].resolved = resolved;
        }

        // Pre-allocate every output buffer on the main thread.
        for node in &mut nodes {
            let audio = node.op.as_deref_mut().unwrap().as_audio().unwrap();
            audio.prepare(sample_rate, MAX_BLOCK_FRAMES);
        }

        let output_index = chain
            .audio_output_name()
            .and_then(|n| indices.get(n))
            .map(|&i| i as usize);
        if output_index.is_none() {
            tracing::warn!("audio output selector is not an installed member; output is silence");
        }

        let (sender, events) = event_bus(DEFAULT_EVENT_CAPACITY);
        let monitor = Arc::new(AudioMonitor::default());

        tracing::info!(
            members = nodes.len(),
            sample_rate,
            block_size,
            "audio graph installed"
        );

        Ok((
            AudioGraph {
                nodes,
                output_index,
                events,
                sample_rate,
                frame_counter: 0,
                monitor: Arc::clone(&monitor),
            },
            AudioHandle {
                sender,
                indices,
                sample_rate,
                block_size,
                monitor,
            },
        ))
    }

    /// Moves every operator back into `chain`, replacing the taps.
    ///
    /// The host must have stopped the audio callback first; this consumes
    /// the graph, so a live callback cannot keep pulling it.
    pub fn uninstall(mut self, chain: &mut Chain) {
        for node in self.nodes.drain(..) {
            let Some(op) = node.op else { continue };
            if chain.replace_operator(&node.name, op).is_none() {
                tracing::warn!(name = %node.name, "operator slot vanished during uninstall");
            }
        }
        tracing::info!("audio graph uninstalled");
    }

    /// Number of installed operators.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph holds no operators.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Absolute frame index of the next block's first sample.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Produces one block: drains pending events (applied at the block
    /// start), walks the execution order, publishes tap scalars, and copies
    /// the output selector's buffer into `out` (interleaved stereo).
    ///
    /// Real-time safe for `frames <= MAX_BLOCK_FRAMES`; larger pulls are
    /// accepted and counted on the monitor.
    pub fn pull(&mut self, out: &mut [f32], frames: usize) {
        // Bound the drain so a flooding producer cannot stall the block.
        for _ in 0..DEFAULT_EVENT_CAPACITY {
            let Some(ev) = self.events.pop() else { break };
            self.dispatch(&ev);
        }

        if frames > MAX_BLOCK_FRAMES {
            self.monitor.audio_thread_allocs.fetch_add(1, Ordering::Relaxed);
        }

        let block = BlockContext {
            sample_rate: self.sample_rate,
            frames,
            start_frame: self.frame_counter,
        };

        for i in 0..self.nodes.len() {
            let Some(mut op) = self.nodes[i].op.take() else {
                continue;
            };
            {
                let inputs = self.gather_inputs(i);
                if let Some(audio) = op.as_audio() {
                    audio.generate(&block, &inputs);
                    if let Some(scalar) = audio.scalar() {
                        self.nodes[i].tap.store(scalar);
                    }
                }
            }
            self.nodes[i].op = Some(op);
        }

        self.frame_counter += frames as u64;
        self.monitor.blocks_processed.fetch_add(1, Ordering::Relaxed);

        out.fill(0.0);
        if let Some(oi) = self.output_index
            && let Some(buf) = self.nodes[oi].op.as_deref().and_then(|o| o.audio_output())
        {
            let n = out
                .len()
                .min(buf.samples().len())
                .min(frames * AUDIO_CHANNELS);
            out[..n].copy_from_slice(&buf.samples()[..n]);
        }
    }

    fn dispatch(&mut self, event: &AudioEvent) {
        match self.nodes.get_mut(event.target as usize) {
            Some(node) => {
                if let Some(audio) = node.op.as_deref_mut().and_then(|op| op.as_audio()) {
                    audio.handle_event(event);
                }
            }
            None => {
                self.monitor.unroutable_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn gather_inputs(&self, i: usize) -> AudioInputs<'_> {
        let node = &self.nodes[i];
        if node.resolved.is_empty() {
            return AudioInputs::empty();
        }
        AudioInputs::new(
            node.resolved
                .iter()
                .map(|r| match r.and_then(|p| self.nodes[p].op.as_deref()) {
                    Some(op) => AudioInputRef {
                        buffer: op.audio_output(),
                        scalar: op.value_output(),
                    },
                    None => AudioInputRef {
                        buffer: None,
                        scalar: None,
                    },
                })
                .collect(),
        )
    }
}

impl AudioHandle {
    /// Monitoring counters published by the audio thread.
    pub fn monitor(&self) -> &AudioMonitor {
        &self.monitor
    }

    /// Approximate queued-event count.
    pub fn queue_len(&self) -> usize {
        self.sender.len()
    }
}

impl AudioEvents for AudioHandle {
    fn push(&mut self, event: AudioEvent) -> bool {
        self.sender.push(event)
    }

    fn dropped_count(&self) -> u64 {
        self.sender.dropped_count()
    }

    fn operator_index(&self, name: &str) -> Option<u32> {
        self.indices.get(name).copied()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}
