//! Shared host plumbing: the audio runtime and editor-bridge publishing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use vivid_audio::{AudioGraph, AudioHandle};
use vivid_core::{Chain, Context};
use vivid_live::{EditorBridge, OperatorInfo, ParamInfo};

use crate::project::AudioConfig;

/// Owns the cpal stream and the installed audio graph.
///
/// The graph lives in an `Arc<Mutex<Option<..>>>` shared with the
/// callback: the callback `try_lock`s per block and outputs silence if the
/// main thread holds the lock, which only happens during install/uninstall
/// — the "pause audio before reload" rule, expressed as ownership.
pub struct AudioRuntime {
    config: AudioConfig,
    stream: Option<cpal::Stream>,
    graph: Arc<Mutex<Option<AudioGraph>>>,
    /// `(operator, param) -> index` for routing editor writes as events.
    param_index: HashMap<(String, String), u32>,
}

impl AudioRuntime {
    /// Creates an idle runtime.
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            stream: None,
            graph: Arc::new(Mutex::new(None)),
            param_index: HashMap::new(),
        }
    }

    /// Returns `true` while a graph is installed.
    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Extracts the audio subgraph from `chain`, hands the graph to the
    /// callback, and installs the event handle into `ctx`.
    ///
    /// A chain without an audio output is not an error; the session just
    /// runs silent.
    pub fn install(&mut self, chain: &mut Chain, ctx: &mut Context) {
        if self.config.disabled {
            return;
        }

        // Record parameter indices while the operators are still in the
        // chain; editor writes to installed operators become ParamChange
        // events.
        self.param_index.clear();
        for name in chain.audio_subgraph() {
            if let Some(op) = chain.get_dyn(&name) {
                for (i, decl) in op.params().iter().enumerate() {
                    self.param_index
                        .insert((name.clone(), decl.name.to_string()), i as u32);
                }
            }
        }

        let (graph, handle) =
            match AudioGraph::install(chain, self.config.sample_rate, self.config.block_size) {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::info!(%err, "running without audio");
                    return;
                }
            };

        *self.graph.lock().unwrap() = Some(graph);
        self.start_stream();
        ctx.set_audio(Box::new(handle));
    }

    fn start_stream(&mut self) {
        let host = cpal::default_host();
        let Some(device) = host.default_output_device() else {
            tracing::warn!("no audio output device; graph will not be pulled");
            return;
        };
        let stream_config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.config.block_size as u32),
        };

        let graph = Arc::clone(&self.graph);
        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                match graph.try_lock() {
                    Ok(mut guard) => match guard.as_mut() {
                        Some(graph) => graph.pull(data, data.len() / 2),
                        None => data.fill(0.0),
                    },
                    // Main thread is swapping the graph: one silent block.
                    Err(_) => data.fill(0.0),
                }
            },
            |err| tracing::warn!(%err, "audio stream error"),
            None,
        );

        match stream {
            Ok(stream) => match stream.play() {
                Ok(()) => self.stream = Some(stream),
                Err(err) => tracing::warn!(%err, "failed to start audio stream"),
            },
            Err(err) => tracing::warn!(%err, "failed to open audio stream"),
        }
    }

    /// Stops the callback and moves every audio operator back into the
    /// chain. Must run before snapshot/teardown.
    pub fn uninstall(&mut self, chain: &mut Chain, ctx: &mut Context) {
        self.stream = None;
        if let Some(graph) = self.graph.lock().unwrap().take() {
            graph.uninstall(chain);
        }
        ctx.take_audio();
        self.param_index.clear();
    }

    /// Routes an editor parameter write to an installed audio operator as
    /// a `ParamChange` event. Returns `false` if the operator is not an
    /// installed audio member.
    pub fn param_event(&self, ctx: &mut Context, op: &str, name: &str, value: f32) -> bool {
        let Some(&index) = self.param_index.get(&(op.to_string(), name.to_string())) else {
            return false;
        };
        ctx.audio_param(op, index, value)
    }
}

/// Installs an [`AudioHandle`] into the context for hosts that pull the
/// graph themselves (offline render).
pub fn install_offline_audio(ctx: &mut Context, handle: AudioHandle) {
    ctx.set_audio(Box::new(handle));
}

/// Publishes the chain's operators and parameters to connected editors.
pub fn publish_chain(bridge: &EditorBridge, chain: &Chain) {
    let order: Vec<String> = chain.execution_order().iter().map(|s| s.to_string()).collect();

    let mut operators = Vec::with_capacity(order.len());
    let mut params = Vec::new();
    for name in &order {
        let Some(op) = chain.get_dyn(name) else { continue };
        let inputs = op.inputs().map_or_else(Vec::new, |slots| {
            (0..slots.len())
                .filter_map(|s| slots.name(s).map(str::to_string))
                .collect()
        });
        operators.push(OperatorInfo {
            name: name.clone(),
            kind: op.output_kind().tag().to_string(),
            line: 0,
            inputs,
        });
        for decl in op.params() {
            params.push(ParamInfo {
                op: name.clone(),
                name: decl.name.to_string(),
                kind: decl.kind.tag().to_string(),
                value: op.get_param(decl.name).unwrap_or_default(),
                min: decl.min,
                max: decl.max,
            });
        }
    }

    bridge.send_operators(operators);
    bridge.send_params(params);
}
