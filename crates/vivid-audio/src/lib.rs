//! Audio side of the Vivid runtime: the event bus, the audio graph, and
//! the audio leaf operators.
//!
//! # Architecture
//!
//! The chain schedules every operator, but audio runs under real-time
//! constraints the render frame does not have. The split works by
//! **ownership transfer**: [`AudioGraph::install`] moves the audio
//! subgraph's operators out of the chain and into a graph the audio
//! callback owns, leaving tap nodes behind so the chain's name resolution
//! and the analyzers' scalars keep working on the main thread.
//!
//! Cross-thread traffic after install:
//!
//! - main → audio: [`AudioEvent`](vivid_core::audio::AudioEvent) records
//!   through the lock-free [`bus`] (block-quantized delivery, drops
//!   counted, never blocking);
//! - audio → main: atomic scalars — analyzer taps and the
//!   [`AudioMonitor`] counters.
//!
//! Hot-reload (and any other chain teardown) must
//! [`uninstall`](AudioGraph::uninstall) first, which moves the operators
//! back so `snapshot_all` sees them.

pub mod bus;
pub mod graph;
pub mod ops;

pub use bus::{event_bus, EventReceiver, EventSender, DEFAULT_EVENT_CAPACITY};
pub use graph::{AudioError, AudioGraph, AudioHandle, AudioMonitor};
