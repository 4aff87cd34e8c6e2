//! Operator graph execution engine for the Vivid creative-coding runtime.
//!
//! A user-authored [`Chain`] of media operators runs every frame to produce
//! one displayed texture and optional audio. This crate is the engine under
//! that model:
//!
//! - [`Context`] — the per-frame environment (time, input, GPU backend,
//!   audio handle, debug sinks);
//! - [`Operator`] — the node contract: typed output kind, named inputs,
//!   parameters, lifecycle, cook flag;
//! - [`Chain`] — the container: dependency resolution, Kahn-ordered
//!   execution restricted to the output selectors, cook-revision caching,
//!   state snapshots for hot-reload;
//! - [`audio`] — the audio-side contracts shared with the audio graph
//!   crate: buffers, block-quantized events, the narrow
//!   [`AudioOperator`](audio::AudioOperator) trait.
//!
//! Leaf operator implementations live in the `vivid-effects` and
//! `vivid-audio` crates; GPU backends in `vivid-gpu`.
//!
//! # Threading
//!
//! Chain state is single-threaded: `Chain::process`, parameter writes, and
//! topology mutations all happen on the main thread. The only cross-thread
//! traffic is the audio event ring (main → audio) and atomic monitoring
//! scalars (audio → main); see the `vivid-audio` crate.

pub mod audio;
pub mod chain;
pub mod context;
pub mod error;
pub mod operator;
pub mod param;
pub mod state;

pub use chain::{Chain, InputRef, Inputs};
pub use context::{ButtonState, Context, InputState};
pub use error::ChainError;
pub use operator::{accepts, InputSlots, Operator, OutputKind, MAX_INPUTS};
pub use param::{ParamDecl, ParamKind, ParamSet, ParamValues};
pub use state::{downcast_state, OperatorState};
