//! Texture and value operators for the Vivid runtime.
//!
//! Texture operators record fullscreen passes into the frame's command
//! encoder; the WGSL for each lives under `shaders/` and is embedded at
//! build time, with an asset-loader override (`shaders/<name>.wgsl` on any
//! search root) for live shader editing.
//!
//! All operators follow the chain's caching contract: pure image
//! transforms (`Blur`, `Hsv`, `Mix`, `SolidColor`) report
//! `needs_cook = false` and re-render only when an input or parameter
//! changes; time-driven operators (`Noise` with nonzero speed, `Feedback`,
//! `Lfo`) cook every frame.

mod blur;
mod feedback;
mod hsv;
mod lfo;
mod mix;
mod noise;
mod output;
mod solid;
mod texture_op;

pub use blur::Blur;
pub use feedback::Feedback;
pub use hsv::Hsv;
pub use lfo::{Lfo, LfoWave};
pub use mix::{BlendMode, Mix};
pub use noise::{Noise, NoiseType};
pub use output::Output;
pub use solid::SolidColor;
