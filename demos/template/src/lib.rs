//! Vivid project template.
//!
//! This file is hot-reloaded when you save — edit while running!
//!
//! Run with: `vivid demos/template`
//!
//! Structure:
//! - `setup()`  — called once when the chain loads, and again on reload
//! - `update()` — called every frame (typically 60 fps)
//!
//! Operators connect by instance name (`.input("noise")`), every chain
//! needs an output selector, and audio needs `set_audio_output`. Check the
//! terminal for compile errors when a save fails to reload.

use vivid_audio::ops::{AudioGain, Levels, Oscillator, Waveform};
use vivid_core::ChainError;
use vivid_effects::{Blur, Hsv, Noise, Output};
use vivid_live::{vivid_chain, Chain, Context};

fn build(ctx: &mut Context) -> Result<Chain, ChainError> {
    let mut chain = Chain::new();

    // GENERATORS create images from nothing:
    //   Noise, SolidColor, Lfo, Feedback ...
    chain.add(
        "noise",
        Noise::new()
            .scale(4.0) // size of the pattern (higher = smaller details)
            .speed(0.5) // animation speed
            .octaves(4), // layers of detail (more = richer, slower)
    )?;

    // EFFECTS transform their input:
    //   Blur, Hsv, Mix, Feedback ...
    chain.add("soften", Blur::new().input("noise").radius(3.0))?;
    chain.add(
        "colorize",
        Hsv::new()
            .input("soften")
            .hue_shift(0.6) // 0-1 wraps around the color wheel
            .saturation(0.8),
    )?;

    // OUTPUT sends to screen — every chain needs exactly one.
    chain.add("out", Output::new().input("colorize"))?;
    chain.set_output("out");

    // AUDIO runs in the audio callback; pick its output separately.
    chain.add(
        "osc",
        Oscillator::new()
            .frequency(110.0)
            .waveform(Waveform::Saw)
            .volume(0.3),
    )?;
    chain.add("master", AudioGain::new().input("osc").gain(0.8))?;
    chain.add("levels", Levels::new().input("master"))?;
    chain.set_audio_output("master");

    if chain.has_error() {
        ctx.set_error(chain.error().to_string());
    }
    Ok(chain)
}

fn setup(ctx: &mut Context) -> Chain {
    build(ctx).unwrap_or_else(|err| {
        ctx.set_error(err.to_string());
        Chain::new()
    })
}

fn update(chain: &mut Chain, ctx: &mut Context) {
    // Audio-reactive visuals: the Levels analyzer publishes its RMS even
    // while it runs on the audio thread.
    let loudness = chain.value_of("levels").unwrap_or(0.0);
    if let Some(noise) = chain.get_dyn_mut("noise") {
        noise.set_param("scale", [4.0 + loudness * 10.0, 0.0, 0.0, 0.0]);
    }

    // Retune the oscillator once in a while from the frame clock.
    if ctx.frame() % 240 == 0 {
        let base = 110.0 + (ctx.time().sin() * 0.5 + 0.5) * 110.0;
        ctx.note_on("osc", base, 1.0);
    }

    chain.process(ctx);
    ctx.debug_value("loudness", loudness);
}

vivid_chain!(setup, update);
