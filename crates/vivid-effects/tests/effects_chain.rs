//! Texture chains against the headless backend: pass recording, caching,
//! reachability.

use std::any::Any;

use vivid_core::{Chain, Context};
use vivid_effects::{Blur, Hsv, Noise, Output, SolidColor};
use vivid_gpu::{GpuBackend, HeadlessBackend};

fn ctx() -> Context {
    Context::new(Box::new(HeadlessBackend::new()), 640, 360)
}

fn backend(ctx: &mut Context) -> &mut HeadlessBackend {
    let gpu: &mut dyn Any = ctx.gpu();
    gpu.downcast_mut::<HeadlessBackend>().unwrap()
}

/// Runs one full host frame: begin, process, submit.
fn run_frame(ctx: &mut Context, chain: &mut Chain) {
    ctx.begin_frame();
    chain.process(ctx);
    ctx.gpu().submit();
    if let Some(texture) = chain.output_texture() {
        ctx.gpu().present(texture);
    }
    ctx.end_frame();
}

#[test]
fn linear_chain_records_passes_and_caches_when_static() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    // speed 0 makes the noise static, so the whole chain is cacheable.
    chain.add("noise", Noise::new().scale(4.0).speed(0.0)).unwrap();
    chain.add("blur", Blur::new().input("noise").radius(5.0)).unwrap();
    chain.add("out", Output::new().input("blur")).unwrap();
    chain.set_output("out");

    run_frame(&mut ctx, &mut chain);

    assert_eq!(chain.revision_of("noise"), Some(1));
    assert_eq!(chain.revision_of("blur"), Some(1));
    assert!(chain.output_texture().is_some());
    // noise = 1 pass, blur = 2 passes (separable), output = none.
    assert_eq!(backend(&mut ctx).submitted_passes(), 3);
    assert_eq!(backend(&mut ctx).presented(), chain.output_texture());

    // Second frame: nothing changed, so no new GPU commands are recorded
    // beyond the presentation path, and revisions hold.
    run_frame(&mut ctx, &mut chain);
    assert_eq!(chain.revision_of("noise"), Some(1));
    assert_eq!(chain.revision_of("blur"), Some(1));
    assert_eq!(backend(&mut ctx).submitted_passes(), 3);

    // A parameter change re-cooks blur only; noise stays cached.
    chain
        .get_dyn_mut("blur")
        .unwrap()
        .set_param("radius", [8.0, 0.0, 0.0, 0.0]);
    run_frame(&mut ctx, &mut chain);
    assert_eq!(chain.revision_of("noise"), Some(1));
    assert_eq!(chain.revision_of("blur"), Some(2));
    assert_eq!(backend(&mut ctx).submitted_passes(), 5);
}

#[test]
fn animated_noise_cooks_every_frame() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("noise", Noise::new().speed(0.5)).unwrap();
    chain.set_output("noise");

    run_frame(&mut ctx, &mut chain);
    run_frame(&mut ctx, &mut chain);
    run_frame(&mut ctx, &mut chain);
    assert_eq!(chain.revision_of("noise"), Some(3));
    assert_eq!(backend(&mut ctx).submitted_passes(), 3);
}

#[test]
fn unreachable_branch_issues_no_work() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("noise", Noise::new()).unwrap();
    chain.add("blur", Blur::new()).unwrap(); // input left unset
    chain.set_output("blur");

    run_frame(&mut ctx, &mut chain);

    // blur runs with its slot absent and records nothing; noise is
    // unreachable from the selector and is never processed.
    assert_eq!(chain.revision_of("noise"), Some(0));
    assert_eq!(chain.revision_of("blur"), Some(1));
    assert_eq!(backend(&mut ctx).submitted_passes(), 0);
    // The target exists (allocated at init) but nothing rendered into it.
    assert!(chain.output_texture().is_some());
}

#[test]
fn resize_recreates_targets() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("solid", SolidColor::new().color(1.0, 0.0, 0.5, 1.0)).unwrap();
    chain.set_output("solid");

    run_frame(&mut ctx, &mut chain);
    let before = chain.output_texture().unwrap();

    ctx.set_size(1280, 720);
    // The resize does not dirty parameters, but SolidColor's target tracks
    // the frame size, so force a cook through a parameter touch.
    chain
        .get_dyn_mut("solid")
        .unwrap()
        .set_param("color", [1.0, 0.0, 0.5, 1.0]);
    run_frame(&mut ctx, &mut chain);
    let after = chain.output_texture().unwrap();

    assert_ne!(before, after);
    let desc = backend(&mut ctx).texture_desc(after).unwrap();
    assert_eq!((desc.width, desc.height), (1280, 720));
}

#[test]
fn hsv_passes_source_through_pipeline() {
    let mut ctx = ctx();
    let mut chain = Chain::new();
    chain.add("solid", SolidColor::new().color(0.2, 0.4, 0.6, 1.0)).unwrap();
    chain
        .add("colorize", Hsv::new().input("solid").hue_shift(0.6).saturation(0.8))
        .unwrap();
    chain.add("out", Output::new().input("colorize")).unwrap();
    chain.set_output("out");

    run_frame(&mut ctx, &mut chain);
    assert!(!chain.has_error());
    assert_eq!(backend(&mut ctx).submitted_passes(), 2);
    assert_eq!(backend(&mut ctx).presented(), chain.output_texture());
}
