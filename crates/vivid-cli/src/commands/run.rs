//! The live runtime loop: hot-reload, editor bridge, audio, frames.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Args;

use vivid_assets::AssetLoader;
use vivid_core::Context;
use vivid_gpu::{GpuBackend, HeadlessBackend};
use vivid_live::{
    EditorBridge, EditorCommand, HotReload, LoadedChain, DEFAULT_EDITOR_PORT, EDITOR_PORT_ENV,
};

use crate::host::{publish_chain, AudioRuntime};
use crate::project::ProjectConfig;
use crate::{EXIT_OK, EXIT_OPERATOR_PANIC};

/// Arguments for `vivid run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Chain project directory (a cdylib crate using `vivid_chain!`).
    pub project: PathBuf,

    /// Disable the audio callback.
    #[arg(long)]
    pub no_audio: bool,

    /// Frame rate of the render loop.
    #[arg(long, default_value_t = 60.0)]
    pub fps: f32,

    /// Disable the editor bridge.
    #[arg(long)]
    pub no_bridge: bool,
}

fn editor_port(config: &ProjectConfig) -> u16 {
    std::env::var(EDITOR_PORT_ENV)
        .ok()
        .and_then(|value| value.parse().ok())
        .or(config.editor_port)
        .unwrap_or(DEFAULT_EDITOR_PORT)
}

/// Runs the project until Ctrl-C. Returns the process exit code.
pub fn run(args: RunArgs) -> anyhow::Result<i32> {
    let project = args
        .project
        .canonicalize()
        .with_context(|| format!("project directory {}", args.project.display()))?;
    let mut config = ProjectConfig::load(&project)?;
    if args.no_audio {
        config.audio.disabled = true;
    }

    let assets = AssetLoader::global();
    assets.add_search_path(&project);
    for extra in &config.asset_paths {
        assets.add_search_path(project.join(extra));
    }

    let mut ctx = Context::new(
        Box::new(HeadlessBackend::new()),
        config.window.width,
        config.window.height,
    );

    let bridge = if args.no_bridge {
        None
    } else {
        match EditorBridge::start(editor_port(&config)) {
            Ok(bridge) => Some(bridge),
            Err(err) => {
                tracing::warn!(%err, "editor bridge unavailable");
                None
            }
        }
    };

    let mut reload = HotReload::new(&project)?;
    let mut audio = AudioRuntime::new(config.audio.clone());

    // Initial build is load-bearing: no module, no session.
    reload.reload().map_err(|err| {
        if let Some(bridge) = &bridge {
            bridge.send_compile_status(false, err.to_string());
        }
        anyhow::anyhow!("initial chain build failed:\n{err}")
    })?;
    if let Some(bridge) = &bridge {
        bridge.send_compile_status(true, "");
    }

    let mut chain = setup_chain(&reload, &mut ctx, &mut audio, bridge.as_ref(), None);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::Relaxed))
            .context("installing Ctrl-C handler")?;
    }

    let frame_duration = Duration::from_secs_f32(1.0 / args.fps.max(1.0));
    let mut last_error = String::new();

    tracing::info!(project = %project.display(), "running — Ctrl-C to quit");

    while running.load(Ordering::Relaxed) {
        let frame_start = Instant::now();

        // Editor commands.
        if let Some(bridge) = &bridge {
            for command in bridge.poll() {
                match command {
                    EditorCommand::Reload => reload.force_reload(),
                    EditorCommand::SetParam { op, name, value } => {
                        let mut padded = [0.0f32; 4];
                        for (slot, v) in padded.iter_mut().zip(value.iter()) {
                            *slot = *v;
                        }
                        apply_param(&mut chain, &audio, &mut ctx, &op, &name, padded);
                    }
                }
            }
        }

        // Hot reload: audio down → snapshot → swap → restore → audio up.
        if reload.check_needs_reload() {
            audio.uninstall(chain.chain_mut(), &mut ctx);
            let snapshot = chain.chain_mut().snapshot_all();
            chain.chain_mut().destroy(&mut ctx);
            drop(chain);

            let result = reload.reload();
            if let Some(bridge) = &bridge {
                match &result {
                    Ok(()) => bridge.send_compile_status(true, ""),
                    Err(err) => bridge.send_compile_status(false, err.to_string()),
                }
            }
            if let Err(err) = &result {
                // Previous module stays live; rebuild from it.
                tracing::warn!(%err, "reload failed; keeping previous chain");
            }
            chain = setup_chain(&reload, &mut ctx, &mut audio, bridge.as_ref(), Some(snapshot));
        }

        // One frame. A panic inside an operator is a user-code bug; report
        // and exit with the dedicated code.
        ctx.begin_frame();
        let frame = std::panic::catch_unwind(AssertUnwindSafe(|| {
            chain.update(&mut ctx);
        }));
        if let Err(panic) = frame {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            tracing::error!(message = %message, "operator panicked during process");
            return Ok(EXIT_OPERATOR_PANIC);
        }

        ctx.gpu().submit();
        if let Some(texture) = chain.chain().output_texture() {
            ctx.gpu().present(texture);
        }

        let chain_error = chain.chain().error().to_string();
        if !chain_error.is_empty() && chain_error != last_error {
            tracing::warn!(error = %chain_error, "chain reported errors");
            last_error = chain_error;
        }

        ctx.end_frame();

        if let Some(remaining) = frame_duration.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    tracing::info!("shutting down");
    audio.uninstall(chain.chain_mut(), &mut ctx);
    chain.chain_mut().destroy(&mut ctx);
    drop(chain);
    Ok(EXIT_OK)
}

/// Builds a chain from the currently loaded module, restores state, and
/// brings audio and the editors up to date.
fn setup_chain(
    reload: &HotReload,
    ctx: &mut Context,
    audio: &mut AudioRuntime,
    bridge: Option<&EditorBridge>,
    snapshot: Option<std::collections::HashMap<String, Box<dyn vivid_core::OperatorState>>>,
) -> LoadedChain {
    let module = reload.module().expect("a module is loaded");
    let mut chain = module.setup(ctx);

    if let Some(snapshot) = snapshot {
        chain.chain_mut().restore_all(snapshot);
    }
    // Install sorts the chain; the first frame does init and cooking.
    audio.install(chain.chain_mut(), ctx);

    if let Some(bridge) = bridge {
        publish_chain(bridge, chain.chain());
    }
    if chain.chain().has_error() {
        tracing::warn!(error = %chain.chain().error(), "chain built with errors");
    }
    chain
}

fn apply_param(
    chain: &mut LoadedChain,
    audio: &AudioRuntime,
    ctx: &mut Context,
    op: &str,
    name: &str,
    value: [f32; 4],
) {
    // Installed audio operators take the event path; everything else is a
    // direct main-thread write.
    if audio.param_event(ctx, op, name, value[0]) {
        return;
    }
    match chain.chain_mut().get_dyn_mut(op) {
        Some(operator) => {
            if !operator.set_param(name, value) {
                tracing::warn!(op, name, "editor set unknown parameter");
            }
        }
        None => tracing::warn!(op, "editor set parameter on unknown operator"),
    }
}
