//! Offline render: fixed-step frames, manually pulled audio, WAV capture.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use vivid_assets::AssetLoader;
use vivid_audio::AudioGraph;
use vivid_core::Context;
use vivid_gpu::{GpuBackend, HeadlessBackend};
use vivid_live::HotReload;

use crate::host::install_offline_audio;
use crate::project::ProjectConfig;
use crate::EXIT_OK;

/// Arguments for `vivid render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Chain project directory.
    pub project: PathBuf,

    /// Number of frames to render.
    #[arg(long, default_value_t = 300)]
    pub frames: u32,

    /// Simulated frame rate.
    #[arg(long, default_value_t = 60.0)]
    pub fps: f32,

    /// Output WAV path (default: `<project>/render.wav`).
    #[arg(long)]
    pub audio_out: Option<PathBuf>,
}

/// Renders the project headless. Returns the process exit code.
pub fn run(args: RenderArgs) -> anyhow::Result<i32> {
    let project = args
        .project
        .canonicalize()
        .with_context(|| format!("project directory {}", args.project.display()))?;
    let config = ProjectConfig::load(&project)?;

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
    ctx.set_recording(true);

    let mut reload = HotReload::new(&project)?;
    reload
        .reload()
        .map_err(|err| anyhow::anyhow!("chain build failed:\n{err}"))?;
    let module = reload.module().expect("module just loaded");

    let mut chain = module.setup(&mut ctx);

    // Audio: pull the graph by hand, one frame's worth per video frame.
    let sample_rate = config.audio.sample_rate;
    let mut audio_graph = match AudioGraph::install(
        chain.chain_mut(),
        sample_rate,
        config.audio.block_size,
    ) {
        Ok((graph, handle)) => {
            install_offline_audio(&mut ctx, handle);
            Some(graph)
        }
        Err(_) => None,
    };

    let wav_path = args
        .audio_out
        .clone()
        .unwrap_or_else(|| project.join("render.wav"));
    let mut wav = if audio_graph.is_some() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        Some(
            hound::WavWriter::create(&wav_path, spec)
                .with_context(|| format!("creating {}", wav_path.display()))?,
        )
    } else {
        None
    };

    let progress = ProgressBar::new(u64::from(args.frames));
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} frames ({eta})")
            .expect("static template"),
    );

    let fps = args.fps.max(1.0);
    let samples_per_frame = f64::from(sample_rate) / f64::from(fps);
    let mut audio_clock = 0.0f64;
    let mut block = vec![0.0f32; config.audio.block_size * 2];

    for frame in 0..args.frames {
        ctx.begin_frame_at(f64::from(frame) / f64::from(fps));
        chain.update(&mut ctx);
        ctx.gpu().submit();
        if let Some(texture) = chain.chain().output_texture() {
            ctx.gpu().present(texture);
        }
        ctx.end_frame();

        if let Some(graph) = audio_graph.as_mut() {
            audio_clock += samples_per_frame;
            while audio_clock >= config.audio.block_size as f64 {
                graph.pull(&mut block, config.audio.block_size);
                if let Some(wav) = wav.as_mut() {
                    for &sample in &block {
                        wav.write_sample(sample)?;
                    }
                }
                audio_clock -= config.audio.block_size as f64;
            }
        }

        progress.inc(1);
    }
    progress.finish();

    if let Some(wav) = wav {
        wav.finalize().context("finalizing WAV")?;
        tracing::info!(path = %wav_path.display(), "audio written");
    }
    if let Some(graph) = audio_graph.take() {
        ctx.take_audio();
        graph.uninstall(chain.chain_mut());
    }
    chain.chain_mut().destroy(&mut ctx);
    drop(chain);

    Ok(EXIT_OK)
}
