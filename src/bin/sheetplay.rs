use std::{
    ops::ControlFlow,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sheetplay::{
    AnalysisConfig, EngineConfig, GridLayout, LoopExportOpts, SourceRef, SpritePlayer,
    TickDriver, TickOutcome, build_registry, read_sprite_sheet, render_loop, write_png,
};

#[derive(Parser, Debug)]
#[command(name = "sheetplay", version)]
struct Cli {
    /// Engine configuration JSON (every field optional).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse a sheet and print its frame registry as JSON.
    Analyze(AnalyzeArgs),
    /// Render a single stabilized frame as a PNG.
    Frame(FrameArgs),
    /// Export one full ping-pong loop (MP4 requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Drive the player in real time and log diagnostics.
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// Input sprite sheet image.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Grid layout: `grid-4x4` or `grid-5x5`.
    #[arg(long, default_value = "grid-4x4")]
    layout: GridLayout,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    sheet: SheetArgs,

    /// Analyse frames on the rayon thread pool.
    #[arg(long)]
    parallel: bool,

    /// Print only the stability score.
    #[arg(long)]
    score_only: bool,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    sheet: SheetArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Loop position in [0, 1] on the forward sweep.
    #[arg(long, conflicts_with = "time_ms")]
    progress: Option<f64>,

    /// Playback time in milliseconds since the loop started.
    #[arg(long)]
    time_ms: Option<u64>,

    #[command(flatten)]
    playback: PlaybackArgs,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    sheet: SheetArgs,

    /// Output MP4 file, or directory for the PNG sequence.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = ExportFormat::Mp4)]
    format: ExportFormat,

    #[arg(long, default_value_t = 30)]
    fps: u32,

    #[command(flatten)]
    playback: PlaybackArgs,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[command(flatten)]
    sheet: SheetArgs,

    /// Tick rate of the driver.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Number of full ping-pong cycles to play before exiting.
    #[arg(long, default_value_t = 1)]
    cycles: u32,

    #[command(flatten)]
    playback: PlaybackArgs,
}

#[derive(Args, Debug)]
struct PlaybackArgs {
    /// Playback speed multiplier (overrides the config file).
    #[arg(long)]
    speed: Option<f64>,

    /// Disable frame cross-dissolve.
    #[arg(long)]
    no_smoothing: bool,
}

impl PlaybackArgs {
    fn apply(&self, cfg: &mut EngineConfig) {
        if let Some(speed) = self.speed {
            cfg.playback.speed = speed;
        }
        if self.no_smoothing {
            cfg.playback.smoothing = false;
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Mp4,
    Png,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Analyze(args) => cmd_analyze(cfg, args),
        Command::Frame(args) => cmd_frame(cfg, args),
        Command::Export(args) => cmd_export(cfg, args),
        Command::Play(args) => cmd_play(cfg, args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut cfg = match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    cfg.analysis = cfg.analysis.with_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_analyze(cfg: EngineConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    let sheet = read_sprite_sheet(&args.sheet.in_path, args.sheet.layout)?;
    let analysis = AnalysisConfig {
        parallel: args.parallel || cfg.analysis.parallel,
        ..cfg.analysis
    };
    let registry = build_registry(&sheet, &analysis)?;

    if args.score_only {
        println!("{:.1}", registry.stability_score());
        return Ok(());
    }

    let report = serde_json::json!({
        "source": args.sheet.in_path.display().to_string(),
        "sheet": { "width": sheet.width, "height": sheet.height },
        "stability": registry.stability_score(),
        "registry": registry,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize registry")?
    );
    Ok(())
}

/// Run a player through load and analysis at `now`, failing if it does not become ready.
fn ready_player(mut cfg: EngineConfig, sheet: &SheetArgs) -> anyhow::Result<SpritePlayer> {
    cfg.analysis.frames_per_tick = 0;
    let mut player = SpritePlayer::new(cfg)?;
    player.set_source(SourceRef::Path(sheet.in_path.clone()), sheet.layout);
    match player.tick(Duration::ZERO) {
        TickOutcome::Drawn(_) => Ok(player),
        _ => anyhow::bail!(
            "failed to prepare '{}': {}",
            sheet.in_path.display(),
            player.state()
        ),
    }
}

fn cmd_frame(mut cfg: EngineConfig, args: FrameArgs) -> anyhow::Result<()> {
    args.playback.apply(&mut cfg);
    let mut player = ready_player(cfg, &args.sheet)?;

    let now = match (args.progress, args.time_ms) {
        (Some(p), _) => {
            player.seek_progress(p, Duration::ZERO);
            Duration::ZERO
        }
        (None, Some(ms)) => Duration::from_millis(ms),
        (None, None) => Duration::ZERO,
    };
    let TickOutcome::Drawn(pair) = player.tick(now) else {
        anyhow::bail!("player did not draw: {}", player.state());
    };

    let frame = player.frame().context("player has no output surface")?;
    write_png(&frame, &args.out)?;
    tracing::info!(current = pair.current, next = pair.next, blend = pair.blend, "frame drawn");
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(mut cfg: EngineConfig, args: ExportArgs) -> anyhow::Result<()> {
    args.playback.apply(&mut cfg);
    let sheet = read_sprite_sheet(&args.sheet.in_path, args.sheet.layout)?;
    let registry = build_registry(&sheet, &cfg.analysis)?;

    let opts = LoopExportOpts {
        fps: args.fps,
        speed: cfg.playback.speed,
        smoothing: cfg.playback.smoothing,
        overwrite: true,
    };
    let frames = render_loop(&sheet, &registry, &cfg, &opts)?;
    let n = match args.format {
        ExportFormat::Mp4 => frames.write_mp4(&args.out, opts.overwrite, cfg.background_rgba)?,
        ExportFormat::Png => frames.write_png_sequence(&args.out)?.len() as u64,
    };

    eprintln!("wrote {} ({n} frames)", args.out.display());
    Ok(())
}

fn cmd_play(mut cfg: EngineConfig, args: PlayArgs) -> anyhow::Result<()> {
    args.playback.apply(&mut cfg);
    let cycles = args.cycles.max(1);
    let driver = TickDriver::new(args.fps)?;
    let mut player = SpritePlayer::new(cfg)?;
    player.set_source(
        SourceRef::Path(args.sheet.in_path.clone()),
        args.sheet.layout,
    );
    let token = player.schedule();

    let mut ready_at: Option<Duration> = None;
    let mut last_log = Duration::ZERO;
    let stats = driver.run(&token, |now| {
        let outcome = player.tick(now);
        if now.saturating_sub(last_log) >= Duration::from_secs(1) {
            last_log = now;
            tracing::info!("{}", player.diagnostics());
        }
        match outcome {
            TickOutcome::Failed => {
                return Err(anyhow::anyhow!("playback failed: {}", player.state()).into());
            }
            TickOutcome::Drawn(_) => {
                let start = *ready_at.get_or_insert(now);
                let cycle = player.playback_duration() * 2;
                if now.saturating_sub(start) >= cycle * cycles {
                    return Ok(ControlFlow::Break(()));
                }
            }
            TickOutcome::Idle | TickOutcome::Analyzing { .. } => {}
        }
        Ok(ControlFlow::Continue(()))
    })?;

    eprintln!("{}", player.diagnostics());
    eprintln!(
        "played {} ticks ({} late){}",
        stats.ticks,
        stats.late_ticks,
        if stats.cancelled { ", cancelled" } else { "" }
    );
    player.dispose();
    Ok(())
}
