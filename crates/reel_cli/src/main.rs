//! Reelsmith command-line front end.
//!
//! Composes captioned videos from clips and a narration track, and exposes
//! the caption tools on their own:
//!
//! ```text
//! reel compose --clip a.mp4 --clip b.mp4 --audio voice.mp3 --text-file script.txt -o out.mp4
//! reel captions --text "Hello there. Welcome back." --duration 6
//! reel realign --srt captions.srt --duration 42.5 -o retimed.srt
//! reel config show
//! reel config set captions.max_words 8
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use reel_core::captions::{build_captions, load_srt, save_srt, write_srt, CaptionTrack};
use reel_core::config::{ConfigManager, Settings};
use reel_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use reel_core::models::{CaptionSource, Clip, CompositionJob, TargetFormat};
use reel_core::orchestrator::{CompositionReport, Composer};
use reel_core::selection::select_clips;
use reel_core::tools::{probe_audio, probe_clip, FfmpegTool, MediaTool};

/// Default config path: .config/settings.toml (relative to current working directory)
fn default_config_path() -> PathBuf {
    PathBuf::from(".config").join("settings.toml")
}

#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(about = "Compose captioned videos from clips and narration", version)]
struct Cli {
    /// Config file (created with defaults if missing).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Log one level more verbosely than the config says and echo job logs.
    #[arg(short = 'v', long = "verbose", global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one video from clips, narration and optional captions.
    Compose(ComposeArgs),
    /// Chunk and time caption text, printing or saving SubRip.
    Captions(CaptionsArgs),
    /// Stretch an existing SubRip file onto a new total duration.
    Realign(RealignArgs),
    /// Manage the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// Video clip, in timeline order. Repeat for more clips.
    #[arg(long = "clip", required = true)]
    clips: Vec<PathBuf>,

    /// Narration audio file.
    #[arg(short = 'a', long = "audio")]
    audio: PathBuf,

    #[command(flatten)]
    text: TextArgs,

    /// Existing SubRip captions to burn in.
    #[arg(long = "srt", conflicts_with_all = ["text", "text_file"])]
    srt: Option<PathBuf>,

    /// Output video path.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    #[arg(long = "width")]
    width: Option<u32>,

    #[arg(long = "height")]
    height: Option<u32>,

    #[arg(long = "fps")]
    fps: Option<u32>,

    /// Probe clips and keep only those passing the selection filters.
    #[arg(long = "select", default_value_t = false)]
    select: bool,

    /// Job name used for the log file (defaults to the output file stem).
    #[arg(long = "name")]
    name: Option<String>,

    #[command(flatten)]
    finish: FinishArgs,
}

/// Overrides for the `[finish]` section.
#[derive(Args, Debug)]
struct FinishArgs {
    /// Fade in and out over this many seconds.
    #[arg(long = "fade")]
    fade: Option<f64>,

    /// Text drawn in the bottom-right corner.
    #[arg(long = "watermark")]
    watermark: Option<String>,

    /// Background music looped under the narration.
    #[arg(long = "music")]
    music: Option<PathBuf>,

    /// Music level from 0.0 (-20 dB) to 1.0 (unchanged).
    #[arg(long = "music-volume")]
    music_volume: Option<f64>,
}

impl FinishArgs {
    fn apply(&self, settings: &mut Settings) {
        let finish = &mut settings.finish;
        if let Some(fade) = self.fade {
            finish.fade_secs = fade;
        }
        if let Some(ref text) = self.watermark {
            finish.watermark_text = text.clone();
        }
        if let Some(ref music) = self.music {
            finish.music_path = music.to_string_lossy().into_owned();
        }
        if let Some(volume) = self.music_volume {
            finish.music_volume = volume;
        }
    }
}

#[derive(Args, Debug)]
struct TextArgs {
    /// Caption text given inline.
    #[arg(short = 't', long = "text", conflicts_with = "text_file")]
    text: Option<String>,

    /// File holding the caption text.
    #[arg(long = "text-file")]
    text_file: Option<PathBuf>,
}

impl TextArgs {
    fn read(&self) -> Result<Option<String>> {
        match (&self.text, &self.text_file) {
            (Some(text), _) => Ok(Some(text.clone())),
            (None, Some(path)) => fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("reading caption text from {}", path.display())),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Args, Debug)]
struct CaptionsArgs {
    #[command(flatten)]
    text: TextArgs,

    /// Narration length in seconds; estimated from the text when omitted.
    #[arg(short = 'd', long = "duration")]
    duration: Option<f64>,

    /// Write SubRip here instead of stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RealignArgs {
    /// SubRip file to re-time.
    #[arg(long = "srt")]
    srt: PathBuf,

    /// New total duration in seconds.
    #[arg(short = 'd', long = "duration")]
    duration: f64,

    /// Write SubRip here instead of stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a config file with defaults (keeps existing values).
    Init,
    /// Print the effective config file.
    Show,
    /// Set one value, e.g. `captions.max_words 8`, keeping the rest of the file.
    Set {
        /// `<section>.<key>`
        key: String,
        /// TOML value; bare words are taken as strings.
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let manager = load_config(&config_path)?;
    let level = log_level(manager.settings(), cli.verbose);

    match cli.command {
        Command::Compose(args) => {
            let logs_folder = manager.logs_folder();
            let mut settings = manager.into_settings();
            settings.logging.level = level;
            let _log_guard = init_tracing_with_file(level, &logs_folder);
            tracing::info!("Reel core version: {}", reel_core::version());
            tracing::info!("Config: {}", config_path.display());
            compose(settings, args, cli.verbose)
        }
        Command::Captions(args) => {
            init_tracing(level);
            captions(manager.settings(), args)
        }
        Command::Realign(args) => {
            init_tracing(level);
            realign(args)
        }
        Command::Config(command) => {
            init_tracing(level);
            config(manager, command)
        }
    }
}

/// Configured level, one step more verbose under `--verbose`.
fn log_level(settings: &Settings, verbose: bool) -> LogLevel {
    if verbose {
        settings.logging.level.more_verbose()
    } else {
        settings.logging.level
    }
}

fn load_config(path: &Path) -> Result<ConfigManager> {
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("loading config {}", path.display()))?;
    manager
        .ensure_dirs_exist()
        .context("creating configured directories")?;
    Ok(manager)
}

fn compose(mut settings: Settings, args: ComposeArgs, echo: bool) -> Result<()> {
    args.finish.apply(&mut settings);
    let problems = settings.validate();
    if !problems.is_empty() {
        bail!("invalid options: {}", problems.join("; "));
    }
    let tool: Arc<dyn MediaTool> = Arc::new(FfmpegTool::from_settings(&settings.tools));

    let audio = probe_audio(tool.as_ref(), &args.audio)
        .with_context(|| format!("probing narration {}", args.audio.display()))?;
    tracing::info!("Narration: {} ({:.3}s)", audio.display_name(), audio.duration);

    let clips = if args.select {
        selected_clips(tool.as_ref(), &args.clips, &settings)?
    } else {
        args.clips.clone()
    };

    let caption_source = match (args.text.read()?, &args.srt) {
        (Some(text), _) => CaptionSource::Text(text),
        (None, Some(srt)) => CaptionSource::SrtFile(srt.clone()),
        (None, None) => CaptionSource::None,
    };

    let base = settings.composition.target();
    let target = TargetFormat::new(
        args.width.unwrap_or(base.width),
        args.height.unwrap_or(base.height),
        args.fps.unwrap_or(base.frame_rate),
    );

    let name = args.name.clone().unwrap_or_else(|| {
        args.output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reel".to_string())
    });

    let job = CompositionJob::new(name, clips, audio, &args.output)
        .with_captions(caption_source)
        .with_target(target);

    let mut composer = Composer::new(settings, tool).with_progress(
        |step: &str, percent: u32, message: &str| {
            eprintln!("[{:>3}%] {}: {}", percent, step, message);
        },
    );
    if echo {
        composer = composer.with_log_echo(|job: &str, line: &str| eprintln!("{} | {}", job, line));
    }

    let report = composer.compose(job).context("composition failed")?;
    print_report(&report);
    Ok(())
}

/// Probe `paths` and apply the configured selection filters.
fn selected_clips(tool: &dyn MediaTool, paths: &[PathBuf], settings: &Settings) -> Result<Vec<PathBuf>> {
    let mut probed: Vec<Clip> = Vec::with_capacity(paths.len());
    for path in paths {
        match probe_clip(tool, path) {
            Ok(clip) => probed.push(clip),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    let selected = select_clips(probed, &settings.selection);
    if selected.is_empty() {
        bail!(
            "no clip passed selection ({} given, {:.0}-{:.0}s, at least {}x{})",
            paths.len(),
            settings.selection.min_duration_secs,
            settings.selection.max_duration_secs,
            settings.selection.min_width,
            settings.selection.min_height
        );
    }
    tracing::info!("Selected {} of {} clip(s)", selected.len(), paths.len());
    Ok(selected.into_iter().map(|clip| clip.path).collect())
}

fn print_report(report: &CompositionReport) {
    println!("Output:   {}", report.output_path.display());
    println!("Duration: {:.3}s", report.final_duration);
    println!("Clips:    {}/{}", report.clips_used, report.clips_requested);
    if let Some(plan) = &report.reconcile_plan {
        println!("Plan:     {}", plan);
    }
    println!(
        "Captions: {}{}",
        report.caption_count,
        if report.captions_burned { " (burned in)" } else { "" }
    );
    if !report.finishing.is_empty() {
        println!("Finish:   {}", report.finishing.join(", "));
    }
    for degradation in &report.degradations {
        println!("Degraded: {}", degradation);
    }
    println!("Log:      {}", report.log_path.display());
}

fn emit(track: &CaptionTrack, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            save_srt(track, path).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("Wrote {} caption(s) to {}", track.len(), path.display());
        }
        None => print!("{}", write_srt(track)),
    }
    Ok(())
}

fn captions(settings: &Settings, args: CaptionsArgs) -> Result<()> {
    let Some(text) = args.text.read()? else {
        bail!("either --text or --text-file is required");
    };

    let track = build_captions(&text, args.duration, &settings.captions)
        .context("building captions")?;
    if track.is_empty() {
        bail!("caption text is empty");
    }
    tracing::info!(
        "{} caption(s) over {:.3}s",
        track.len(),
        track.total_duration
    );
    emit(&track, args.output.as_deref())
}

fn realign(args: RealignArgs) -> Result<()> {
    let track = load_srt(&args.srt).with_context(|| format!("reading {}", args.srt.display()))?;
    let retimed = track
        .realigned(args.duration)
        .with_context(|| format!("realigning onto {}s", args.duration))?;
    emit(&retimed, args.output.as_deref())
}

fn config(mut manager: ConfigManager, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init => {
            println!("Config written to {}", manager.path().display());
        }
        ConfigCommand::Show => {
            let content = fs::read_to_string(manager.path())
                .with_context(|| format!("reading {}", manager.path().display()))?;
            print!("{}", content);
        }
        ConfigCommand::Set { key, value } => {
            let section = manager
                .set_value(&key, &value)
                .with_context(|| format!("setting {}", key))?;
            println!(
                "Updated [{}] in {}",
                section.table_name(),
                manager.path().display()
            );
        }
    }
    Ok(())
}
