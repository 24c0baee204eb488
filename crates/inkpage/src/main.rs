//! inkpage: turn a photograph into a printable coloring page.
//!
//! Decodes an image file, runs the line-art pipeline with the given
//! settings and writes the result as PNG. Optionally renders every
//! detector/style combination for comparison, or prints per-stage
//! diagnostics.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin inkpage -- [OPTIONS] <INPUT>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use inkpage_pipeline::diagnostics::{Clock, RenderDiagnostics};
use inkpage_pipeline::{Complexity, EdgeDetectorKind, RgbaImage, Settings, Style};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Convert a photograph into coloring-page line art.
#[derive(Parser)]
#[command(name = "inkpage", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Where to write the coloring page. Defaults to
    /// `<input-stem>-coloring.png` next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Gradient magnitude above which a pixel becomes a line.
    #[arg(long, default_value_t = Settings::DEFAULT_EDGE_THRESHOLD)]
    edge_threshold: f32,

    /// Gaussian blur sigma (0 disables blurring).
    #[arg(long, default_value_t = Settings::DEFAULT_BLUR_STRENGTH)]
    blur_strength: f32,

    /// Detail level.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_DETAIL)]
    complexity: Detail,

    /// Line thickness in pixels (radius of the dilation disc).
    #[arg(long, default_value_t = Settings::DEFAULT_LINE_THICKNESS)]
    line_thickness: u32,

    /// Rendering style.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_LOOK)]
    style: Look,

    /// Edge extraction strategy.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_DETECTOR)]
    detector: Detector,

    /// White out the dominant background colour after edge extraction.
    #[arg(long)]
    remove_background: bool,

    /// Seed for the randomized stages, for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Full settings as a JSON string.
    ///
    /// When provided, all other settings flags are ignored. Missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Render every detector/style combination into this directory
    /// instead of writing a single page.
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Print a per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Number of timed runs (implies diagnostics when greater than 1).
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,
}

/// Detail level selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Detail {
    /// Fewer, bolder lines with speckle removal.
    Kids,
    /// Balanced detail.
    Normal,
    /// Every detected line, no pruning.
    Expert,
}

/// Rendering style selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Look {
    /// Crisp pure black/white lines.
    Anime,
    /// Banded line weight.
    Manga,
    /// Random gray line tones.
    Watercolor,
    /// Lines as extracted.
    None,
}

/// Edge extraction strategy selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Detector {
    /// Single-scale Sobel gradient.
    Sobel,
    /// Multi-scale gradients with line continuation.
    MultiScale,
}

/// Maps a pipeline [`Complexity`] to the local CLI [`Detail`] enum.
const fn detail_from_pipeline(c: Complexity) -> Detail {
    match c {
        Complexity::Kids => Detail::Kids,
        Complexity::Normal => Detail::Normal,
        Complexity::Expert => Detail::Expert,
    }
}

/// Maps a pipeline [`Style`] to the local CLI [`Look`] enum.
const fn look_from_pipeline(s: Style) -> Look {
    match s {
        Style::Anime => Look::Anime,
        Style::Manga => Look::Manga,
        Style::Watercolor => Look::Watercolor,
        Style::None => Look::None,
    }
}

/// Maps a pipeline [`EdgeDetectorKind`] to the local CLI [`Detector`] enum.
const fn detector_from_pipeline(k: EdgeDetectorKind) -> Detector {
    match k {
        EdgeDetectorKind::Sobel => Detector::Sobel,
        EdgeDetectorKind::MultiScale => Detector::MultiScale,
    }
}

/// CLI defaults, derived from the `Settings::DEFAULT_*` constants so the
/// two cannot silently diverge.
const CLI_DEFAULT_DETAIL: Detail = detail_from_pipeline(Settings::DEFAULT_COMPLEXITY);
const CLI_DEFAULT_LOOK: Look = look_from_pipeline(Settings::DEFAULT_STYLE);
const CLI_DEFAULT_DETECTOR: Detector = detector_from_pipeline(Settings::DEFAULT_EDGE_DETECTOR);

/// Build [`Settings`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual settings flags are ignored.
fn settings_from_cli(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).context("parsing --config-json")?
    } else {
        Settings {
            edge_threshold: cli.edge_threshold,
            blur_strength: cli.blur_strength,
            complexity: match cli.complexity {
                Detail::Kids => Complexity::Kids,
                Detail::Normal => Complexity::Normal,
                Detail::Expert => Complexity::Expert,
            },
            line_thickness: cli.line_thickness,
            style: match cli.style {
                Look::Anime => Style::Anime,
                Look::Manga => Style::Manga,
                Look::Watercolor => Style::Watercolor,
                Look::None => Style::None,
            },
            edge_detector: match cli.detector {
                Detector::Sobel => EdgeDetectorKind::Sobel,
                Detector::MultiScale => EdgeDetectorKind::MultiScale,
            },
            remove_background: cli.remove_background,
            seed: cli.seed,
        }
    };
    settings.validate()?;
    Ok(settings)
}

/// `<stem>-coloring.png` beside `input`.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}-coloring.png"))
}

fn load_image(path: &Path) -> anyhow::Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgba8();
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "image loaded"
    );
    Ok(image)
}

fn save_png(image: &RgbaImage, path: &Path) -> anyhow::Result<()> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "coloring page written");
    Ok(())
}

/// Render every combination and write the successful ones as PNGs.
///
/// Individual failures are logged and skipped; the command only fails
/// if nothing could be written.
fn write_previews(source: &RgbaImage, settings: &Settings, dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = 0_usize;
    for entry in inkpage_pipeline::preview_all(source, settings) {
        match entry.result {
            Ok(ref page) => {
                let path = dir.join(format!("{}.png", entry.file_stem()));
                match save_png(page, &path) {
                    Ok(()) => written += 1,
                    Err(e) => tracing::error!(method = %entry.method, "{e:#}"),
                }
            }
            Err(ref e) => tracing::error!(method = %entry.method, error = %e, "preview failed"),
        }
    }
    anyhow::ensure!(written > 0, "no preview could be rendered");
    println!("{written} previews written to {}", dir.display());
    Ok(())
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = settings_from_cli(cli)?;
    tracing::debug!(?settings, "settings");
    let source = load_image(&cli.input)?;

    if let Some(ref dir) = cli.preview_dir {
        return write_previews(&source, &settings, dir);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    if !(cli.diagnostics || cli.json || cli.runs > 1) {
        let page = inkpage_pipeline::render(&source, &settings)?;
        return save_png(&page, &output);
    }

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }
        let (page, diagnostics) =
            inkpage_pipeline::render_with_diagnostics(&source, &settings, &StdClock)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }
        // Write the page from the first run only.
        if run == 0 {
            save_png(&page, &output)?;
        }
        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpage=info,inkpage_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated timings across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[RenderDiagnostics]) {
    if all_diagnostics.is_empty() {
        return;
    }

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();
    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    // Stage names in execution order, taken from the first run.
    let names: Vec<&str> = all_diagnostics[0]
        .stages()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    for name in names {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| {
                d.stages()
                    .into_iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, s)| s.duration.as_secs_f64() * 1000.0)
            })
            .collect();
        if stage_durations.is_empty() {
            continue;
        }
        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("inkpage").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flag_defaults_match_settings_defaults() {
        let settings = settings_from_cli(&parse(&["photo.jpg"])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn enum_defaults_follow_pipeline_constants() {
        let cli = parse(&["photo.jpg"]);
        assert_eq!(cli.complexity, CLI_DEFAULT_DETAIL);
        assert_eq!(cli.style, CLI_DEFAULT_LOOK);
        assert_eq!(cli.detector, CLI_DEFAULT_DETECTOR);
        assert_eq!(detail_from_pipeline(Complexity::Expert), Detail::Expert);
        assert_eq!(look_from_pipeline(Style::Manga), Look::Manga);
        assert_eq!(detector_from_pipeline(EdgeDetectorKind::Sobel), Detector::Sobel);
    }

    #[test]
    fn flags_map_onto_settings() {
        let cli = parse(&[
            "photo.jpg",
            "--complexity",
            "kids",
            "--style",
            "watercolor",
            "--detector",
            "sobel",
            "--line-thickness",
            "3",
            "--remove-background",
            "--seed",
            "12",
        ]);
        let settings = settings_from_cli(&cli).unwrap();
        assert_eq!(settings.complexity, Complexity::Kids);
        assert_eq!(settings.style, Style::Watercolor);
        assert_eq!(settings.edge_detector, EdgeDetectorKind::Sobel);
        assert_eq!(settings.line_thickness, 3);
        assert!(settings.remove_background);
        assert_eq!(settings.seed, Some(12));
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "photo.jpg",
            "--style",
            "manga",
            "--config-json",
            r#"{"style": "anime", "edge_detector": "sobel"}"#,
        ]);
        let settings = settings_from_cli(&cli).unwrap();
        assert_eq!(settings.style, Style::Anime);
        assert_eq!(settings.edge_detector, EdgeDetectorKind::Sobel);
        assert_eq!(settings.line_thickness, Settings::DEFAULT_LINE_THICKNESS);
    }

    #[test]
    fn invalid_settings_are_rejected_before_decoding() {
        let cli = parse(&["photo.jpg", "--line-thickness", "0"]);
        assert!(settings_from_cli(&cli).is_err());
    }

    #[test]
    fn unknown_style_is_a_usage_error() {
        let result = Cli::try_parse_from(["inkpage", "photo.jpg", "--style", "cubist"]);
        assert!(result.is_err());
    }

    #[test]
    fn default_output_sits_beside_input() {
        assert_eq!(
            default_output_path(Path::new("/tmp/shots/cat.jpeg")),
            PathBuf::from("/tmp/shots/cat-coloring.png")
        );
    }

    #[test]
    fn zero_runs_is_rejected() {
        assert!(Cli::try_parse_from(["inkpage", "photo.jpg", "--runs", "0"]).is_err());
        assert_eq!(parse(&["photo.jpg"]).runs, 1);
        assert_eq!(parse(&["photo.jpg", "--runs", "5"]).runs, 5);
    }
}
