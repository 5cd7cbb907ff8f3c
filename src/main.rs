//! Command-line renderer: turns a JSON peak file into tiled waveform images.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use peakwave::config::{self, RenderSettings};
use peakwave::renderer::Geometry;
use peakwave::restrict::{RestrictMode, RestrictOutcome};
use peakwave::waveform::{ExportFormat, ExportKind, PeakBuffer, write_image};
use peakwave::{app_dirs, logging};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

/// Peak file layout: interleaved `(max, min)` pairs plus the file duration.
#[derive(Deserialize)]
struct PeakFile {
    peaks: Vec<f64>,
    #[serde(default)]
    abs_max: Option<f64>,
    #[serde(alias = "duration")]
    duration_seconds: f64,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init(logging::Verbosity::from_flag(options.verbose)) {
        eprintln!("Logging disabled: {err}");
    }

    let mut settings = match &options.config_path {
        Some(path) => config::load_settings_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    apply_overrides(&mut settings, &options);

    let peaks = read_peaks(&options.peaks_path)?;
    let mut renderer = settings.renderer().map_err(|err| err.to_string())?;
    let geometry = match options.width_px {
        Some(width) => Geometry {
            total_width_px: width.max(1),
            ..settings.geometry_for(peaks.duration_seconds())
        },
        None => settings.geometry_for(peaks.duration_seconds()),
    };
    note_adjustment("peak file", renderer.set_peaks(peaks));
    renderer
        .set_geometry(geometry)
        .map_err(|err| format!("Failed to prepare tiles: {err}"))?;

    if let Some(record) = settings.restrict.filter(|_| options.restrict.is_none()) {
        note_adjustment("saved region", renderer.apply_restrict_record(&record));
    }
    if let Some((start, end)) = options.restrict {
        note_adjustment("--restrict", renderer.set_restrict_range(start, end));
        note_adjustment("--restrict", renderer.enable_restrict(options.mode.unwrap_or_default()));
    } else if let Some(mode) = options.mode {
        note_adjustment("--mode", renderer.set_restrict_mode(mode));
    }
    if options.relative_time {
        note_adjustment("--relative-time", renderer.set_relative_time(true));
    }
    renderer.set_progress_seconds(options.progress_seconds);

    let report = renderer
        .render()
        .map_err(|err| format!("Render failed: {err}"))?;
    tracing::info!(
        "Rendered {} tile(s) across {}px ({} empty)",
        report.tiles_drawn,
        geometry.total_width_px,
        report.tiles_empty
    );

    let out_dir = match &options.out_dir {
        Some(dir) => dir.clone(),
        None => app_dirs::exports_dir().map_err(|err| err.to_string())?,
    };
    std::fs::create_dir_all(&out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;
    let stem = options
        .peaks_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "waveform".to_string());
    let format = settings.export.format;
    let quality = settings.export.quality;

    let exports = renderer
        .export_images(format, quality, ExportKind::Async)
        .map_err(|err| err.to_string())?;
    for (index, exported) in exports.into_iter().enumerate() {
        let path = out_dir.join(format!("{stem}_tile{index:02}.{}", format.extension()));
        let bytes = exported.into_bytes().map_err(|err| err.to_string())?;
        std::fs::write(&path, bytes)
            .map_err(|err| format!("Failed to write {}: {err}", path.display()))?;
        println!("{}", path.display());
    }
    let composite_path = out_dir.join(format!("{stem}.{}", format.extension()));
    write_image(&renderer.composite_image(), &composite_path, format, quality)
        .map_err(|err| err.to_string())?;
    println!("{}", composite_path.display());

    if options.ticks {
        for tick in renderer.tick_marks(options.tick_spacing_px) {
            let marker = if tick.primary { "*" } else { " " };
            println!("{marker} {:>6}px {}", tick.x_px, tick.label);
        }
    }

    if options.save_config {
        settings.restrict = Some(renderer.restrict().to_record());
        config::save(&settings).map_err(|err| err.to_string())?;
    }

    if !report.is_clean() {
        return Err(format!(
            "{} tile(s) failed to draw; see the log for details",
            report.failures.len()
        ));
    }
    Ok(())
}

/// Tell the user when a region edit had to be repaired.
fn note_adjustment(source: &str, outcome: RestrictOutcome) {
    if let Some(diagnostic) = outcome.diagnostic {
        eprintln!("Adjusted {source}: {diagnostic}");
    }
}

fn read_peaks(path: &Path) -> Result<PeakBuffer, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    let file: PeakFile = serde_json::from_str(&text)
        .map_err(|err| format!("Invalid peak file {}: {err}", path.display()))?;
    Ok(match file.abs_max {
        Some(abs_max) => PeakBuffer::new(file.peaks, abs_max, file.duration_seconds),
        None => PeakBuffer::from_peaks(file.peaks, file.duration_seconds),
    })
}

fn apply_overrides(settings: &mut RenderSettings, options: &Options) {
    if let Some(height) = options.height_px {
        settings.height_px = height;
    }
    if let Some(max_width) = options.max_tile_width_px {
        settings.max_tile_width_px = max_width;
    }
    if let Some(pps) = options.pixels_per_second {
        settings.pixels_per_second = pps;
    }
    if let Some(format) = options.format {
        settings.export.format = format;
    }
    if let Some(quality) = options.quality {
        settings.export.quality = quality;
    }
    *settings = std::mem::take(settings).normalized();
}

struct Options {
    peaks_path: PathBuf,
    out_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    width_px: Option<u32>,
    max_tile_width_px: Option<u32>,
    height_px: Option<u32>,
    pixels_per_second: Option<f64>,
    restrict: Option<(f64, f64)>,
    mode: Option<RestrictMode>,
    relative_time: bool,
    progress_seconds: Option<f64>,
    format: Option<ExportFormat>,
    quality: Option<f32>,
    ticks: bool,
    tick_spacing_px: u32,
    save_config: bool,
    verbose: bool,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut peaks_path = None;
    let mut options = Options {
        peaks_path: PathBuf::new(),
        out_dir: None,
        config_path: None,
        width_px: None,
        max_tile_width_px: None,
        height_px: None,
        pixels_per_second: None,
        restrict: None,
        mode: None,
        relative_time: false,
        progress_seconds: None,
        format: None,
        quality: None,
        ticks: false,
        tick_spacing_px: 80,
        save_config: false,
        verbose: false,
    };
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        let mut value = || {
            idx += 1;
            args.get(idx)
                .map(String::as_str)
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match flag {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--peaks" => peaks_path = Some(PathBuf::from(value()?)),
            "--out" => options.out_dir = Some(PathBuf::from(value()?)),
            "--config" => options.config_path = Some(PathBuf::from(value()?)),
            "--width" => options.width_px = Some(parse_number(flag, value()?)?),
            "--max-tile-width" => options.max_tile_width_px = Some(parse_number(flag, value()?)?),
            "--height" => options.height_px = Some(parse_number(flag, value()?)?),
            "--pixels-per-second" => options.pixels_per_second = Some(parse_number(flag, value()?)?),
            "--restrict" => options.restrict = Some(parse_range(value()?)?),
            "--mode" => options.mode = Some(parse_mode(value()?)?),
            "--relative-time" => options.relative_time = true,
            "--progress" => options.progress_seconds = Some(parse_number(flag, value()?)?),
            "--format" => {
                options.format = Some(ExportFormat::parse(value()?).map_err(|err| err.to_string())?)
            }
            "--quality" => options.quality = Some(parse_number(flag, value()?)?),
            "--ticks" => options.ticks = true,
            "--tick-spacing" => options.tick_spacing_px = parse_number(flag, value()?)?,
            "--save-config" => options.save_config = true,
            "-v" | "--verbose" => options.verbose = true,
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }
    options.peaks_path = peaks_path.ok_or_else(|| "--peaks is required".to_string())?;
    Ok(Some(options))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{flag} expects a number, got `{value}`"))
}

fn parse_range(value: &str) -> Result<(f64, f64), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("--restrict expects <start>:<end> in seconds, got `{value}`"))?;
    Ok((
        parse_number("--restrict", start)?,
        parse_number("--restrict", end)?,
    ))
}

fn parse_mode(value: &str) -> Result<RestrictMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trim" => Ok(RestrictMode::Trim),
        "trimmed" => Ok(RestrictMode::Trimmed),
        _ => Err(format!("--mode expects `trim` or `trimmed`, got `{value}`")),
    }
}

fn help_text() -> String {
    [
        "peakwave",
        "",
        "Renders precomputed waveform peaks into tiled images.",
        "",
        "Usage:",
        "  peakwave --peaks <file.json> [options]",
        "",
        "The peak file holds {\"peaks\": [max0, min0, max1, min1, ...], \"duration_seconds\": <s>}",
        "and an optional \"abs_max\".",
        "",
        "Options:",
        "  --out <dir>                 Output directory (defaults to the app exports folder).",
        "  --config <path>             Settings file (defaults to the app config).",
        "  --width <px>                Total rendered width (defaults to duration x pixels per second).",
        "  --max-tile-width <px>       Widest single tile.",
        "  --height <px>               Image height.",
        "  --pixels-per-second <n>     Horizontal resolution when --width is not given.",
        "  --restrict <start>:<end>    Restricted region in seconds.",
        "  --mode <trim|trimmed>       Mask outside the region, or show only the region.",
        "  --relative-time             Report times from the region start.",
        "  --progress <seconds>        Draw the progress overlay up to this time.",
        "  --format <png|jpeg>         Output image format.",
        "  --quality <0-1>             JPEG quality.",
        "  --ticks                     Print timeline tick marks.",
        "  --tick-spacing <px>         Minimum spacing between tick marks.",
        "  --save-config               Store the effective settings and region.",
        "  -v, --verbose               Debug logging.",
    ]
    .join("\n")
}
