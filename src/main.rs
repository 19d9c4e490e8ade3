use clap::{Parser, ValueEnum};
use pupil::{overlay, DetectorConfig, FrameReport, PupilDetector};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pupil")]
#[command(about = "Pupil-rs - PuRe pupil candidate selection on eye-camera frames", long_about = None)]
struct Cli {
    /// Input frame paths
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Working width in pixels (overrides the config file)
    #[arg(long)]
    width: Option<u32>,

    /// Working height in pixels (overrides the config file)
    #[arg(long)]
    height: Option<u32>,

    /// Detector configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write annotated PNGs of the accepted candidates here
    #[arg(long)]
    overlay_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    /// JSON output with full details, one document per run
    Json,
    /// Plain text, one line per candidate
    Text,
    /// TSV format: frame\tcx\tcy\tfirst_ax\tsecond_ax\tangle\taspect\tspread\tcontrast
    Tsv,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DetectorConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => DetectorConfig::default(),
    };
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }

    let detector = PupilDetector::new(config)?;
    if let Some(dir) = &cli.overlay_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut frames = Vec::new();
    for path in &cli.frames {
        let frame = match pupil::imread(path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let output = match detector.run(&frame) {
            Ok(output) => output,
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        info!(
            "{}: {} candidates in {:.2} ms",
            path.display(),
            output.report.candidates.len(),
            output.elapse.total * 1000.0
        );

        if let Some(dir) = &cli.overlay_dir {
            let annotated = overlay::draw_candidates(&output.gray, &output.report.candidates);
            overlay::save_png(&annotated, overlay_path(dir, path))?;
        }
        frames.push((path.clone(), output.report));
    }

    // Output results
    match cli.format {
        OutputFormat::Json => {
            let json_output: Vec<_> = frames.iter().map(|(path, report)| frame_json(path, report)).collect();
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Text => {
            for (path, report) in &frames {
                for c in &report.candidates {
                    println!(
                        "{}: center ({:.1}, {:.1}) axes ({:.1}, {:.1}) angle {:.1} aspect {:.3} spread {:.2} contrast {:.3}",
                        path.display(),
                        c.ellipse.center.x,
                        c.ellipse.center.y,
                        c.ellipse.first_ax,
                        c.ellipse.second_ax,
                        c.ellipse.angle,
                        c.aspect_ratio,
                        c.angular_spread,
                        c.outline_contrast,
                    );
                }
            }
        }
        OutputFormat::Tsv => {
            for (path, report) in &frames {
                for c in &report.candidates {
                    println!(
                        "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.4}\t{:.2}\t{:.4}",
                        path.display(),
                        c.ellipse.center.x,
                        c.ellipse.center.y,
                        c.ellipse.first_ax,
                        c.ellipse.second_ax,
                        c.ellipse.angle,
                        c.aspect_ratio,
                        c.angular_spread,
                        c.outline_contrast,
                    );
                }
            }
        }
    }

    Ok(())
}

fn frame_json(path: &Path, report: &FrameReport) -> serde_json::Value {
    serde_json::json!({
        "frame": path.display().to_string(),
        "candidates": report.candidates.iter().map(|c| serde_json::json!({
            "center": [c.ellipse.center.x, c.ellipse.center.y],
            "first_ax": c.ellipse.first_ax,
            "second_ax": c.ellipse.second_ax,
            "angle": c.ellipse.angle,
            "aspect_ratio": c.aspect_ratio,
            "angular_spread": c.angular_spread,
            "outline_contrast": c.outline_contrast,
            "points": c.segment.len(),
        })).collect::<Vec<_>>(),
        "rejections": report.rejections,
    })
}

fn overlay_path(dir: &Path, frame: &Path) -> PathBuf {
    let stem = frame.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "frame".to_string());
    dir.join(format!("{}_candidates.png", stem))
}
