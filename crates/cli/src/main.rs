use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::Parser;

use backdrop_blur_core::blurring::domain::blur_options::{option_key, BlurConfig};
use backdrop_blur_core::io::image_io_error::is_image;
use backdrop_blur_core::pipeline::composite_image_use_case::{CompositeImageUseCase, Placement};
use backdrop_blur_core::rendering::domain::output_transform::OutputTransform;
use backdrop_blur_core::rendering::infrastructure::backend_factory::{
    create_backend, BackendPreference,
};
use backdrop_blur_core::shared::constants::{DEGRADE_SUFFIX, ITERATIONS_SUFFIX, OFFSET_SUFFIX};

/// Composite a window image over a blurred copy of a backdrop image.
#[derive(Parser)]
#[command(name = "backdrop-blur")]
struct Cli {
    /// Backdrop image; acts as the output's framebuffer.
    backdrop: PathBuf,

    /// Window image, composited over the blurred backdrop.
    window: PathBuf,

    /// Output image file.
    output: PathBuf,

    /// Window x position in logical output coordinates.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    x: i32,

    /// Window y position in logical output coordinates.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    y: i32,

    /// Blur algorithm: box, gaussian, kawase or bokeh.
    #[arg(long, default_value = "kawase")]
    algorithm: String,

    /// Sample spacing of the selected algorithm.
    #[arg(long)]
    offset: Option<f64>,

    /// Downsample factor of the selected algorithm (>= 1).
    #[arg(long)]
    degrade: Option<i64>,

    /// Iteration count of the selected algorithm (>= 0).
    #[arg(long)]
    iterations: Option<i64>,

    /// Raw option assignment, e.g. `kawase_offset=3.5`. Repeatable.
    #[arg(long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Output scale (pixels per logical unit).
    #[arg(long, default_value = "1.0")]
    scale: f64,

    /// Backdrop transform: normal, 90, 180, 270, flipped, flipped-90,
    /// flipped-180 or flipped-270.
    #[arg(long, default_value = "normal")]
    transform: OutputTransform,

    /// Render on the CPU even when a GPU is available.
    #[arg(long)]
    cpu: bool,

    /// Print a JSON summary of the run to stdout.
    #[arg(long)]
    report: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let preference = if cli.cpu {
        BackendPreference::Cpu
    } else {
        BackendPreference::Auto
    };
    let backend = create_backend(preference)?;

    let config = Rc::new(BlurConfig::new());
    let mut use_case = CompositeImageUseCase::new(backend, Rc::clone(&config), &cli.algorithm);
    apply_options(&cli, &config, use_case.algorithm().name())?;
    log::debug!("Blur options: {config:?}");

    let placement = Placement {
        x: cli.x,
        y: cli.y,
        scale: cli.scale,
        transform: cli.transform,
    };
    let report = use_case.execute(&cli.backdrop, &cli.window, &cli.output, placement)?;
    log::info!("Output written to {}", cli.output.display());

    if cli.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

/// Applies the shorthand flags to the resolved algorithm's keys, then the
/// raw `--option` assignments in order.
fn apply_options(
    cli: &Cli,
    config: &BlurConfig,
    algorithm: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(offset) = cli.offset {
        config.set_float(&option_key(algorithm, OFFSET_SUFFIX), offset)?;
    }
    if let Some(degrade) = cli.degrade {
        config.set_int(&option_key(algorithm, DEGRADE_SUFFIX), degrade)?;
    }
    if let Some(iterations) = cli.iterations {
        config.set_int(&option_key(algorithm, ITERATIONS_SUFFIX), iterations)?;
    }
    for assignment in &cli.options {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("Expected KEY=VALUE, got '{assignment}'"))?;
        config.apply_str(key.trim(), value)?;
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in [&cli.backdrop, &cli.window] {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    for path in [&cli.backdrop, &cli.window, &cli.output] {
        if !is_image(path) {
            return Err(format!("Not a supported image file: {}", path.display()).into());
        }
    }
    if !(cli.scale.is_finite() && cli.scale > 0.0) {
        return Err(format!("Scale must be a positive number, got {}", cli.scale).into());
    }
    if let Some(degrade) = cli.degrade {
        if degrade < 1 {
            return Err(format!("Degrade must be at least 1, got {degrade}").into());
        }
    }
    if let Some(iterations) = cli.iterations {
        if iterations < 0 {
            return Err(format!("Iterations must not be negative, got {iterations}").into());
        }
    }
    if let Some(offset) = cli.offset {
        if !(offset.is_finite() && offset >= 0.0) {
            return Err(format!("Offset must not be negative, got {offset}").into());
        }
    }
    Ok(())
}
