mod cli;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use image::DynamicImage;
use serde_json::Value;
use tracing::{debug, info, warn};

use cli::{Cli, Commands};
use faucet_vision::config::Config;
use faucet_vision::detection::Detection;
use faucet_vision::error::{self, Result, VisionError};
use faucet_vision::renderer::{OverlayStyle, RasterSurface};
use faucet_vision::session::{RenderSession, RenderStatus};
use faucet_vision::visualization::VisualizationPayload;
use faucet_vision::{image_io, logging, normalizer};

fn main() {
    let exit_code = match run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            error::exit_code(&e)
        }
    };

    std::process::exit(exit_code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    cli.validate().map_err(VisionError::InvalidConfig)?;

    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    logging::init_logging(cli.verbose, cli.quiet, &config.general.log_level)?;

    info!("Faucet Vision {}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Render { image, response } => handle_render(image, response, &config),
        Commands::Inspect { response, raw } => handle_inspect(response, *raw, &config),
        Commands::Visualization { response } => handle_visualization(response, &config),
    }
}

fn handle_render(image_path: &Path, response_path: &Path, config: &Config) -> Result<()> {
    let tree = read_response(response_path)?;
    if let Some(err) = normalizer::backend_error(&tree) {
        warn!("Backend reported an error: {}", err);
    }

    let records = normalizer::detections_or_empty(&tree);
    let detections = Detection::from_records(records, &config.render.fallback_label);
    info!("Found {} detections", detections.len());

    if !image_path.exists() {
        return Err(VisionError::ImageIo(format!(
            "File not found: {}. Check if the path is correct.",
            image_path.display()
        )));
    }
    let bytes = fs::read(image_path)?;

    let style = OverlayStyle::from_config(&config.render)?;
    let mut session = RenderSession::new(RasterSurface::from_config(&config.render)?, style);
    let pending = session.submit(bytes);
    debug!("Decoding {} (load #{})", image_path.display(), pending.generation());

    let outcome = pending.decode();
    if !outcome.is_ok() {
        warn!("Load #{} produced no image", outcome.generation());
    }

    match session.complete(outcome, &detections) {
        RenderStatus::Rendered => {}
        RenderStatus::DecodeFailed | RenderStatus::Stale => {
            return Err(VisionError::ImageIo(format!(
                "Could not decode image '{}'",
                image_path.display()
            )));
        }
    }

    config.ensure_paths()?;
    let format = image_io::format_from_name(&config.output.format)?;
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    let output = output_path(config, &format!("{}_detections", stem), format);

    let rendered = DynamicImage::ImageRgba8(session.into_surface().into_image());
    image_io::save_image(&rendered, &output, format, config.output.quality)?;

    println!("Detections: {}", detections.len());
    println!("Saved: {}", output.display());
    Ok(())
}

fn handle_inspect(response_path: &Path, raw: bool, config: &Config) -> Result<()> {
    let tree = read_response(response_path)?;

    if let Some(err) = normalizer::backend_error(&tree) {
        println!("Backend error: {}", err);
    }

    let records = normalizer::detections_or_empty(&tree);
    println!("Detections: {}", records.len());
    for (index, record) in records.iter().enumerate() {
        let detection = Detection::from_value_with_fallback(record, &config.render.fallback_label);
        let confidence = detection
            .confidence
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        match detection.corner_rect() {
            Some(rect) => println!(
                "  #{:<3} {:<16} conf {:>5}  at ({:.1}, {:.1}) size {:.1}x{:.1}",
                index + 1,
                detection.label,
                confidence,
                rect.left,
                rect.top,
                rect.width,
                rect.height
            ),
            None => println!(
                "  #{:<3} {:<16} conf {:>5}  (no center-form geometry)",
                index + 1,
                detection.label,
                confidence
            ),
        }
    }

    match normalizer::extract_visualization_with(&tree, config.normalizer.min_inline_image_len) {
        Some(payload) => {
            let payload = VisualizationPayload::new(payload);
            println!(
                "Visualization: {} ({} chars)",
                payload.media_type().unwrap_or("image/jpeg"),
                payload.as_str().len()
            );
        }
        None => println!("Visualization: not available"),
    }

    if raw {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    }

    Ok(())
}

fn handle_visualization(response_path: &Path, config: &Config) -> Result<()> {
    let tree = read_response(response_path)?;

    let payload =
        normalizer::extract_visualization_with(&tree, config.normalizer.min_inline_image_len)
            .map(VisualizationPayload::new)
            .ok_or_else(|| {
                VisionError::Visualization(format!(
                    "No visualization found in '{}'",
                    response_path.display()
                ))
            })?;

    let image = payload.decode()?;

    config.ensure_paths()?;
    let format = image_io::format_from_name(&config.output.format)?;
    let output = output_path(config, "visualization", format);
    image_io::save_image(&image, &output, format, config.output.quality)?;

    println!("Saved: {}", output.display());
    Ok(())
}

fn read_response(path: &Path) -> Result<Value> {
    let body = fs::read_to_string(path).map_err(|e| {
        VisionError::Response(format!(
            "Failed to read response '{}': {}",
            path.display(),
            e
        ))
    })?;

    normalizer::parse_response(&body)
}

fn output_path(config: &Config, name: &str, format: image::ImageFormat) -> PathBuf {
    Path::new(&config.general.output_dir).join(format!(
        "{}.{}",
        name,
        image_io::extension_for(format)
    ))
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(output) = &cli.output {
        config.general.output_dir = output.to_string_lossy().to_string();
    }

    if let Some(format) = cli.format {
        config.output.format = format.as_str().to_string();
    }

    if let Some(quality) = cli.quality {
        config.output.quality = quality;
    }
}
