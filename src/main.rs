//! pssmux - PS2 PSS Conversion Pipelines
//!
//! Command line host for the conversion pipelines: parses arguments, sets up
//! logging, submits one job and renders its progress events.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pssmux::cli::{Args, Commands};
use pssmux::config::{Config, ToolPaths};
use pssmux::error::PssError;
use pssmux::job::{ConversionJob, Direction, EncodeSettings, default_output};
use pssmux::pipeline::{Converter, JobOutcome};
use pssmux::progress::{ProgressReceiver, progress_channel};
use pssmux::tools::{ToolInvokerFactory, check_dependencies};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("pssmux.toml").exists() {
                info!("Found pssmux.toml in current directory, loading...");
                Config::from_file("pssmux.toml")?
            } else {
                Config::default()
            }
        }
    };

    let tool_paths = resolve_tools(&config, args.tool_dir.as_deref())?;

    match args.command {
        Commands::Encode { input, output, width, height, bitrate, keep } => {
            let settings = EncodeSettings {
                width: width.unwrap_or(config.encode.width),
                height: height.unwrap_or(config.encode.height),
                bitrate: bitrate.unwrap_or(config.encode.bitrate),
            };
            let output = output
                .unwrap_or_else(|| default_output(&input, &Direction::EncodeToContainer(settings)));
            let job = ConversionJob::encode(
                input,
                output,
                settings,
                keep || config.encode.keep_intermediates,
            )?;

            info!(
                "Encoding {} at {}x{}, {} kbps",
                job.input().display(),
                settings.width,
                settings.height,
                settings.bitrate
            );
            convert(job, tool_paths, args.json).await?;
        }
        Commands::Decode { input, output, keep } => {
            let output =
                output.unwrap_or_else(|| default_output(&input, &Direction::DecodeFromContainer));
            let job = ConversionJob::decode(input, output, keep || config.decode.keep_intermediates)?;

            info!("Decoding {}", job.input().display());
            convert(job, tool_paths, args.json).await?;
        }
        Commands::Check => {
            let report = check_dependencies(&tool_paths);

            if args.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!("\nRequired tools:");
                println!("{:<12} {:<10} {}", "Tool", "Status", "Path");
                println!("{}", "-".repeat(70));
                let paths = [
                    ("ffmpeg", &tool_paths.ffmpeg),
                    ("ps2str", &tool_paths.ps2str),
                    ("vgmstream", &tool_paths.vgmstream),
                ];
                for (name, path) in paths {
                    let status = if report[name] { "Found" } else { "Missing" };
                    println!("{:<12} {:<10} {}", name, status, path.display());
                }
            }

            if report.values().any(|present| !present) {
                return Err(PssError::Config("Some required tools are missing".to_string()).into());
            }
        }
        Commands::InitConfig { path } => {
            config.save_to_file(&path)?;
            println!("Wrote configuration to {}", path.display());
        }
    }

    Ok(())
}

/// Resolve tool locations: `--tool-dir`, then the config, then the executable's directory.
fn resolve_tools(config: &Config, tool_dir: Option<&Path>) -> Result<ToolPaths> {
    let mut tools = config.tools.clone();
    if let Some(dir) = tool_dir {
        tools.tool_dir = Some(dir.to_path_buf());
    }

    let exe_dir = std::env::current_exe()?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let paths = tools.resolve(&exe_dir);
    info!(
        "Using tools: ffmpeg={}, ps2str={}, vgmstream={}",
        paths.ffmpeg.display(),
        paths.ps2str.display(),
        paths.vgmstream.display()
    );
    Ok(paths)
}

/// Submit one job and render its events until it finishes.
async fn convert(job: ConversionJob, tools: ToolPaths, json: bool) -> Result<()> {
    let converter = Converter::new(tools, ToolInvokerFactory::create_default());
    let steps = job.step_count();
    let (tx, rx) = progress_channel();

    let handle = converter.submit(job, tx);
    if json {
        print_events(rx).await?;
    } else {
        render_progress(rx, steps).await?;
    }

    match handle.await? {
        JobOutcome::Completed => Ok(()),
        JobOutcome::Failed { step, error } => {
            Err(anyhow::anyhow!("Conversion failed at step {}: {}", step, error))
        }
    }
}

async fn print_events(mut rx: ProgressReceiver) -> Result<()> {
    while let Some(event) = rx.recv().await {
        println!("{}", event.to_json_line()?);
    }
    Ok(())
}

async fn render_progress(mut rx: ProgressReceiver, steps: usize) -> Result<()> {
    let bar = ProgressBar::new(steps as u64 + 1);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {}", e))?
            .progress_chars("#>-"),
    );

    while let Some(event) = rx.recv().await {
        if event.is_failure() {
            bar.abandon_with_message(event.message.clone());
            continue;
        }

        if !event.error.is_empty() {
            bar.println(format!("Step {} failed: {}", event.step, event.error));
            if !event.output.is_empty() {
                bar.println(event.output.trim_end());
            }
            continue;
        }

        bar.set_position(event.step.max(0) as u64);
        bar.set_message(event.message.clone());
    }

    if !bar.is_finished() {
        bar.finish();
    }
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".pssmux").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "pssmux.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("pssmux.log").display()
    );

    Ok(())
}
