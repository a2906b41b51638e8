//! MedVision - Main CLI Entry Point

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};

use medvision::{
    cli::{Args, Commands, Config, Verbosity},
    display::{Display, PredictionReport},
    doctor::Doctor,
    preprocess::open_image,
    repl::{self, input::InputHandler, Session},
    telemetry::TelemetryDisplay,
    Engine,
};

/// Resolved settings shared by every subcommand
struct AppContext {
    config: Config,
    config_source: Option<PathBuf>,
    checkpoint: PathBuf,
    verbosity: Verbosity,
    display: Display,
}

impl AppContext {
    fn from_args(args: &Args) -> Result<Self> {
        let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
        Ok(Self::with_config(args, config))
    }

    /// Doctor still runs on a broken config file and reports it
    fn for_doctor(args: &Args) -> Self {
        let config = Config::load(args.config.as_deref()).unwrap_or_default();
        Self::with_config(args, config)
    }

    fn with_config(args: &Args, config: Config) -> Self {
        if !config.display.color_output {
            colored::control::set_override(false);
        }
        let checkpoint = args
            .model
            .clone()
            .unwrap_or_else(|| config.checkpoint_path());
        let verbosity = args.verbosity_or(config.verbosity());
        let display = Display::new(verbosity, config.display.show_progress);

        Self {
            config,
            config_source: args.config.clone().or_else(Config::default_path),
            checkpoint,
            verbosity,
            display,
        }
    }

    fn engine(&self) -> Engine {
        Engine::detect()
    }

    fn report_telemetry(&self, engine: &Engine) {
        let display = TelemetryDisplay::new(engine.telemetry().clone(), self.verbosity);
        if display.should_show_details() {
            for event in engine.telemetry().recent_events(usize::MAX) {
                display.display_event(&event);
            }
            display.display_summary();
        }
    }
}

/// Classify one image file
fn run_predict(
    ctx: &AppContext,
    image_path: &Path,
    threshold: Option<f32>,
    json: bool,
) -> Result<()> {
    let threshold = threshold.unwrap_or(ctx.config.model.threshold);
    let engine = ctx.engine();

    let spinner = ctx.display.start_spinner("Loading model...");
    let loaded = engine.load_model(&ctx.checkpoint);
    ctx.display.finish_spinner(spinner);
    let model = loaded?;
    if !json {
        ctx.display.show_model_info(&model);
    }

    let image = open_image(image_path)?;

    let spinner = ctx.display.start_spinner("⏳ Analyzing...");
    let outcome = engine.predict(&image, threshold);
    ctx.display.finish_spinner(spinner);
    let result = outcome?;

    if json {
        let report = PredictionReport {
            image: image_path,
            checkpoint: model.source(),
            device: model.device().kind().as_str(),
            threshold,
            result,
            timestamp: Utc::now(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ctx.display.show_result(&result);
    }

    ctx.report_telemetry(&engine);
    Ok(())
}

/// Load the checkpoint and describe it
fn run_inspect(ctx: &AppContext) -> Result<()> {
    let engine = ctx.engine();
    let spinner = ctx.display.start_spinner("Loading model...");
    let loaded = engine.load_model(&ctx.checkpoint);
    ctx.display.finish_spinner(spinner);

    let model = loaded?;
    ctx.display.show_model_info(&model);
    ctx.report_telemetry(&engine);
    Ok(())
}

/// Interactive session
fn run_start(ctx: &AppContext) -> Result<()> {
    let input = InputHandler::with_history(ctx.config.history_path())?;
    let session = Session::new(
        ctx.engine(),
        Display::new(ctx.verbosity, ctx.config.display.show_progress),
        ctx.checkpoint.clone(),
        ctx.config.model.threshold,
    );
    repl::run(session, input)
}

fn run_doctor(ctx: &AppContext) -> Result<()> {
    let doctor = Doctor::new(
        ctx.config_source.clone(),
        ctx.checkpoint.clone(),
        ctx.config.state_dir(),
    );
    let checks = doctor.run_diagnostics();
    Doctor::display_results(&checks);

    if !Doctor::overall_status(&checks) {
        anyhow::bail!("One or more health checks failed");
    }
    Ok(())
}

fn show_config(ctx: &AppContext) -> Result<()> {
    let rendered = toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?;
    match ctx.config_source.as_ref() {
        Some(path) if path.exists() => println!("# {}", path.display()),
        _ => println!("# built-in defaults"),
    }
    println!("{}", rendered);
    Ok(())
}

fn show_usage() {
    println!("MedVision v{} - Pneumonia Detection", env!("CARGO_PKG_VERSION"));
    println!("\nUsage:");
    println!("  medvision predict <image>      Classify a chest X-ray");
    println!("  medvision inspect              Load and describe the checkpoint");
    println!("  medvision start                Interactive session");
    println!("  medvision doctor               System health checks");
    println!("  medvision config               Show configuration");
    println!("\nExample:");
    println!("  medvision predict scans/chest.jpeg --threshold 0.85");
    println!();
}

fn run(args: &Args, ctx: &AppContext) -> Result<()> {
    match &args.command {
        Some(Commands::Predict {
            image,
            threshold,
            json,
        }) => run_predict(ctx, image, *threshold, *json),
        Some(Commands::Inspect) => run_inspect(ctx),
        Some(Commands::Start) => run_start(ctx),
        Some(Commands::Doctor) => run_doctor(ctx),
        Some(Commands::Config) => show_config(ctx),
        None => {
            show_usage();
            Ok(())
        }
    }
}

fn main() {
    let args = Args::parse();

    let context = match args.command {
        Some(Commands::Doctor) => Ok(AppContext::for_doctor(&args)),
        _ => AppContext::from_args(&args),
    };
    let ctx = match context {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = run(&args, &ctx) {
        let cause: &(dyn std::error::Error + 'static) = err.as_ref();
        ctx.display.show_error(cause);
        std::process::exit(1);
    }
}
