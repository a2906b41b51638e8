//! Terminal rendering for results, model info, and errors
//!
//! PNEUMONIA is shown in pink, NORMAL in green, matching the desktop tool.

use chrono::{DateTime, Utc};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use std::time::Duration;

use crate::classes::Label;
use crate::cli::Verbosity;
use crate::model::LoadedModel;
use crate::predictor::PredictionResult;

/// Render a probability as a percentage with one decimal place
pub fn format_percent(x: f32) -> String {
    format!("{:.1}%", x * 100.0)
}

fn colorize(label: Label, text: &str) -> ColoredString {
    match label {
        Label::Pneumonia => text.truecolor(0xff, 0x7a, 0xb6).bold(),
        Label::Normal => text.truecolor(0x12, 0xa4, 0x54).bold(),
    }
}

/// Machine-readable prediction output
#[derive(Debug, Serialize)]
pub struct PredictionReport<'a> {
    pub image: &'a Path,
    pub checkpoint: &'a Path,
    pub device: &'static str,
    pub threshold: f32,
    #[serde(flatten)]
    pub result: PredictionResult,
    pub timestamp: DateTime<Utc>,
}

/// Display manager for one-shot commands and the interactive session
pub struct Display {
    verbosity: Verbosity,
    show_progress: bool,
}

impl Display {
    pub fn new(verbosity: Verbosity, show_progress: bool) -> Self {
        Self {
            verbosity,
            show_progress: show_progress && verbosity.show_progress(),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Spinner shown while a blocking operation runs
    pub fn start_spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.magenta} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    pub fn finish_spinner(&self, spinner: Option<ProgressBar>) {
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
    }

    /// Show a classification result
    pub fn show_result(&self, result: &PredictionResult) {
        let headline = format!("{}  {}", result.label, format_percent(result.confidence));
        println!("{}", colorize(result.label, &headline));

        if self.verbosity == Verbosity::Quiet {
            return;
        }
        for (label, probability) in result.probabilities.iter() {
            println!(
                "  {:<10} {}",
                label.as_str().dimmed(),
                format_percent(probability)
            );
        }
    }

    /// Show what a loaded checkpoint contains
    pub fn show_model_info(&self, model: &LoadedModel) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        println!(
            "{} ({:.2}s)",
            "✅ Model loaded".green(),
            model.load_time().as_secs_f64()
        );
        println!("  Checkpoint:  {}", model.source().display());
        println!("  Classes:     {}", model.classes().names().join(", "));
        println!("  Image size:  {}x{}", model.image_size(), model.image_size());
        println!("  Device:      {}", model.device().kind());
        println!("  Parameters:  {}", model.parameter_count());
    }

    pub fn show_info(&self, message: &str) {
        if self.verbosity != Verbosity::Quiet {
            println!("{}", message.cyan());
        }
    }

    pub fn show_warning(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message.yellow());
    }

    /// Show an error; the cause chain is included at -vv
    pub fn show_error(&self, err: &(dyn Error + 'static)) {
        eprintln!("{} {}", "❌ Error:".red().bold(), err.to_string().red());
        if self.verbosity.show_causes() {
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("   {} {}", "caused by:".dimmed(), cause);
                source = cause.source();
            }
        }
    }

    /// Welcome banner for the interactive session
    pub fn show_banner(&self, version: &str, device: &str) {
        let width = 64;
        println!("\n{}", "=".repeat(width).magenta());
        println!(
            "{}",
            format!("  AI-MedVision {} - Pneumonia Detection", version)
                .bold()
                .magenta()
        );
        println!("{}", format!("  Device: {}", device).dimmed());
        println!("{}\n", "=".repeat(width).magenta());
        println!(
            "Type {} for commands, {} to quit\n",
            "/help".green(),
            "/exit".green()
        );
    }
}
