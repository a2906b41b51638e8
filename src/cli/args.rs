//! Command-line argument parsing for MedVision
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MedVision - Chest X-ray pneumonia screening from the terminal
#[derive(Parser, Debug)]
#[command(name = "medvision")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Classify chest X-rays as NORMAL or PNEUMONIA", long_about = None)]
pub struct Args {
    /// Checkpoint to load (overrides the configured one)
    #[arg(short, long, global = true)]
    pub model: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except the result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a single chest X-ray image
    Predict {
        /// Image file (JPEG, PNG, ...)
        image: PathBuf,

        /// PNEUMONIA is reported when its probability reaches this value
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Print a JSON report instead of the coloured summary
        #[arg(long)]
        json: bool,
    },

    /// Load a checkpoint and report what it contains
    Inspect,

    /// Start an interactive session
    Start,

    /// Run system diagnostics and health checks
    Doctor,

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Verbosity from flags, falling back to the configured default
    pub fn verbosity_or(&self, configured: Verbosity) -> Verbosity {
        if self.quiet || self.verbose > 0 {
            self.verbosity()
        } else {
            configured
        }
    }
}

impl Verbosity {
    /// Parse the configuration spelling
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quiet" => Some(Verbosity::Quiet),
            "normal" => Some(Verbosity::Normal),
            "verbose" => Some(Verbosity::Verbose),
            "very_verbose" => Some(Verbosity::VeryVerbose),
            _ => None,
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show telemetry events
    pub fn show_events(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    /// Check if should show error cause chains
    pub fn show_causes(&self) -> bool {
        matches!(self, Verbosity::VeryVerbose)
    }
}
