//! Interactive session
//!
//! Stands in for the desktop window: load a model, open an image, predict,
//! repeat. The session owns one `Engine`; reloading swaps the model while
//! the open image is kept.

pub mod commands;
pub mod input;

use anyhow::Result;
use colored::*;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::display::Display;
use crate::predictor::Engine;
use crate::preprocess::open_image;
use crate::repl::commands::{parse, Command, HELP};
use crate::repl::input::InputHandler;
use crate::telemetry::TelemetryDisplay;

/// Whether the loop should keep reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

struct OpenImage {
    path: PathBuf,
    image: DynamicImage,
}

/// Session state and command execution
pub struct Session {
    engine: Engine,
    display: Display,
    default_checkpoint: PathBuf,
    default_threshold: f32,
    image: Option<OpenImage>,
    started: Instant,
}

impl Session {
    pub fn new(
        engine: Engine,
        display: Display,
        default_checkpoint: PathBuf,
        default_threshold: f32,
    ) -> Self {
        Self {
            engine,
            display,
            default_checkpoint,
            default_threshold,
            image: None,
            started: Instant::now(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image.as_ref().map(|open| open.path.as_path())
    }

    /// Execute one command
    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Help => self.show_help(),
            Command::Exit => {
                println!("{}", "Goodbye!".green());
                return Flow::Exit;
            }
            Command::Load { path } => {
                let path = path.unwrap_or_else(|| self.default_checkpoint.clone());
                self.load(&path);
            }
            Command::Open { path } => self.open(path),
            Command::Predict { threshold } => self.predict(threshold),
            Command::Status => self.show_status(),
            Command::Unload => {
                if self.engine.unload().is_some() {
                    self.display.show_info("Model released.");
                } else {
                    self.display.show_warning("No model loaded.");
                }
            }
            Command::Clear => print!("\x1B[2J\x1B[1;1H"),
            Command::Invalid { message } => self.display.show_warning(&message),
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
            }
        }
        Flow::Continue
    }

    fn load(&mut self, path: &Path) {
        let spinner = self.display.start_spinner("Loading model...");
        let outcome = self.engine.load_model(path);
        self.display.finish_spinner(spinner);

        match outcome {
            Ok(model) => self.display.show_model_info(&model),
            Err(err) => self.display.show_error(&err),
        }
    }

    fn open(&mut self, path: PathBuf) {
        match open_image(&path) {
            Ok(image) => {
                self.display.show_info(&format!(
                    "Opened {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                ));
                self.image = Some(OpenImage { path, image });
            }
            Err(err) => self.display.show_error(&err),
        }
    }

    fn predict(&mut self, threshold: Option<f32>) {
        if !self.engine.is_loaded() {
            self.display.show_warning("Load a model first.");
            return;
        }
        let Some(open) = &self.image else {
            self.display.show_warning("Open an image first.");
            return;
        };

        let spinner = self.display.start_spinner("⏳ Analyzing...");
        let outcome = self
            .engine
            .predict(&open.image, threshold.unwrap_or(self.default_threshold));
        self.display.finish_spinner(spinner);

        match outcome {
            Ok(result) => self.display.show_result(&result),
            Err(err) => self.display.show_error(&err),
        }
    }

    fn show_help(&self) {
        println!("\n{}", "Available Commands:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());
        for (cmd, desc) in HELP {
            println!("  {:<22} {}", cmd.green(), desc);
        }
        println!();
    }

    fn show_status(&self) {
        println!("\n{}", "Session Status:".bold().cyan());
        println!("{}", "=".repeat(60).cyan());

        match self.engine.current() {
            Some(model) => println!(
                "  Model:       {} ({})",
                model.source().display(),
                model.device().kind()
            ),
            None => println!("  Model:       {}", "not loaded".yellow()),
        }
        match self.image_path() {
            Some(path) => println!("  Image:       {}", path.display()),
            None => println!("  Image:       {}", "none".yellow()),
        }
        println!("  Threshold:   {:.2}", self.default_threshold);

        let stats = self.engine.telemetry().get_stats();
        println!("  Predictions: {}", stats.predictions);
        println!("  Duration:    {}s", self.started.elapsed().as_secs());
        println!();
    }
}

/// Read-eval-print loop over a `Session`
pub fn run(mut session: Session, mut input: InputHandler) -> Result<()> {
    let telemetry = TelemetryDisplay::new(
        session.engine().telemetry().clone(),
        session.display.verbosity(),
    );
    session.display.show_banner(
        env!("CARGO_PKG_VERSION"),
        session.engine().device().kind().as_str(),
    );

    while let Some(line) = input.read_line()? {
        if line.is_empty() {
            continue;
        }
        if session.execute(parse(&line)) == Flow::Exit {
            break;
        }
    }

    input.save_history()?;
    telemetry.display_summary();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Verbosity;
    use crate::device::DeviceSelection;
    use crate::telemetry::TelemetryCollector;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn session() -> Session {
        Session::new(
            Engine::new(DeviceSelection::cpu(), TelemetryCollector::new()),
            Display::new(Verbosity::Quiet, false),
            PathBuf::from("/no/such/model.safetensors"),
            0.85,
        )
    }

    #[test]
    fn test_exit() {
        assert_eq!(session().execute(Command::Exit), Flow::Exit);
    }

    #[test]
    fn test_predict_without_model_is_refused() {
        let mut session = session();
        assert_eq!(
            session.execute(Command::Predict { threshold: None }),
            Flow::Continue
        );
        // Refused before reaching the engine
        assert_eq!(session.engine().telemetry().event_count(), 1);
    }

    #[test]
    fn test_failed_load_keeps_session_alive() {
        let mut session = session();
        assert_eq!(session.execute(Command::Load { path: None }), Flow::Continue);
        assert!(!session.engine().is_loaded());
        assert_eq!(session.engine().telemetry().get_stats().load_failures, 1);
    }

    #[test]
    fn test_open_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chest.png");
        RgbImage::from_pixel(12, 9, Rgb([40, 40, 40])).save(&path).unwrap();

        let mut session = session();
        session.execute(Command::Open { path: path.clone() });
        assert_eq!(session.image_path(), Some(path.as_path()));

        session.execute(Command::Open {
            path: dir.path().join("missing.png"),
        });
        // A failed open keeps the previous image
        assert_eq!(session.image_path(), Some(path.as_path()));
    }
}
