//! Command parsing for the interactive session

use std::path::PathBuf;

/// Session command types
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    /// Load a checkpoint (the configured one when no path is given)
    Load { path: Option<PathBuf> },
    /// Decode an image and keep it as the current one
    Open { path: PathBuf },
    /// Classify the current image
    Predict { threshold: Option<f32> },
    Status,
    Unload,
    Clear,
    Exit,
    Invalid { message: String },
    Unknown { input: String },
}

/// Parse input string into a command
pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();

    let Some(body) = trimmed.strip_prefix('/') else {
        return Command::Unknown {
            input: input.to_string(),
        };
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    match name.to_lowercase().as_str() {
        "help" | "h" => Command::Help,
        "exit" | "quit" | "q" => Command::Exit,
        "load" => Command::Load {
            path: (!rest.is_empty()).then(|| PathBuf::from(rest)),
        },
        "open" | "upload" => {
            if rest.is_empty() {
                Command::Invalid {
                    message: "Usage: /open <image>".to_string(),
                }
            } else {
                Command::Open {
                    path: PathBuf::from(rest),
                }
            }
        }
        "predict" | "p" => {
            if rest.is_empty() {
                Command::Predict { threshold: None }
            } else {
                match rest.parse::<f32>() {
                    Ok(value) => Command::Predict {
                        threshold: Some(value),
                    },
                    Err(_) => Command::Invalid {
                        message: format!("Not a threshold: {}", rest),
                    },
                }
            }
        }
        "status" => Command::Status,
        "unload" => Command::Unload,
        "clear" | "cls" => Command::Clear,
        _ => Command::Unknown {
            input: input.to_string(),
        },
    }
}

/// Help table: (usage, description)
pub const HELP: &[(&str, &str)] = &[
    ("/help, /h", "Show this help message"),
    ("/load [path]", "Load a checkpoint (configured one by default)"),
    ("/open <image>", "Open a chest X-ray image"),
    ("/predict [threshold]", "Classify the open image"),
    ("/status", "Show model, image, and session statistics"),
    ("/unload", "Release the loaded model"),
    ("/clear, /cls", "Clear screen"),
    ("/exit, /quit, /q", "Exit"),
];
