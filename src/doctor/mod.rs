//! Doctor command for system diagnostics
//!
//! Checks the compute devices, the config file, the configured checkpoint,
//! the state directory and available memory.

use colored::*;
use std::path::PathBuf;
use sysinfo::System;

use crate::checkpoint::read_checkpoint;
use crate::cli::Config;
use crate::device::ComputeDevice;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    config_source: Option<PathBuf>,
    checkpoint: PathBuf,
    state_dir: PathBuf,
}

impl Doctor {
    /// Create a new doctor instance
    pub fn new(config_source: Option<PathBuf>, checkpoint: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            config_source,
            checkpoint,
            state_dir,
        }
    }

    /// Run all health checks
    pub fn run_diagnostics(&self) -> Vec<HealthCheck> {
        vec![
            self.check_accelerator(),
            self.check_config(),
            self.check_checkpoint(),
            self.check_state_dir(),
            self.check_memory(),
        ]
    }

    /// Check 1: GPU availability (CPU always works, so this only warns)
    fn check_accelerator(&self) -> HealthCheck {
        let available: Vec<&str> = ComputeDevice::PRIORITY
            .iter()
            .filter(|d| **d != ComputeDevice::Cpu && d.is_available())
            .map(|d| d.as_str())
            .collect();

        if available.is_empty() {
            HealthCheck::new(
                "Accelerator",
                HealthStatus::Warn("No GPU available, inference runs on CPU".to_string()),
            )
        } else {
            HealthCheck::new("Accelerator", HealthStatus::Pass)
        }
    }

    /// Check 2: Config file parses and validates
    fn check_config(&self) -> HealthCheck {
        match self.config_source.as_deref() {
            Some(path) if path.exists() => match Config::load_from_file(path) {
                Ok(_) => HealthCheck::new("Config", HealthStatus::Pass),
                Err(e) => HealthCheck::new("Config", HealthStatus::Fail(e.to_string())),
            },
            _ => HealthCheck::new(
                "Config",
                HealthStatus::Warn("No config file, using built-in defaults".to_string()),
            ),
        }
    }

    /// Check 3: Checkpoint exists and its header validates
    fn check_checkpoint(&self) -> HealthCheck {
        match read_checkpoint(&self.checkpoint) {
            Ok(contents) => {
                if contents.header.image_size < 32 {
                    HealthCheck::new(
                        "Checkpoint",
                        HealthStatus::Warn(format!(
                            "img_size {} is unusually small",
                            contents.header.image_size
                        )),
                    )
                } else {
                    HealthCheck::new("Checkpoint", HealthStatus::Pass)
                }
            }
            Err(e) => HealthCheck::new("Checkpoint", HealthStatus::Fail(e.to_string())),
        }
    }

    /// Check 4: State directory writable (history file)
    fn check_state_dir(&self) -> HealthCheck {
        if let Err(e) = std::fs::create_dir_all(&self.state_dir) {
            return HealthCheck::new(
                "State Directory",
                HealthStatus::Warn(format!("Cannot create {}: {}", self.state_dir.display(), e)),
            );
        }

        let test_file = self.state_dir.join(".medvision_test");
        match std::fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_file);
                HealthCheck::new("State Directory", HealthStatus::Pass)
            }
            Err(_) => HealthCheck::new(
                "State Directory",
                HealthStatus::Warn("No write permission, history will not persist".to_string()),
            ),
        }
    }

    /// Check 5: Memory availability
    fn check_memory(&self) -> HealthCheck {
        let mut sys = System::new();
        sys.refresh_memory();

        let available_mb = sys.available_memory() / (1024 * 1024);

        if available_mb < 256 {
            HealthCheck::new(
                "Memory",
                HealthStatus::Fail(format!("Less than 256MB RAM available ({} MB)", available_mb)),
            )
        } else if available_mb < 1024 {
            HealthCheck::new(
                "Memory",
                HealthStatus::Warn(format!("Low memory ({} MB available)", available_mb)),
            )
        } else {
            HealthCheck::new("Memory", HealthStatus::Pass)
        }
    }

    /// Display health check results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}", "🩺 MedVision Doctor".bold());
        println!("─────────────────────────────────────");

        for check in checks {
            let (symbol, message) = match &check.status {
                HealthStatus::Pass => ("✓".green(), "OK".green()),
                HealthStatus::Warn(msg) => ("⚠".yellow(), msg.as_str().yellow()),
                HealthStatus::Fail(msg) => ("✗".red(), msg.as_str().red()),
            };
            println!("{:<20} {} {}", check.name, symbol, message);
        }

        println!();
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks
            .iter()
            .any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_checkpoint_fails() {
        let dir = TempDir::new().unwrap();
        let doctor = Doctor::new(
            None,
            dir.path().join("absent.safetensors"),
            dir.path().to_path_buf(),
        );
        let check = doctor.check_checkpoint();
        assert_eq!(check.name, "Checkpoint");
        assert!(matches!(check.status, HealthStatus::Fail(_)));
    }

    #[test]
    fn test_state_dir_writable() {
        let dir = TempDir::new().unwrap();
        let doctor = Doctor::new(None, dir.path().join("x"), dir.path().join("state"));
        assert_eq!(doctor.check_state_dir().status, HealthStatus::Pass);
    }

    #[test]
    fn test_accelerator_never_fails() {
        let doctor = Doctor::new(None, PathBuf::from("x"), PathBuf::from("y"));
        assert!(!matches!(
            doctor.check_accelerator().status,
            HealthStatus::Fail(_)
        ));
    }

    #[test]
    fn test_config_check() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let doctor = Doctor::new(Some(path.clone()), dir.path().join("x"), dir.path().join("y"));
        assert!(matches!(doctor.check_config().status, HealthStatus::Warn(_)));

        std::fs::write(&path, "[model]\nthreshold = 0.7\n").unwrap();
        assert_eq!(doctor.check_config().status, HealthStatus::Pass);

        std::fs::write(&path, "[model]\nthreshold = 3.0\n").unwrap();
        assert!(matches!(doctor.check_config().status, HealthStatus::Fail(_)));
    }

    #[test]
    fn test_overall_status() {
        let pass = vec![
            HealthCheck::new("A", HealthStatus::Pass),
            HealthCheck::new("B", HealthStatus::Warn("warning".to_string())),
        ];
        assert!(Doctor::overall_status(&pass));

        let fail = vec![
            HealthCheck::new("A", HealthStatus::Pass),
            HealthCheck::new("B", HealthStatus::Fail("error".to_string())),
        ];
        assert!(!Doctor::overall_status(&fail));
    }
}
