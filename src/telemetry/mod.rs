//! Telemetry system for MedVision
//!
//! Collects engine events (device choice, model loads, predictions) and
//! aggregates them into session statistics for terminal display.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use colored::*;

use crate::classes::Label;
use crate::cli::Verbosity;
use crate::device::ComputeDevice;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    DeviceSelected {
        device: ComputeDevice,
        timestamp: Instant,
    },
    ModelLoaded {
        path: String,
        device: ComputeDevice,
        duration_ms: u64,
        timestamp: Instant,
    },
    ModelLoadFailed {
        path: String,
        reason: String,
        timestamp: Instant,
    },
    PredictionCompleted {
        label: Label,
        confidence: f32,
        duration_ms: u64,
        timestamp: Instant,
    },
    PredictionFailed {
        reason: String,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub models_loaded: usize,
    pub load_failures: usize,
    pub predictions: usize,
    pub pneumonia_calls: usize,
    pub normal_calls: usize,
    pub prediction_failures: usize,
    pub total_inference_ms: u64,
}

/// Events kept for display; statistics still count every event
pub const MAX_EVENTS: usize = 1024;

/// Telemetry collector
#[derive(Debug, Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

/// A panic while holding the lock leaves plain counters behind, still usable
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_EVENTS))),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = relock(&self.stats);
            match &event {
                TelemetryEvent::DeviceSelected { .. } => {}
                TelemetryEvent::ModelLoaded { .. } => {
                    stats.models_loaded += 1;
                }
                TelemetryEvent::ModelLoadFailed { .. } => {
                    stats.load_failures += 1;
                }
                TelemetryEvent::PredictionCompleted {
                    label, duration_ms, ..
                } => {
                    stats.predictions += 1;
                    stats.total_inference_ms += duration_ms;
                    match label {
                        Label::Pneumonia => stats.pneumonia_calls += 1,
                        Label::Normal => stats.normal_calls += 1,
                    }
                }
                TelemetryEvent::PredictionFailed { .. } => {
                    stats.prediction_failures += 1;
                }
            }
        }

        let mut events = relock(&self.events);
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        relock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Number of retained events
    pub fn event_count(&self) -> usize {
        relock(&self.events).len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = relock(&self.events);
        let start = events.len().saturating_sub(n);
        events.iter().skip(start).cloned().collect()
    }

    /// Mean forward-pass latency over successful predictions
    pub fn mean_inference_ms(&self) -> Option<f64> {
        let stats = relock(&self.stats);
        if stats.predictions == 0 {
            None
        } else {
            Some(stats.total_inference_ms as f64 / stats.predictions as f64)
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple telemetry display
pub struct TelemetryDisplay {
    collector: TelemetryCollector,
    verbosity: Verbosity,
}

impl TelemetryDisplay {
    /// Create a new display
    pub fn new(collector: TelemetryCollector, verbosity: Verbosity) -> Self {
        Self {
            collector,
            verbosity,
        }
    }

    /// Print one event as it happens (verbose levels only)
    pub fn display_event(&self, event: &TelemetryEvent) {
        if !self.verbosity.show_events() {
            return;
        }
        let line = match event {
            TelemetryEvent::DeviceSelected { device, .. } => {
                format!("device selected: {}", device)
            }
            TelemetryEvent::ModelLoaded {
                path,
                device,
                duration_ms,
                ..
            } => format!("model loaded from {} on {} in {}ms", path, device, duration_ms),
            TelemetryEvent::ModelLoadFailed { path, reason, .. } => {
                format!("model load failed for {}: {}", path, reason)
            }
            TelemetryEvent::PredictionCompleted {
                label,
                confidence,
                duration_ms,
                ..
            } => format!(
                "prediction {} ({:.4}) in {}ms",
                label, confidence, duration_ms
            ),
            TelemetryEvent::PredictionFailed { reason, .. } => {
                format!("prediction failed: {}", reason)
            }
        };
        eprintln!("{} {}", "[telemetry]".dimmed(), line.dimmed());
    }

    /// Display summary statistics
    pub fn display_summary(&self) {
        if !self.verbosity.show_events() {
            return;
        }
        let stats = self.collector.get_stats();
        let elapsed = self.collector.elapsed();

        println!("\n📊 Session Summary");
        println!("─────────────────────────────────────");
        println!("Duration:          {:?}", elapsed);
        println!("Models loaded:     {}", stats.models_loaded);
        println!("Load failures:     {}", stats.load_failures);
        println!("Predictions:       {}", stats.predictions);
        println!("  PNEUMONIA:       {}", stats.pneumonia_calls);
        println!("  NORMAL:          {}", stats.normal_calls);
        println!("Failures:          {}", stats.prediction_failures);
        if let Some(mean) = self.collector.mean_inference_ms() {
            println!("Mean inference:    {:.1}ms", mean);
        }
        println!();
    }

    /// Check if should show detailed output
    pub fn should_show_details(&self) -> bool {
        self.verbosity.show_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(label: Label, duration_ms: u64) -> TelemetryEvent {
        TelemetryEvent::PredictionCompleted {
            label,
            confidence: 0.9,
            duration_ms,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_collector_creation() {
        let collector = TelemetryCollector::new();
        assert_eq!(collector.event_count(), 0);
        assert_eq!(collector.get_stats().predictions, 0);
        assert!(collector.mean_inference_ms().is_none());
    }

    #[test]
    fn test_record_predictions() {
        let collector = TelemetryCollector::new();
        collector.record(completed(Label::Pneumonia, 30));
        collector.record(completed(Label::Normal, 10));
        collector.record(TelemetryEvent::PredictionFailed {
            reason: "bad image".to_string(),
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.predictions, 2);
        assert_eq!(stats.pneumonia_calls, 1);
        assert_eq!(stats.normal_calls, 1);
        assert_eq!(stats.prediction_failures, 1);
        assert_eq!(collector.mean_inference_ms(), Some(20.0));
    }

    #[test]
    fn test_record_loads() {
        let collector = TelemetryCollector::new();
        collector.record(TelemetryEvent::ModelLoaded {
            path: "models/best.safetensors".to_string(),
            device: ComputeDevice::Cpu,
            duration_ms: 420,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::ModelLoadFailed {
            path: "missing.safetensors".to_string(),
            reason: "not found".to_string(),
            timestamp: Instant::now(),
        });

        let stats = collector.get_stats();
        assert_eq!(stats.models_loaded, 1);
        assert_eq!(stats.load_failures, 1);
    }

    #[test]
    fn test_recent_events() {
        let collector = TelemetryCollector::new();
        for i in 0..10 {
            collector.record(completed(Label::Normal, i));
        }
        assert_eq!(collector.recent_events(3).len(), 3);
        assert_eq!(collector.event_count(), 10);
    }

    #[test]
    fn test_event_buffer_is_bounded() {
        let collector = TelemetryCollector::new();
        for i in 0..(MAX_EVENTS as u64 + 10) {
            collector.record(completed(Label::Normal, i));
        }

        assert_eq!(collector.event_count(), MAX_EVENTS);
        assert_eq!(collector.get_stats().predictions, MAX_EVENTS + 10);

        let oldest = &collector.recent_events(MAX_EVENTS)[0];
        assert!(matches!(
            oldest,
            TelemetryEvent::PredictionCompleted { duration_ms: 10, .. }
        ));
        let newest = &collector.recent_events(1)[0];
        let last = MAX_EVENTS as u64 + 9;
        assert!(matches!(
            newest,
            TelemetryEvent::PredictionCompleted { duration_ms, .. } if *duration_ms == last
        ));
    }

    #[test]
    fn test_clones_share_state() {
        let collector = TelemetryCollector::new();
        let clone = collector.clone();
        clone.record(completed(Label::Normal, 5));
        assert_eq!(collector.get_stats().predictions, 1);
    }
}
