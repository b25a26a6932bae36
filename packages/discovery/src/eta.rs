//! Throughput sampling and remaining-time estimation.
//!
//! Stage loops feed per-item samples in; polls read smoothed projections
//! out. Two smoothing passes keep the number stable: an exponential pass
//! over the speed series and a second one over successive ETA values.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::progress::{StageProgress, StageStatus};
use crate::types::session::{Stage, StageSet};

/// Minimum samples before an estimate is produced.
pub const MIN_SAMPLES: usize = 3;

/// Smoothed speeds below this (items/minute) are treated as noise or a
/// stall rather than a projectable rate.
pub const MIN_SPEED_PER_MIN: f64 = 0.1;

/// Ring buffer capacity per stage; the oldest sample is evicted beyond it.
pub const MAX_SAMPLES: usize = 20;

/// Weight of the newest sample in the speed smoothing pass.
pub const SMOOTHING_ALPHA: f64 = 0.3;

/// Weight of the newest value in the secondary ETA smoothing pass.
pub const ETA_SMOOTHING_ALPHA: f64 = 0.4;

/// Confidence blend: share attributed to sample count vs. speed stability.
const COUNT_WEIGHT: f64 = 0.4;
const STABILITY_WEIGHT: f64 = 0.6;

/// One throughput observation for a stage.
#[derive(Debug, Clone, Copy)]
pub struct SpeedSample {
    pub recorded_at: DateTime<Utc>,
    pub items_per_minute: f64,
}

/// Projection for one stage or for a whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// Not enough signal yet, or the stage looks stalled.
    Unavailable,
    /// Projected remaining seconds with a [0, 1] confidence.
    Projected { eta_seconds: f64, confidence: f64 },
}

impl Estimate {
    pub fn eta_seconds(&self) -> Option<f64> {
        match self {
            Estimate::Projected { eta_seconds, .. } => Some(*eta_seconds),
            Estimate::Unavailable => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Estimate::Projected { confidence, .. } => Some(*confidence),
            Estimate::Unavailable => None,
        }
    }
}

#[derive(Debug, Default)]
struct StageHistory {
    samples: VecDeque<SpeedSample>,
    /// Last emitted ETA, input to the secondary smoothing pass.
    last_eta: Option<f64>,
}

/// Per-session ETA engine; one history per stage.
#[derive(Debug, Default)]
pub struct EtaEngine {
    histories: HashMap<Stage, StageHistory>,
}

impl EtaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record items completed over an elapsed wall-clock span.
    pub fn record_sample(&mut self, stage: Stage, items: usize, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= f64::EPSILON {
            return;
        }
        let items_per_minute = items as f64 / secs * 60.0;
        let history = self.histories.entry(stage).or_default();
        if history.samples.len() == MAX_SAMPLES {
            history.samples.pop_front();
        }
        history.samples.push_back(SpeedSample {
            recorded_at: Utc::now(),
            items_per_minute,
        });
    }

    /// Samples currently held for a stage.
    pub fn sample_count(&self, stage: Stage) -> usize {
        self.histories
            .get(&stage)
            .map(|h| h.samples.len())
            .unwrap_or(0)
    }

    /// Project remaining time for one stage.
    ///
    /// A completed stage always yields ETA 0 at full confidence. Otherwise
    /// the speed series is exponentially smoothed, the raw projection is
    /// `remaining / speed`, and successive projections are smoothed again
    /// to damp fluctuation.
    pub fn estimate(&mut self, stage: Stage, progress: &StageProgress) -> Estimate {
        if progress.status == StageStatus::Completed {
            return Estimate::Projected {
                eta_seconds: 0.0,
                confidence: 1.0,
            };
        }

        let Some(history) = self.histories.get_mut(&stage) else {
            return Estimate::Unavailable;
        };
        if history.samples.len() < MIN_SAMPLES {
            return Estimate::Unavailable;
        }

        let speed = smoothed_speed(&history.samples);
        if speed < MIN_SPEED_PER_MIN {
            return Estimate::Unavailable;
        }

        let raw_eta = progress.remaining() as f64 / speed * 60.0;
        let eta_seconds = match history.last_eta {
            Some(prev) => ETA_SMOOTHING_ALPHA * raw_eta + (1.0 - ETA_SMOOTHING_ALPHA) * prev,
            None => raw_eta,
        };
        history.last_eta = Some(eta_seconds);

        Estimate::Projected {
            eta_seconds,
            confidence: confidence(&history.samples),
        }
    }

    /// Project remaining time for the whole run: the current stage plus all
    /// pending stages; completed stages contribute zero.
    pub fn overall(&mut self, stages: &StageSet, current: Stage) -> Estimate {
        let per_stage: Vec<(Stage, StageStatus, Estimate)> = Stage::ALL
            .into_iter()
            .map(|stage| {
                let progress = stages.get(stage);
                (stage, progress.status, self.estimate(stage, progress))
            })
            .collect();
        combine_overall(&per_stage, current)
    }
}

/// Combine per-stage projections into one overall projection.
///
/// Stages before `current` are behind us; completed stages contribute zero
/// seconds. A pending stage with no signal yet drags confidence down, but
/// only an unavailable *current* stage makes the whole projection
/// unavailable.
pub fn combine_overall(per_stage: &[(Stage, StageStatus, Estimate)], current: Stage) -> Estimate {
    let mut total = 0.0;
    let mut confidences = Vec::new();
    let mut reached_current = false;

    for (stage, status, estimate) in per_stage {
        if *stage == current {
            reached_current = true;
        }
        if !reached_current || *status == StageStatus::Completed {
            continue;
        }
        match estimate {
            Estimate::Projected {
                eta_seconds,
                confidence,
            } => {
                total += eta_seconds;
                confidences.push(*confidence);
            }
            Estimate::Unavailable => {
                if *stage == current {
                    return Estimate::Unavailable;
                }
                confidences.push(0.0);
            }
        }
    }

    if confidences.is_empty() {
        // Everything at or after `current` is completed.
        return Estimate::Projected {
            eta_seconds: 0.0,
            confidence: 1.0,
        };
    }

    let confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
    Estimate::Projected {
        eta_seconds: total,
        confidence,
    }
}

/// Exponential smoothing over the speed series, oldest first, so recent
/// samples carry more weight.
fn smoothed_speed(samples: &VecDeque<SpeedSample>) -> f64 {
    let mut iter = samples.iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let mut acc = first.items_per_minute;
    for sample in iter {
        acc = SMOOTHING_ALPHA * sample.items_per_minute + (1.0 - SMOOTHING_ALPHA) * acc;
    }
    acc
}

/// Confidence in [0, 1]: grows with sample count, shrinks with speed
/// variance (coefficient of variation).
fn confidence(samples: &VecDeque<SpeedSample>) -> f64 {
    let n = samples.len() as f64;
    let count_term = (n / MAX_SAMPLES as f64).min(1.0);

    let mean = samples.iter().map(|s| s.items_per_minute).sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let variance = samples
        .iter()
        .map(|s| (s.items_per_minute - mean).powi(2))
        .sum::<f64>()
        / n;
    let cv = variance.sqrt() / mean;
    let stability = 1.0 / (1.0 + cv);

    (COUNT_WEIGHT * count_term + STABILITY_WEIGHT * stability).clamp(0.0, 1.0)
}

/// Compact human rendering of a seconds count.
pub fn format_duration(seconds: f64) -> String {
    let s = seconds.max(0.0).round() as u64;
    if s < 60 {
        format!("{s}s")
    } else if s < 3600 {
        format!("{}m {:02}s", s / 60, s % 60)
    } else {
        format!("{}h {:02}m", s / 3600, (s % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(processed: usize, total: usize) -> StageProgress {
        let mut p = StageProgress::new();
        p.begin(total);
        p.record(processed);
        p
    }

    /// One item per three seconds is 20 items/minute.
    fn record_steady(engine: &mut EtaEngine, stage: Stage, count: usize) {
        for _ in 0..count {
            engine.record_sample(stage, 1, Duration::from_secs(3));
        }
    }

    #[test]
    fn unavailable_below_min_samples() {
        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, MIN_SAMPLES - 1);
        assert_eq!(
            engine.estimate(Stage::Collecting, &progress(10, 60)),
            Estimate::Unavailable
        );
    }

    #[test]
    fn steady_twenty_per_minute_fifty_remaining_is_150s() {
        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, 3);

        let estimate = engine.estimate(Stage::Collecting, &progress(10, 60));
        let eta = estimate.eta_seconds().expect("estimate available");
        assert!((eta - 150.0).abs() <= 1.5, "eta was {eta}");
    }

    #[test]
    fn completed_stage_is_zero_at_full_confidence() {
        let mut engine = EtaEngine::new();
        let mut p = progress(5, 5);
        p.complete();
        assert_eq!(
            engine.estimate(Stage::Filtering, &p),
            Estimate::Projected {
                eta_seconds: 0.0,
                confidence: 1.0
            }
        );
    }

    #[test]
    fn stalled_speed_is_unavailable() {
        let mut engine = EtaEngine::new();
        // One item per 20 minutes: 0.05 items/minute, under the threshold.
        for _ in 0..MIN_SAMPLES {
            engine.record_sample(Stage::Enriching, 1, Duration::from_secs(1200));
        }
        assert_eq!(
            engine.estimate(Stage::Enriching, &progress(1, 10)),
            Estimate::Unavailable
        );
    }

    #[test]
    fn zero_elapsed_samples_are_dropped() {
        let mut engine = EtaEngine::new();
        engine.record_sample(Stage::Collecting, 1, Duration::ZERO);
        assert_eq!(engine.sample_count(Stage::Collecting), 0);
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, MAX_SAMPLES + 10);
        assert_eq!(engine.sample_count(Stage::Collecting), MAX_SAMPLES);
    }

    #[test]
    fn confidence_grows_with_samples() {
        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, 3);
        let few = engine
            .estimate(Stage::Collecting, &progress(10, 60))
            .confidence()
            .expect("available");

        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, MAX_SAMPLES);
        let many = engine
            .estimate(Stage::Collecting, &progress(10, 60))
            .confidence()
            .expect("available");

        assert!(many > few, "{many} should exceed {few}");
    }

    #[test]
    fn confidence_drops_with_variance() {
        let mut steady = EtaEngine::new();
        record_steady(&mut steady, Stage::Collecting, 6);
        let stable = steady
            .estimate(Stage::Collecting, &progress(10, 60))
            .confidence()
            .expect("available");

        let mut noisy = EtaEngine::new();
        for i in 0..6u64 {
            // Alternate between fast and slow items.
            let secs = if i % 2 == 0 { 1 } else { 12 };
            noisy.record_sample(Stage::Collecting, 1, Duration::from_secs(secs));
        }
        let jittery = noisy
            .estimate(Stage::Collecting, &progress(10, 60))
            .confidence()
            .expect("available");

        assert!(stable > jittery, "{stable} should exceed {jittery}");
    }

    #[test]
    fn secondary_smoothing_damps_jumps() {
        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, 5);
        let first = engine
            .estimate(Stage::Collecting, &progress(10, 60))
            .eta_seconds()
            .expect("available");

        // Remaining work suddenly doubles; the emitted ETA moves only part
        // of the way toward the new raw value.
        let second = engine
            .estimate(Stage::Collecting, &progress(10, 110))
            .eta_seconds()
            .expect("available");

        assert!(second > first);
        assert!(second < 300.0, "smoothing should damp the jump: {second}");
    }

    #[test]
    fn overall_sums_current_and_pending() {
        let mut engine = EtaEngine::new();
        record_steady(&mut engine, Stage::Collecting, 3);
        record_steady(&mut engine, Stage::Enriching, 3);

        let mut stages = StageSet::default();
        stages.collecting.begin(60);
        stages.collecting.record(10);
        stages.enriching.begin(20);

        // Collecting: 50 remaining at 20/min = 150s.
        // Enriching: 20 remaining at 20/min = 60s.
        let overall = engine.overall(&stages, Stage::Collecting);
        let eta = overall.eta_seconds().expect("available");
        assert!((eta - 210.0).abs() <= 2.1, "eta was {eta}");
    }

    #[test]
    fn overall_all_completed_is_zero() {
        let mut engine = EtaEngine::new();
        let mut stages = StageSet::default();
        for stage in Stage::ALL {
            let p = stages.get_mut(stage);
            p.begin(1);
            p.record(1);
            p.complete();
        }
        assert_eq!(
            engine.overall(&stages, Stage::Enriching),
            Estimate::Projected {
                eta_seconds: 0.0,
                confidence: 1.0
            }
        );
    }

    #[test]
    fn overall_unavailable_when_current_has_no_signal() {
        let mut engine = EtaEngine::new();
        let mut stages = StageSet::default();
        stages.collecting.begin(10);
        assert_eq!(
            engine.overall(&stages, Stage::Collecting),
            Estimate::Unavailable
        );
    }

    #[test]
    fn format_duration_boundaries() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(45.0), "45s");
        assert_eq!(format_duration(59.4), "59s");
        assert_eq!(format_duration(60.0), "1m 00s");
        assert_eq!(format_duration(200.0), "3m 20s");
        assert_eq!(format_duration(3599.0), "59m 59s");
        assert_eq!(format_duration(3600.0), "1h 00m");
        assert_eq!(format_duration(3900.0), "1h 05m");
    }
}
