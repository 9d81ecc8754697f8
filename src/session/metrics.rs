use serde::Serialize;

use crate::session::record::Session;

/// A keystroke slower than this multiple of the mean is treated as a pause.
/// Fixed on purpose; there is no per-user tuning.
pub const OUTLIER_FACTOR: f64 = 3.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionMetrics {
    pub keystrokes: usize,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub wpm: f64,
    pub outlier_threshold_ms: f64,
    pub outliers: usize,
}

impl SessionMetrics {
    /// Summary figures for the review screen. Latency figures only look at
    /// positive durations, so the synthetic zero of the first keystroke never
    /// drags the minimum down. The outlier baseline is the mean over every
    /// duration in the session, zero included. Sessions with nothing to
    /// measure report zeros rather than NaN.
    pub fn from_session(session: &Session) -> Self {
        let durations: Vec<f64> = session.keystrokes.iter().map(|k| k.duration).collect();
        let positive: Vec<f64> = durations.iter().copied().filter(|d| *d > 0.0).collect();

        let (avg, min, max) = if positive.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = positive.iter().sum();
            let min = positive.iter().copied().fold(f64::INFINITY, f64::min);
            let max = positive.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (sum / positive.len() as f64, min, max)
        };

        let baseline = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };
        let threshold = baseline * OUTLIER_FACTOR;
        let outliers = if threshold > 0.0 {
            positive.iter().filter(|d| **d > threshold).count()
        } else {
            0
        };

        Self {
            keystrokes: session.keystrokes.len(),
            avg_latency_ms: avg,
            min_latency_ms: min,
            max_latency_ms: max,
            wpm: session.wpm(),
            outlier_threshold_ms: threshold,
            outliers,
        }
    }
}
