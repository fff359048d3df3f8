//! Multi-day trend classification.
//!
//! Shared by the rule engine's trend rules and ad-hoc trend queries.
//! Given daily samples in chronological order, the last 3 samples are
//! "recent" and the remainder "previous"; the trend is the percentage
//! change of the recent average over the previous average.

/// Direction of a computed trend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrendDirection {
    /// Recent average more than 5% above the previous average.
    Increasing,
    /// Recent average more than 5% below the previous average.
    Decreasing,
    /// Within the ±5% band.
    Stable,
}

/// A classified trend over daily samples.
#[derive(Clone, Copy, Debug)]
pub struct Trend {
    /// Which way the metric is moving.
    pub direction: TrendDirection,
    /// Percentage change of recent over previous average.
    pub change_percent: f64,
    /// 0–100; saturates at a 10% change.
    pub confidence: f64,
}

fn average(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

/// Classify a series of daily samples (oldest first).
///
/// With three or fewer samples there is no "previous" window, so the
/// change is 0 and the trend is stable.
#[must_use]
pub fn compute_trend(samples: &[f64]) -> Trend {
    let split = samples.len().saturating_sub(3);
    let (previous, recent) = samples.split_at(split);

    let previous_avg = average(previous);
    let change_percent = if previous_avg.abs() < f64::EPSILON {
        0.0
    } else {
        (average(recent) - previous_avg) / previous_avg * 100.0
    };

    let direction = if change_percent > 5.0 {
        TrendDirection::Increasing
    } else if change_percent < -5.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Trend {
        direction,
        change_percent,
        confidence: (change_percent.abs() / 10.0).min(1.0) * 100.0,
    }
}
