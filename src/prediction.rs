use chrono::{Duration, NaiveDate};

use crate::models::{Cycle, CycleStats, DateRange, Prediction, PredictionMethod, UserPreferences};
use crate::phase::LUTEAL_PHASE_DAYS;

const FERTILE_DAYS_BEFORE_OVULATION: i64 = 5;
const FERTILE_DAYS_AFTER_OVULATION: i64 = 1;
/// Only the most recent complete cycles feed the averages.
const MAX_CYCLES_FOR_AVERAGE: usize = 6;
const DEFAULT_CYCLE_LENGTH: i64 = 28;
pub const MIN_CONFIDENCE: f32 = 0.25;
pub const MAX_CONFIDENCE: f32 = 0.90;

/// Project the next period straight from what the user told us at onboarding.
/// Confidence is pinned to the floor.
pub fn predict_from_onboarding(
    last_period_start: NaiveDate,
    cycle_length: i64,
    period_length: i64,
) -> Prediction {
    project(Internals {
        last_start: last_period_start,
        avg_cycle: cycle_length,
        avg_period: period_length,
        cycle_count: 0,
        std_dev: 0.0,
        method: PredictionMethod::OnboardingEstimate,
    })
}

/// Generate a prediction from detected cycles.
///
/// Uses a weighted average of the last 6 complete cycles, newest weighted
/// highest. Without any complete cycle it degrades to the onboarding
/// projection, anchored on the ongoing cycle (or `today` for an empty list).
pub fn predict_from_history(
    cycles: &[Cycle],
    fallback_cycle_length: i64,
    fallback_period_length: i64,
    today: NaiveDate,
) -> Prediction {
    let completed: Vec<&Cycle> = cycles.iter().filter(|c| c.is_complete).collect();

    if completed.is_empty() {
        let last = cycles.last();
        log::debug!("no complete cycles yet, projecting from estimates");
        return predict_from_onboarding(
            last.map_or(today, |c| c.start_date),
            fallback_cycle_length,
            last.map_or(fallback_period_length, |c| c.period_length),
        );
    }

    let recent = &completed[completed.len().saturating_sub(MAX_CYCLES_FOR_AVERAGE)..];
    let lengths: Vec<i64> = recent.iter().filter_map(|c| c.length).collect();
    let period_lengths: Vec<i64> = recent.iter().map(|c| c.period_length).collect();

    // `completed` is non-empty, so `cycles` is too.
    let last_start = cycles.last().map_or(today, |c| c.start_date);

    project(Internals {
        last_start,
        avg_cycle: weighted_average(&lengths),
        avg_period: weighted_average(&period_lengths),
        cycle_count: recent.len(),
        std_dev: std_deviation(&lengths),
        method: PredictionMethod::WeightedAverage,
    })
}

/// Pick the best available prediction: history when any period has been
/// logged, otherwise the onboarding answers, otherwise nothing.
pub fn predict(
    cycles: &[Cycle],
    preferences: &UserPreferences,
    today: NaiveDate,
) -> Option<Prediction> {
    if !cycles.is_empty() {
        Some(predict_from_history(
            cycles,
            preferences.estimated_cycle_length,
            preferences.estimated_period_length,
            today,
        ))
    } else {
        preferences.initial_period_date.map(|start| {
            predict_from_onboarding(
                start,
                preferences.estimated_cycle_length,
                preferences.estimated_period_length,
            )
        })
    }
}

/// Compute cycle statistics for the insights view.
pub fn cycle_stats(cycles: &[Cycle]) -> CycleStats {
    let mut completed: Vec<&Cycle> = cycles.iter().filter(|c| c.is_complete).collect();
    completed.sort_by_key(|c| c.start_date);

    let Some(last) = completed.last() else {
        return CycleStats {
            total_cycles: 0,
            avg_cycle_length: None,
            avg_period_length: None,
            shortest_cycle: None,
            longest_cycle: None,
            last_period_start: None,
            last_period_end: None,
        };
    };

    let cycle_lengths: Vec<i64> = completed.iter().filter_map(|c| c.length).collect();
    let period_lengths: Vec<i64> = completed.iter().map(|c| c.period_length).collect();

    CycleStats {
        total_cycles: completed.len(),
        avg_cycle_length: mean(&cycle_lengths).map(|m| m as f32),
        avg_period_length: mean(&period_lengths).map(|m| m as f32),
        shortest_cycle: cycle_lengths.iter().copied().min(),
        longest_cycle: cycle_lengths.iter().copied().max(),
        last_period_start: Some(last.start_date),
        last_period_end: Some(last.period_end_date),
    }
}

struct Internals {
    last_start: NaiveDate,
    avg_cycle: i64,
    avg_period: i64,
    cycle_count: usize,
    std_dev: f64,
    method: PredictionMethod,
}

fn project(internals: Internals) -> Prediction {
    let next_start = internals.last_start + Duration::days(internals.avg_cycle);
    let next_end = next_start + Duration::days(internals.avg_period - 1);

    // Ovulation estimated at 14 days before predicted period start
    let ovulation = next_start - Duration::days(LUTEAL_PHASE_DAYS);
    let fertile_start = ovulation - Duration::days(FERTILE_DAYS_BEFORE_OVULATION);
    let fertile_end = ovulation + Duration::days(FERTILE_DAYS_AFTER_OVULATION);

    Prediction {
        next_period: DateRange::new(next_start, next_end),
        fertile_window: DateRange::new(fertile_start, fertile_end),
        ovulation_date: ovulation,
        confidence: confidence(internals.cycle_count, internals.std_dev, internals.avg_cycle),
        based_on_cycles: internals.cycle_count,
        method: internals.method,
    }
}

/// Blend data volume (60%) and regularity (40%), scaled into the
/// [`MIN_CONFIDENCE`, `MAX_CONFIDENCE`] band.
fn confidence(cycle_count: usize, std_dev: f64, avg_length: i64) -> f32 {
    if cycle_count == 0 {
        return MIN_CONFIDENCE;
    }

    let data_factor = (cycle_count as f64 / MAX_CYCLES_FOR_AVERAGE as f64).min(1.0);
    let regularity_factor = if avg_length > 0 && std_dev > 0.0 {
        (1.0 - std_dev / avg_length as f64).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let raw = data_factor * 0.6 + regularity_factor * 0.4;
    let scaled = raw * f64::from(MAX_CONFIDENCE - MIN_CONFIDENCE) + f64::from(MIN_CONFIDENCE);
    (scaled as f32).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Linearly weighted mean rounded to whole days; the i-th oldest value
/// weighs i + 1.
fn weighted_average(values: &[i64]) -> i64 {
    match values {
        [] => DEFAULT_CYCLE_LENGTH,
        [only] => *only,
        _ => {
            let (sum, weights) = values
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(sum, weights), (i, &v)| {
                    let w = (i + 1) as f64;
                    (sum + v as f64 * w, weights + w)
                });
            (sum / weights).round() as i64
        }
    }
}

fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<i64>() as f64 / values.len() as f64)
}

/// Population standard deviation; zero for fewer than two values.
fn std_deviation(values: &[i64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values).unwrap_or(0.0);
    let variance =
        values.iter().map(|&v| (v as f64 - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
