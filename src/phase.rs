use chrono::NaiveDate;

use crate::models::CyclePhase;

/// Days from ovulation to the next period.
pub const LUTEAL_PHASE_DAYS: i64 = 14;

/// 1-based day of the cycle that started on `cycle_start`.
pub fn cycle_day(date: NaiveDate, cycle_start: NaiveDate) -> i64 {
    (date - cycle_start).num_days() + 1
}

/// Classify a cycle day. Menstrual wins when the period overlaps ovulation.
pub fn phase(cycle_day: i64, cycle_length: i64, period_length: i64) -> CyclePhase {
    if cycle_day <= period_length {
        return CyclePhase::Menstrual;
    }

    let ovulation_day = cycle_length - LUTEAL_PHASE_DAYS;

    if (ovulation_day - 2..=ovulation_day + 1).contains(&cycle_day) {
        CyclePhase::Ovulatory
    } else if cycle_day < ovulation_day - 2 {
        CyclePhase::Follicular
    } else {
        CyclePhase::Luteal
    }
}

pub fn days_until_period(date: NaiveDate, next_period_start: NaiveDate) -> i64 {
    (next_period_start - date).num_days()
}

pub fn days_until_fertile_window(date: NaiveDate, fertile_start: NaiveDate) -> i64 {
    (fertile_start - date).num_days()
}
