use chrono::NaiveDate;

use crate::models::{Cycle, DayRecord};

/// Days between flagged days that still count as one bleeding episode.
const MAX_PERIOD_GAP_DAYS: i64 = 2;
/// Smallest gap that starts a new cycle.
const MIN_CYCLE_GAP_DAYS: i64 = 15;

/// Segment logged days into cycles.
///
/// Only period days are considered. Gaps of 3 to 14 days are absorbed into
/// the current episode as spotting. The last cycle is always the ongoing one.
pub fn detect_cycles(days: &[DayRecord]) -> Vec<Cycle> {
    let mut period_days: Vec<NaiveDate> =
        days.iter().filter(|d| d.has_period).map(|d| d.date).collect();
    period_days.sort();

    let Some((&first, rest)) = period_days.split_first() else {
        return Vec::new();
    };

    let mut cycles: Vec<Cycle> = Vec::new();
    let mut next_id = 1;
    let mut period_start = first;
    let mut period_end = first;
    let mut previous = first;

    for &day in rest {
        let gap = (day - previous).num_days();

        if gap >= MIN_CYCLE_GAP_DAYS {
            cycles.push(Cycle {
                id: next_id,
                start_date: period_start,
                period_end_date: period_end,
                end_date: Some(day - chrono::Duration::days(1)),
                length: Some((day - period_start).num_days()),
                period_length: (period_end - period_start).num_days() + 1,
                is_complete: true,
            });
            next_id += 1;
            period_start = day;
            period_end = day;
        } else {
            if gap > MAX_PERIOD_GAP_DAYS {
                log::debug!("treating {gap}-day gap before {day} as spotting");
            }
            period_end = day;
        }
        previous = day;
    }

    cycles.push(Cycle {
        id: next_id,
        start_date: period_start,
        period_end_date: period_end,
        end_date: None,
        length: None,
        period_length: (period_end - period_start).num_days() + 1,
        is_complete: false,
    });

    log::debug!(
        "detected {} cycles from {} period days",
        cycles.len(),
        period_days.len()
    );
    cycles
}
