use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{
    Cycle, DayRecord, DayState, FertilityState, FlowIntensity, PeriodState, Prediction,
    TodaySummary, UserPreferences,
};
use crate::phase;

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("invalid month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Everything needed to draw any date, derived once per journal change.
#[derive(Debug, Clone, Copy)]
pub struct CalendarContext<'a> {
    pub preferences: &'a UserPreferences,
    pub prediction: Option<&'a Prediction>,
    /// Start of the cycle that day numbers count from.
    pub reference_start: Option<NaiveDate>,
    pub today: NaiveDate,
}

impl<'a> CalendarContext<'a> {
    pub fn new(
        cycles: &[Cycle],
        preferences: &'a UserPreferences,
        prediction: Option<&'a Prediction>,
        today: NaiveDate,
    ) -> Self {
        Self {
            preferences,
            prediction,
            reference_start: cycles
                .last()
                .map(|c| c.start_date)
                .or(preferences.initial_period_date),
            today,
        }
    }
}

pub fn day_state(
    date: NaiveDate,
    record: Option<&DayRecord>,
    ctx: &CalendarContext<'_>,
) -> DayState {
    let prefs = ctx.preferences;
    let cycle_day = ctx
        .reference_start
        .map(|start| phase::cycle_day(date, start))
        .filter(|&d| d > 0);

    // Past the estimated length we no longer know which cycle the day is in.
    let phase = cycle_day
        .filter(|&d| d <= prefs.estimated_cycle_length)
        .map(|d| phase::phase(d, prefs.estimated_cycle_length, prefs.estimated_period_length));

    DayState {
        date,
        cycle_day,
        phase,
        period_state: period_state(date, record, ctx.prediction),
        fertility_state: fertility_state(date, ctx.prediction),
        symptoms: record.map(|r| r.symptoms).unwrap_or_default(),
        mood: record.and_then(|r| r.mood),
        has_notes: record.is_some_and(DayRecord::has_notes),
        is_today: date == ctx.today,
    }
}

/// Day states for every day of a month, first to last.
pub fn month_states(
    year: i32,
    month: u32,
    days: &[DayRecord],
    ctx: &CalendarContext<'_>,
) -> Result<Vec<DayState>, CalendarError> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(CalendarError::InvalidMonth { year, month })?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(CalendarError::InvalidMonth { year, month })?;

    let states = first_day
        .iter_days()
        .take_while(|d| *d < next_month)
        .map(|date| {
            let record = days.iter().find(|r| r.date == date);
            day_state(date, record, ctx)
        })
        .collect::<Vec<_>>();

    debug_assert!(states.iter().all(|s| s.date.month() == month));
    Ok(states)
}

/// The numbers shown on the home screen for `ctx.today`.
pub fn today_summary(days: &[DayRecord], ctx: &CalendarContext<'_>) -> TodaySummary {
    let today = ctx.today;
    let prefs = ctx.preferences;
    let cycle_day = ctx
        .reference_start
        .map(|start| phase::cycle_day(today, start));

    TodaySummary {
        cycle_day,
        phase: cycle_day
            .map(|d| phase::phase(d, prefs.estimated_cycle_length, prefs.estimated_period_length)),
        days_until_period: ctx
            .prediction
            .map(|p| phase::days_until_period(today, p.next_period.start)),
        days_until_fertile: ctx
            .prediction
            .map(|p| phase::days_until_fertile_window(today, p.fertile_window.start)),
        is_fertile_now: ctx
            .prediction
            .is_some_and(|p| p.fertile_window.contains(today)),
        is_period_today: days.iter().any(|d| d.date == today && d.has_period),
        prediction: ctx.prediction.cloned(),
    }
}

fn period_state(
    date: NaiveDate,
    record: Option<&DayRecord>,
    prediction: Option<&Prediction>,
) -> PeriodState {
    if let Some(record) = record.filter(|r| r.has_period) {
        return match record.flow_intensity {
            Some(FlowIntensity::Spotting) => PeriodState::ConfirmedSpotting,
            Some(FlowIntensity::Light) => PeriodState::ConfirmedLight,
            Some(FlowIntensity::Medium) | None => PeriodState::ConfirmedMedium,
            Some(FlowIntensity::Heavy) => PeriodState::ConfirmedHeavy,
        };
    }

    match prediction {
        Some(p) if p.next_period.contains(date) => PeriodState::Predicted,
        _ => PeriodState::None,
    }
}

fn fertility_state(date: NaiveDate, prediction: Option<&Prediction>) -> FertilityState {
    match prediction {
        Some(p) if p.ovulation_date == date => FertilityState::OvulationPredicted,
        Some(p) if p.fertile_window.contains(date) => FertilityState::FertilePredicted,
        _ => FertilityState::None,
    }
}

/// Dates of the predicted period, for highlighting ahead of time.
pub fn predicted_period_days(prediction: &Prediction) -> impl Iterator<Item = NaiveDate> + '_ {
    (0..prediction.next_period.length_days())
        .map(move |offset| prediction.next_period.start + Duration::days(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::detect_cycles;
    use crate::models::{CyclePhase, Mood, Symptom, SymptomSet};
    use crate::prediction::{predict, predict_from_onboarding};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn onboarded() -> UserPreferences {
        UserPreferences {
            onboarding_completed: true,
            initial_period_date: Some(date("2024-01-01")),
            ..UserPreferences::default()
        }
    }

    #[test]
    fn confirmed_flow_beats_prediction() {
        let prefs = onboarded();
        let pred = predict_from_onboarding(date("2024-01-01"), 28, 5);
        let ctx = CalendarContext::new(&[], &prefs, Some(&pred), date("2024-01-20"));

        let heavy = DayRecord::new(date("2024-01-29")).with_flow(Some(FlowIntensity::Heavy));
        let state = day_state(heavy.date, Some(&heavy), &ctx);
        assert_eq!(state.period_state, PeriodState::ConfirmedHeavy);

        let bare = DayRecord::period(date("2024-01-30"));
        let state = day_state(bare.date, Some(&bare), &ctx);
        assert_eq!(state.period_state, PeriodState::ConfirmedMedium);

        let state = day_state(date("2024-01-31"), None, &ctx);
        assert_eq!(state.period_state, PeriodState::Predicted);

        let state = day_state(date("2024-02-03"), None, &ctx);
        assert_eq!(state.period_state, PeriodState::None);
    }

    #[test]
    fn ovulation_marked_separately_from_fertile_days() {
        let prefs = onboarded();
        let pred = predict_from_onboarding(date("2024-01-01"), 28, 5);
        let ctx = CalendarContext::new(&[], &prefs, Some(&pred), date("2024-01-20"));

        assert_eq!(
            day_state(date("2024-01-15"), None, &ctx).fertility_state,
            FertilityState::OvulationPredicted
        );
        assert_eq!(
            day_state(date("2024-01-10"), None, &ctx).fertility_state,
            FertilityState::FertilePredicted
        );
        assert_eq!(
            day_state(date("2024-01-17"), None, &ctx).fertility_state,
            FertilityState::None
        );
    }

    #[test]
    fn phase_only_within_estimated_cycle() {
        let prefs = onboarded();
        let ctx = CalendarContext::new(&[], &prefs, None, date("2024-01-20"));

        let state = day_state(date("2024-01-14"), None, &ctx);
        assert_eq!(state.cycle_day, Some(14));
        assert_eq!(state.phase, Some(CyclePhase::Ovulatory));

        let state = day_state(date("2024-02-05"), None, &ctx);
        assert_eq!(state.cycle_day, Some(36));
        assert_eq!(state.phase, None);

        let state = day_state(date("2023-12-25"), None, &ctx);
        assert_eq!(state.cycle_day, None);
        assert_eq!(state.phase, None);
    }

    #[test]
    fn day_state_carries_log_details() {
        let prefs = UserPreferences::default();
        let ctx = CalendarContext::new(&[], &prefs, None, date("2024-03-05"));
        let record = DayRecord::new(date("2024-03-05"))
            .with_mood(Some(Mood::Good))
            .with_symptoms([Symptom::Cramps].into_iter().collect())
            .with_notes("ok");

        let state = day_state(record.date, Some(&record), &ctx);
        assert!(state.is_today);
        assert!(state.has_notes);
        assert_eq!(state.mood, Some(Mood::Good));
        assert!(state.symptoms.contains(Symptom::Cramps));
        assert_eq!(state.cycle_day, None);

        let empty = day_state(date("2024-03-06"), None, &ctx);
        assert_eq!(empty.symptoms, SymptomSet::empty());
        assert!(!empty.is_today);
    }

    #[test]
    fn month_covers_every_day() {
        let prefs = UserPreferences::default();
        let ctx = CalendarContext::new(&[], &prefs, None, date("2024-02-10"));
        let feb = month_states(2024, 2, &[], &ctx).unwrap();
        assert_eq!(feb.len(), 29);
        assert_eq!(feb[0].date, date("2024-02-01"));
        assert_eq!(feb[28].date, date("2024-02-29"));

        let dec = month_states(2023, 12, &[], &ctx).unwrap();
        assert_eq!(dec.len(), 31);

        assert!(month_states(2024, 13, &[], &ctx).is_err());
    }

    #[test]
    fn today_counts_down_to_next_period() {
        let days = vec![
            DayRecord::period(date("2024-01-01")),
            DayRecord::period(date("2024-01-02")),
            DayRecord::period(date("2024-01-29")),
        ];
        let cycles = detect_cycles(&days);
        let prefs = UserPreferences::default();
        let pred = predict(&cycles, &prefs, date("2024-02-10"));
        let ctx = CalendarContext::new(&cycles, &prefs, pred.as_ref(), date("2024-02-10"));

        let today = today_summary(&days, &ctx);
        assert_eq!(today.cycle_day, Some(13));
        assert_eq!(today.phase, Some(CyclePhase::Ovulatory));
        // One complete 28-day cycle: next period on 2024-02-26.
        assert_eq!(today.days_until_period, Some(16));
        // Fertile window opens 2024-02-07.
        assert_eq!(today.days_until_fertile, Some(-3));
        assert!(today.is_fertile_now);
        assert!(!today.is_period_today);
    }

    #[test]
    fn today_without_any_history() {
        let prefs = UserPreferences::default();
        let ctx = CalendarContext::new(&[], &prefs, None, date("2024-02-10"));
        let today = today_summary(&[], &ctx);
        assert_eq!(today.cycle_day, None);
        assert_eq!(today.days_until_period, None);
        assert!(!today.is_fertile_now);
    }

    #[test]
    fn predicted_days_span_the_period() {
        let pred = predict_from_onboarding(date("2024-01-01"), 28, 5);
        let days: Vec<_> = predicted_period_days(&pred).collect();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0], date("2024-01-29"));
        assert_eq!(days[4], date("2024-02-02"));
    }
}
