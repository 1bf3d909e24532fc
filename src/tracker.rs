use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::calendar::{self, CalendarContext, CalendarError};
use crate::crypto::{self, CryptoError};
use crate::detection::detect_cycles;
use crate::models::*;
use crate::prediction;
use crate::storage::{JournalStore, StorageError};

pub const MIN_CYCLE_LENGTH: i64 = 21;
pub const MAX_CYCLE_LENGTH: i64 = 45;
pub const MIN_PERIOD_LENGTH: i64 = 1;
pub const MAX_PERIOD_LENGTH: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker is locked")]
    Locked,
    #[error("tracker state poisoned")]
    Poisoned,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
}

/// The passphrase and decrypted journal, held only while unlocked.
struct Session {
    passphrase: String,
    journal: Journal,
}

impl Drop for Session {
    fn drop(&mut self) {
        crypto::forget(&mut self.passphrase);
    }
}

/// Front-end facing tracker: owns the unlocked journal and derives views.
pub struct Tracker {
    store: JournalStore,
    session: Mutex<Option<Session>>,
}

impl Tracker {
    pub fn new(store: JournalStore) -> Self {
        Self {
            store,
            session: Mutex::new(None),
        }
    }

    fn session(&self) -> Result<MutexGuard<'_, Option<Session>>, TrackerError> {
        self.session.lock().map_err(|_| TrackerError::Poisoned)
    }

    /// Run `f` on the unlocked journal.
    fn read<T>(&self, f: impl FnOnce(&Journal) -> T) -> Result<T, TrackerError> {
        let guard = self.session()?;
        let session = guard.as_ref().ok_or(TrackerError::Locked)?;
        Ok(f(&session.journal))
    }

    /// Mutate a copy of the unlocked journal and keep it only once persisted.
    fn write<T>(&self, f: impl FnOnce(&mut Journal) -> T) -> Result<T, TrackerError> {
        let mut guard = self.session()?;
        let session = guard.as_mut().ok_or(TrackerError::Locked)?;
        let mut next = session.journal.clone();
        let out = f(&mut next);
        self.store.save(&session.passphrase, &next)?;
        session.journal = next;
        Ok(out)
    }

    pub fn is_setup(&self) -> bool {
        self.store.exists()
    }

    pub fn is_unlocked(&self) -> Result<bool, TrackerError> {
        Ok(self.session()?.is_some())
    }

    /// Create an empty journal under `passphrase` and unlock it.
    pub fn setup(&self, passphrase: String) -> Result<(), TrackerError> {
        let journal = Journal::default();
        self.store.save(&passphrase, &journal)?;
        *self.session()? = Some(Session {
            passphrase,
            journal,
        });
        log::info!("journal created");
        Ok(())
    }

    /// Returns `false` for a wrong passphrase. Disk and format faults are errors.
    pub fn unlock(&self, passphrase: String) -> Result<bool, TrackerError> {
        match self.store.load(&passphrase) {
            Ok(journal) => {
                *self.session()? = Some(Session {
                    passphrase,
                    journal,
                });
                Ok(true)
            }
            Err(e) => {
                let mut rejected = passphrase;
                crypto::forget(&mut rejected);
                match e {
                    StorageError::Crypto(CryptoError::Decryption) => {
                        log::warn!("unlock rejected: wrong passphrase");
                        Ok(false)
                    }
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Drop the journal from memory; the passphrase is zeroized on drop.
    pub fn lock(&self) -> Result<(), TrackerError> {
        self.session()?.take();
        Ok(())
    }

    /// Store the onboarding answers and log the last period start.
    pub fn complete_onboarding(
        &self,
        last_period_start: NaiveDate,
        cycle_length: i64,
        period_length: i64,
    ) -> Result<(), TrackerError> {
        self.write(|journal| {
            let prefs = &mut journal.preferences;
            prefs.onboarding_completed = true;
            prefs.initial_period_date = Some(last_period_start);
            prefs.estimated_cycle_length = cycle_length.clamp(MIN_CYCLE_LENGTH, MAX_CYCLE_LENGTH);
            prefs.estimated_period_length =
                period_length.clamp(MIN_PERIOD_LENGTH, MAX_PERIOD_LENGTH);
            upsert(&mut journal.days, DayRecord::period(last_period_start));
        })
    }

    /// Insert or replace the record for `record.date`.
    pub fn log_day(&self, record: DayRecord) -> Result<(), TrackerError> {
        self.write(|journal| upsert(&mut journal.days, record.normalized()))
    }

    /// Returns whether a record existed.
    pub fn delete_day(&self, date: NaiveDate) -> Result<bool, TrackerError> {
        self.write(|journal| {
            let before = journal.days.len();
            journal.days.retain(|d| d.date != date);
            journal.days.len() != before
        })
    }

    pub fn day(&self, date: NaiveDate) -> Result<Option<DayRecord>, TrackerError> {
        self.read(|journal| journal.days.iter().find(|d| d.date == date).cloned())
    }

    /// Records in `[start, end]`, oldest first.
    pub fn days_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayRecord>, TrackerError> {
        self.read(|journal| {
            let mut days: Vec<DayRecord> = journal
                .days
                .iter()
                .filter(|d| d.date >= start && d.date <= end)
                .cloned()
                .collect();
            days.sort_by_key(|d| d.date);
            days
        })
    }

    pub fn last_period_day(&self) -> Result<Option<DayRecord>, TrackerError> {
        self.read(|journal| {
            journal
                .days
                .iter()
                .filter(|d| d.has_period)
                .max_by_key(|d| d.date)
                .cloned()
        })
    }

    pub fn preferences(&self) -> Result<UserPreferences, TrackerError> {
        self.read(|journal| journal.preferences.clone())
    }

    pub fn update_cycle_length(&self, cycle_length: i64) -> Result<(), TrackerError> {
        self.write(|journal| {
            journal.preferences.estimated_cycle_length =
                cycle_length.clamp(MIN_CYCLE_LENGTH, MAX_CYCLE_LENGTH);
        })
    }

    pub fn update_period_length(&self, period_length: i64) -> Result<(), TrackerError> {
        self.write(|journal| {
            journal.preferences.estimated_period_length =
                period_length.clamp(MIN_PERIOD_LENGTH, MAX_PERIOD_LENGTH);
        })
    }

    pub fn update_theme(&self, mode: ThemeMode, dynamic_colors: bool) -> Result<(), TrackerError> {
        self.write(|journal| {
            journal.preferences.theme_mode = mode;
            journal.preferences.use_dynamic_colors = dynamic_colors;
        })
    }

    pub fn cycles(&self) -> Result<Vec<Cycle>, TrackerError> {
        self.read(|journal| detect_cycles(&journal.days))
    }

    pub fn prediction(&self, today: NaiveDate) -> Result<Option<Prediction>, TrackerError> {
        self.read(|journal| {
            prediction::predict(&detect_cycles(&journal.days), &journal.preferences, today)
        })
    }

    pub fn stats(&self) -> Result<CycleStats, TrackerError> {
        self.read(|journal| prediction::cycle_stats(&detect_cycles(&journal.days)))
    }

    pub fn today(&self, today: NaiveDate) -> Result<TodaySummary, TrackerError> {
        self.read(|journal| {
            let cycles = detect_cycles(&journal.days);
            let forecast = prediction::predict(&cycles, &journal.preferences, today);
            let ctx =
                CalendarContext::new(&cycles, &journal.preferences, forecast.as_ref(), today);
            calendar::today_summary(&journal.days, &ctx)
        })
    }

    pub fn month(&self, year: i32, month: u32, today: NaiveDate) -> Result<MonthData, TrackerError> {
        let data = self.read(|journal| -> Result<MonthData, CalendarError> {
            let cycles = detect_cycles(&journal.days);
            let forecast = prediction::predict(&cycles, &journal.preferences, today);
            let ctx =
                CalendarContext::new(&cycles, &journal.preferences, forecast.as_ref(), today);
            let days = calendar::month_states(year, month, &journal.days, &ctx)?;

            Ok(MonthData {
                year,
                month,
                days,
                prediction: forecast,
                current_cycle: cycles.iter().find(|c| !c.is_complete).cloned(),
                stats: prediction::cycle_stats(&cycles),
            })
        })??;
        Ok(data)
    }

    pub fn export_data(&self) -> Result<String, TrackerError> {
        let json = self.read(|journal| serde_json::to_string_pretty(journal))??;
        Ok(json)
    }

    /// Reset to an empty journal, keeping the passphrase.
    pub fn clear_all(&self) -> Result<(), TrackerError> {
        self.write(|journal| *journal = Journal::default())
    }

    /// Lock and delete the journal file.
    pub fn wipe_all_data(&self) -> Result<(), TrackerError> {
        self.lock()?;
        self.store.wipe()?;
        Ok(())
    }
}

fn upsert(days: &mut Vec<DayRecord>, record: DayRecord) {
    match days.iter_mut().find(|d| d.date == record.date) {
        Some(existing) => *existing = record,
        None => days.push(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreConfig;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn tracker() -> (tempfile::TempDir, Tracker) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(JournalStore::new(&StoreConfig::at(dir.path())));
        (dir, tracker)
    }

    fn unlocked() -> (tempfile::TempDir, Tracker) {
        let (dir, tracker) = tracker();
        tracker.setup("passphrase".into()).unwrap();
        (dir, tracker)
    }

    #[test]
    fn locked_tracker_refuses_access() {
        let (_dir, tracker) = tracker();
        assert!(!tracker.is_setup());
        assert!(matches!(tracker.cycles(), Err(TrackerError::Locked)));
        assert!(matches!(
            tracker.log_day(DayRecord::period(date("2024-01-01"))),
            Err(TrackerError::Locked)
        ));
    }

    #[test]
    fn setup_lock_unlock_cycle() {
        let (_dir, tracker) = unlocked();
        assert!(tracker.is_setup());
        tracker
            .log_day(DayRecord::period(date("2024-01-01")))
            .unwrap();

        tracker.lock().unwrap();
        assert!(!tracker.is_unlocked().unwrap());
        assert!(matches!(tracker.day(date("2024-01-01")), Err(TrackerError::Locked)));

        assert!(!tracker.unlock("nope".into()).unwrap());
        assert!(tracker.unlock("passphrase".into()).unwrap());
        assert!(tracker.day(date("2024-01-01")).unwrap().is_some());
    }

    #[test]
    fn failed_save_leaves_session_untouched() {
        let (_dir, tracker) = unlocked();
        let path = tracker.store.path().to_path_buf();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = tracker.log_day(DayRecord::period(date("2024-01-01")));
        assert!(matches!(result, Err(TrackerError::Storage(_))));
        assert!(tracker.day(date("2024-01-01")).unwrap().is_none());

        std::fs::remove_dir(&path).unwrap();
        tracker
            .log_day(DayRecord::period(date("2024-01-05")))
            .unwrap();
        tracker.lock().unwrap();
        tracker.unlock("passphrase".into()).unwrap();
        assert!(tracker.day(date("2024-01-01")).unwrap().is_none());
        assert!(tracker.day(date("2024-01-05")).unwrap().is_some());
    }

    #[test]
    fn unlock_surfaces_disk_faults() {
        let (_dir, tracker) = tracker();
        assert!(matches!(
            tracker.unlock("passphrase".into()),
            Err(TrackerError::Storage(StorageError::Io(_)))
        ));

        tracker.setup("passphrase".into()).unwrap();
        tracker.lock().unwrap();
        std::fs::write(tracker.store.path(), b"not a journal").unwrap();
        assert!(matches!(
            tracker.unlock("passphrase".into()),
            Err(TrackerError::Storage(StorageError::Crypto(
                CryptoError::InvalidFormat
            )))
        ));
        assert!(!tracker.is_unlocked().unwrap());
    }

    #[test]
    fn log_day_marks_flow_as_period() {
        let (_dir, tracker) = unlocked();
        let day = date("2024-02-01");
        tracker
            .log_day(DayRecord {
                flow_intensity: Some(FlowIntensity::Light),
                ..DayRecord::new(day)
            })
            .unwrap();
        assert!(tracker.day(day).unwrap().unwrap().has_period);
        assert_eq!(tracker.cycles().unwrap().len(), 1);
    }

    #[test]
    fn onboarding_clamps_and_logs_first_day() {
        let (_dir, tracker) = unlocked();
        tracker
            .complete_onboarding(date("2024-01-01"), 60, 0)
            .unwrap();

        let prefs = tracker.preferences().unwrap();
        assert!(prefs.onboarding_completed);
        assert_eq!(prefs.initial_period_date, Some(date("2024-01-01")));
        assert_eq!(prefs.estimated_cycle_length, MAX_CYCLE_LENGTH);
        assert_eq!(prefs.estimated_period_length, MIN_PERIOD_LENGTH);

        let first = tracker.day(date("2024-01-01")).unwrap().unwrap();
        assert!(first.has_period);
        assert_eq!(tracker.cycles().unwrap().len(), 1);
    }

    #[test]
    fn log_day_upserts() {
        let (_dir, tracker) = unlocked();
        let day = date("2024-02-01");
        tracker
            .log_day(DayRecord::new(day).with_flow(Some(FlowIntensity::Light)))
            .unwrap();
        tracker
            .log_day(
                DayRecord::new(day)
                    .with_flow(Some(FlowIntensity::Heavy))
                    .with_notes(" "),
            )
            .unwrap();

        let stored = tracker.day(day).unwrap().unwrap();
        assert_eq!(stored.flow_intensity, Some(FlowIntensity::Heavy));
        assert_eq!(stored.notes, None);
        assert_eq!(tracker.days_in_range(day, day).unwrap().len(), 1);
    }

    #[test]
    fn delete_day_reports_presence() {
        let (_dir, tracker) = unlocked();
        tracker
            .log_day(DayRecord::period(date("2024-02-01")))
            .unwrap();
        assert!(tracker.delete_day(date("2024-02-01")).unwrap());
        assert!(!tracker.delete_day(date("2024-02-01")).unwrap());
        assert!(tracker.last_period_day().unwrap().is_none());
    }

    #[test]
    fn changes_survive_relock() {
        let (_dir, tracker) = unlocked();
        tracker.update_cycle_length(30).unwrap();
        tracker.update_theme(ThemeMode::Dark, false).unwrap();
        tracker.lock().unwrap();
        tracker.unlock("passphrase".into()).unwrap();

        let prefs = tracker.preferences().unwrap();
        assert_eq!(prefs.estimated_cycle_length, 30);
        assert_eq!(prefs.theme_mode, ThemeMode::Dark);
        assert!(!prefs.use_dynamic_colors);
    }

    #[test]
    fn derived_views_follow_history() {
        let (_dir, tracker) = unlocked();
        for d in ["2024-01-01", "2024-01-02", "2024-01-29", "2024-01-30"] {
            tracker.log_day(DayRecord::period(date(d))).unwrap();
        }

        let cycles = tracker.cycles().unwrap();
        assert_eq!(cycles.len(), 2);

        let pred = tracker.prediction(date("2024-02-10")).unwrap().unwrap();
        assert_eq!(pred.method, PredictionMethod::WeightedAverage);
        assert_eq!(pred.next_period.start, date("2024-02-26"));

        let today = tracker.today(date("2024-02-10")).unwrap();
        assert_eq!(today.cycle_day, Some(13));
        assert_eq!(today.days_until_period, Some(16));

        let month = tracker.month(2024, 2, date("2024-02-10")).unwrap();
        assert_eq!(month.days.len(), 29);
        assert_eq!(
            month.current_cycle.map(|c| c.start_date),
            Some(date("2024-01-29"))
        );
        assert_eq!(month.stats.total_cycles, 1);
        assert_eq!(month.days[25].period_state, PeriodState::Predicted);

        assert!(matches!(
            tracker.month(2024, 0, date("2024-02-10")),
            Err(TrackerError::Calendar(_))
        ));

        assert_eq!(tracker.stats().unwrap().avg_cycle_length, Some(28.0));
    }

    #[test]
    fn export_and_clear() {
        let (_dir, tracker) = unlocked();
        tracker
            .log_day(DayRecord::period(date("2024-01-01")))
            .unwrap();
        let json = tracker.export_data().unwrap();
        assert!(json.contains("2024-01-01"));

        tracker.clear_all().unwrap();
        assert!(tracker.cycles().unwrap().is_empty());
        assert!(tracker.is_unlocked().unwrap());
    }

    #[test]
    fn wipe_locks_and_deletes() {
        let (_dir, tracker) = unlocked();
        tracker.wipe_all_data().unwrap();
        assert!(!tracker.is_setup());
        assert!(!tracker.is_unlocked().unwrap());
    }
}
