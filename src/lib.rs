//! Privacy-first, on-device cycle tracking core.
//!
//! - [`detection`] segments logged period days into cycles
//! - [`phase`] classifies cycle days into hormonal phases
//! - [`prediction`] forecasts the next period and fertile window
//! - [`calendar`] derives what each calendar day and the home screen show
//! - [`tracker`] holds the unlocked, encrypted journal behind one API
//!
//! The engine modules are pure; only [`storage`] and [`tracker`] touch disk.

pub mod calendar;
pub mod crypto;
pub mod detection;
pub mod models;
pub mod phase;
pub mod prediction;
pub mod storage;
pub mod tracker;

pub use detection::detect_cycles;
pub use models::{
    Cycle, CyclePhase, DateRange, DayRecord, FlowIntensity, Mood, Prediction, PredictionMethod,
    Symptom, SymptomSet, UserPreferences,
};
pub use prediction::{predict, predict_from_history, predict_from_onboarding};
pub use storage::{JournalStore, StoreConfig};
pub use tracker::{Tracker, TrackerError};
