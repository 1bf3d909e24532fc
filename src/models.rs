use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlowIntensity {
    Spotting,
    Light,
    Medium,
    Heavy,
}

impl FlowIntensity {
    pub const ALL: [FlowIntensity; 4] = [Self::Spotting, Self::Light, Self::Medium, Self::Heavy];

    /// Stored ordinal, 1 (spotting) to 4 (heavy).
    pub fn level(self) -> u8 {
        match self {
            Self::Spotting => 1,
            Self::Light => 2,
            Self::Medium => 3,
            Self::Heavy => 4,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.level() == level)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mood {
    Great,
    Good,
    Okay,
    Bad,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Self::Great, Self::Good, Self::Okay, Self::Bad];

    /// Stored ordinal, 1 (bad) to 4 (great).
    pub fn level(self) -> u8 {
        match self {
            Self::Great => 4,
            Self::Good => 3,
            Self::Okay => 2,
            Self::Bad => 1,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.level() == level)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Symptom {
    Cramps,
    Headache,
    Fatigue,
    MoodSwings,
    Bloating,
    BreastTenderness,
    Acne,
    Backache,
    Nausea,
    Insomnia,
    Cravings,
    Dizziness,
}

impl Symptom {
    /// Bit order is part of the stored format. Append only.
    pub const ALL: [Symptom; 12] = [
        Self::Cramps,
        Self::Headache,
        Self::Fatigue,
        Self::MoodSwings,
        Self::Bloating,
        Self::BreastTenderness,
        Self::Acne,
        Self::Backache,
        Self::Nausea,
        Self::Insomnia,
        Self::Cravings,
        Self::Dizziness,
    ];

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Set of symptoms packed into an integer mask, one bit per [`Symptom`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "u32", into = "u32")]
pub struct SymptomSet(u32);

impl From<u32> for SymptomSet {
    fn from(mask: u32) -> Self {
        Self::from_mask(mask)
    }
}

impl From<SymptomSet> for u32 {
    fn from(set: SymptomSet) -> Self {
        set.mask()
    }
}

impl SymptomSet {
    pub fn empty() -> Self {
        Self(0)
    }

    /// Unknown bits are dropped.
    pub fn from_mask(mask: u32) -> Self {
        Self(
            Symptom::ALL
                .iter()
                .filter(|s| mask & s.bit() != 0)
                .fold(0, |acc, s| acc | s.bit()),
        )
    }

    pub fn mask(self) -> u32 {
        self.0
    }

    pub fn contains(self, symptom: Symptom) -> bool {
        self.0 & symptom.bit() != 0
    }

    pub fn insert(&mut self, symptom: Symptom) {
        self.0 |= symptom.bit();
    }

    pub fn remove(&mut self, symptom: Symptom) {
        self.0 &= !symptom.bit();
    }

    /// Flip a symptom on or off, as the day editor does on tap.
    pub fn toggle(&mut self, symptom: Symptom) {
        self.0 ^= symptom.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Symptom> {
        Symptom::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl FromIterator<Symptom> for SymptomSet {
    fn from_iter<I: IntoIterator<Item = Symptom>>(iter: I) -> Self {
        let mut set = Self::empty();
        for symptom in iter {
            set.insert(symptom);
        }
        set
    }
}

/// Everything logged for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub has_period: bool,
    pub flow_intensity: Option<FlowIntensity>,
    pub mood: Option<Mood>,
    #[serde(default)]
    pub symptoms: SymptomSet,
    pub notes: Option<String>,
}

impl DayRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            has_period: false,
            flow_intensity: None,
            mood: None,
            symptoms: SymptomSet::empty(),
            notes: None,
        }
    }

    /// A bare period day with no intensity recorded.
    pub fn period(date: NaiveDate) -> Self {
        Self {
            has_period: true,
            ..Self::new(date)
        }
    }

    /// Picking a flow marks the day as a period day, clearing it unmarks it.
    pub fn with_flow(mut self, flow: Option<FlowIntensity>) -> Self {
        self.flow_intensity = flow;
        self.has_period = flow.is_some();
        self
    }

    pub fn with_mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = mood;
        self
    }

    pub fn with_symptoms(mut self, symptoms: SymptomSet) -> Self {
        self.symptoms = symptoms;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Blank notes are stored as none, and any recorded flow marks a period day.
    pub fn normalized(mut self) -> Self {
        if self.flow_intensity.is_some() {
            self.has_period = true;
        }
        if self.notes.as_deref().is_some_and(|n| n.trim().is_empty()) {
            self.notes = None;
        }
        self
    }

    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// One detected cycle, from a period onset to the day before the next onset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cycle {
    pub id: u32,
    pub start_date: NaiveDate,
    pub period_end_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub length: Option<i64>,
    pub period_length: i64,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PredictionMethod {
    OnboardingEstimate,
    WeightedAverage,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub next_period: DateRange,
    pub fertile_window: DateRange,
    pub ovulation_date: NaiveDate,
    pub confidence: f32,
    pub based_on_cycles: usize,
    pub method: PredictionMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleStats {
    pub total_cycles: usize,
    pub avg_cycle_length: Option<f32>,
    pub avg_period_length: Option<f32>,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    pub last_period_start: Option<NaiveDate>,
    pub last_period_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreferences {
    pub onboarding_completed: bool,
    pub initial_period_date: Option<NaiveDate>,
    pub estimated_cycle_length: i64,
    pub estimated_period_length: i64,
    #[serde(default)]
    pub theme_mode: ThemeMode,
    #[serde(default = "default_true")]
    pub use_dynamic_colors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            onboarding_completed: false,
            initial_period_date: None,
            estimated_cycle_length: 28,
            estimated_period_length: 5,
            theme_mode: ThemeMode::System,
            use_dynamic_colors: true,
        }
    }
}

/// Everything persisted in the encrypted journal file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Journal {
    pub days: Vec<DayRecord>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PeriodState {
    None,
    ConfirmedSpotting,
    ConfirmedLight,
    ConfirmedMedium,
    ConfirmedHeavy,
    Predicted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FertilityState {
    None,
    FertilePredicted,
    OvulationPredicted,
}

/// How a single calendar cell should be drawn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayState {
    pub date: NaiveDate,
    pub cycle_day: Option<i64>,
    pub phase: Option<CyclePhase>,
    pub period_state: PeriodState,
    pub fertility_state: FertilityState,
    pub symptoms: SymptomSet,
    pub mood: Option<Mood>,
    pub has_notes: bool,
    pub is_today: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodaySummary {
    pub cycle_day: Option<i64>,
    pub phase: Option<CyclePhase>,
    pub days_until_period: Option<i64>,
    pub days_until_fertile: Option<i64>,
    pub is_fertile_now: bool,
    pub is_period_today: bool,
    pub prediction: Option<Prediction>,
}

/// Data returned to the front end for a month view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthData {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayState>,
    pub prediction: Option<Prediction>,
    pub current_cycle: Option<Cycle>,
    pub stats: CycleStats,
}
