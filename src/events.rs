use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Month, TrialId, lossless_f64};

/// Cash injected by a funding round.
pub const FUNDING_AMOUNT: f64 = 20_000.0;

/// Strategic events that can strike a trial in any month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Funding,
    Partnership,
    CriticalBug,
    ReputationCrisis,
}

impl EventKind {
    /// Draw order for the uniform pick. Reordering changes every seeded run.
    pub const ALL: [EventKind; 4] = [
        EventKind::Funding,
        EventKind::Partnership,
        EventKind::CriticalBug,
        EventKind::ReputationCrisis,
    ];

    /// Apply this event's effect to the trial's persistent state.
    ///
    /// Funding is a one-time cash injection; the other three rescale growth or
    /// retention for the rest of the trial.
    pub fn apply(self, cash: &mut f64, growth_rate: &mut f64, retention: &mut f64) {
        match self {
            EventKind::Funding => *cash += FUNDING_AMOUNT,
            EventKind::Partnership => *growth_rate *= 1.2,
            EventKind::CriticalBug => *retention *= 0.9,
            EventKind::ReputationCrisis => *growth_rate *= 0.7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::Funding => "funding round",
            EventKind::Partnership => "strategic partnership",
            EventKind::CriticalBug => "critical bug",
            EventKind::ReputationCrisis => "reputation crisis",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of one trial at the end of a simulated month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRecord {
    pub month: Month,
    #[serde(with = "lossless_f64")]
    pub cash: f64,
    #[serde(with = "lossless_f64")]
    pub clients: f64,
    pub shock: bool,
    pub event: Option<EventKind>,
    /// One entry per competitor, in parameter order. Empty outside wargame mode.
    #[serde(with = "lossless_f64::vec")]
    pub competitor_clients: Vec<f64>,
}

/// Outcome of one trial. `history.len() == duration` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: TrialId,
    /// `final_cash > 0`; ending exactly at zero counts as failure.
    pub success: bool,
    #[serde(with = "lossless_f64")]
    pub final_cash: f64,
    pub duration: u32,
    pub history: Vec<MonthRecord>,
}

/// Count of strategic events fired, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTally(BTreeMap<EventKind, u64>);

impl EventTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: EventKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    /// Fold another partial tally into this one.
    pub fn merge(&mut self, other: &EventTally) {
        for (&kind, &n) in &other.0 {
            *self.0.entry(kind).or_insert(0) += n;
        }
    }

    pub fn get(&self, kind: EventKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventKind, u64)> + '_ {
        self.0.iter().map(|(&k, &n)| (k, n))
    }

    /// Rebuild the tally from recorded trial histories.
    pub fn from_trials(trials: &[TrialResult]) -> Self {
        let mut tally = EventTally::new();
        for record in trials.iter().flat_map(|t| &t.history) {
            if let Some(kind) = record.event {
                tally.record(kind);
            }
        }
        tally
    }
}
