use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SimulationParameters;
use crate::events::{EventKind, EventTally, TrialResult};
use crate::types::lossless_f64;

/// Ceiling of every sub-score.
pub const MAX_SUB_SCORE: u8 = 5;

/// Cash standard deviation that costs one stability point.
const VOLATILITY_STEP: f64 = 10_000.0;

/// Qualitative reading of the 0–20 total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Robust,
    Moderate,
    Fragile,
}

impl Verdict {
    pub fn from_total(total: u8) -> Self {
        if total >= 16 {
            Verdict::Robust
        } else if total >= 10 {
            Verdict::Moderate
        } else {
            Verdict::Fragile
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Robust => "robust",
            Verdict::Moderate => "moderate",
            Verdict::Fragile => "fragile",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategic advice keyed on the survival rate alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    /// Above 70 % survival: room to grow harder or raise funds.
    Accelerate,
    /// Above 40 % survival: trim the burn rate or lift retention.
    Optimise,
    /// Otherwise: revisit the growth strategy or fixed costs.
    Rethink,
}

impl Recommendation {
    pub fn from_success_rate(success_rate: f64) -> Self {
        if success_rate > 70.0 {
            Recommendation::Accelerate
        } else if success_rate > 40.0 {
            Recommendation::Optimise
        } else {
            Recommendation::Rethink
        }
    }

    pub fn advice(self) -> &'static str {
        match self {
            Recommendation::Accelerate => {
                "Good odds of survival. Consider growing more aggressively or raising funds."
            }
            Recommendation::Optimise => "Fragile model. Reduce the burn rate or improve retention.",
            Recommendation::Rethink => "Too risky. Revisit the growth strategy or fixed costs.",
        }
    }
}

/// Aggregate view of one run-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub trials: usize,
    /// Share of trials ending with positive cash (%).
    pub success_rate: f64,
    /// Mean realized duration (months).
    pub average_lifetime: f64,
    /// Population standard deviation of final cash. Non-finite once any trial overflows.
    #[serde(with = "lossless_f64")]
    pub cash_volatility: f64,
    pub total_events: u64,
    pub robustness: u8,
    pub resilience: u8,
    pub stability: u8,
    pub external_vulnerability: u8,
    pub total_score: u8,
    pub verdict: Verdict,
    pub recommendation: Recommendation,
}

/// Reduce a run-set to its summary statistics and composite score.
///
/// Rounding is half-to-even, so a success rate of exactly 50 % scores 2, not 3.
/// An empty result slice yields zero statistics. A non-finite cash volatility
/// (some trial's cash overflowed) scores stability 0.
pub fn summarize(
    results: &[TrialResult],
    event_tally: &EventTally,
    params: &SimulationParameters,
) -> Summary {
    let n = results.len();
    let total_events = event_tally.total();

    let (success_rate, average_lifetime, cash_volatility, events_per_trial) = if n == 0 {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let nf = n as f64;
        let successes = results.iter().filter(|r| r.success).count();
        let lifetime = results.iter().map(|r| r.duration as f64).sum::<f64>() / nf;
        let finals: Vec<f64> = results.iter().map(|r| r.final_cash).collect();
        (successes as f64 / nf * 100.0, lifetime, population_std_dev(&finals), total_events as f64 / nf)
    };

    let robustness = clamp_score((success_rate / 20.0).round_ties_even());
    let resilience = if params.horizon_months == 0 {
        0
    } else {
        clamp_score((average_lifetime / (params.horizon_months as f64 / 5.0)).round_ties_even())
    };
    let stability = if cash_volatility.is_finite() {
        MAX_SUB_SCORE - clamp_score((cash_volatility / VOLATILITY_STEP).floor())
    } else {
        0
    };
    let external_vulnerability =
        clamp_score(MAX_SUB_SCORE as f64 - (events_per_trial * 5.0).round_ties_even());

    let total_score = robustness + resilience + stability + external_vulnerability;

    Summary {
        trials: n,
        success_rate,
        average_lifetime,
        cash_volatility,
        total_events,
        robustness,
        resilience,
        stability,
        external_vulnerability,
        total_score,
        verdict: Verdict::from_total(total_score),
        recommendation: Recommendation::from_success_rate(success_rate),
    }
}

fn clamp_score(x: f64) -> u8 {
    x.clamp(0.0, MAX_SUB_SCORE as f64) as u8
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Distribution statistics for a continuous metric across trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;

    Some(DistStats {
        n,
        min: values[0],
        p5: interp(0.05),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p95: interp(0.95),
        max: values[n - 1],
        mean,
        std_dev: population_std_dev(values),
    })
}

/// Spread of final cash across trials. `None` for an empty slice.
pub fn final_cash_distribution(trials: &[TrialResult]) -> Option<DistStats> {
    let mut finals: Vec<f64> = trials.iter().map(|t| t.final_cash).collect();
    percentile_stats(&mut finals)
}

/// One equal-width histogram bucket covering `[lower, upper)`.
/// The last bucket also includes its upper edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Bucket the finite `values` into at most `max_bins` equal-width bins spanning
/// their range. Infinite and NaN values are left out.
///
/// All-equal input yields a single bin. No finite input or `max_bins == 0` yields none.
pub fn histogram(values: &[f64], max_bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || max_bins == 0 {
        return Vec::new();
    }
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![Bin { lower: min, upper: max, count: finite.len() }];
    }

    let width = (max - min) / max_bins as f64;
    let mut bins: Vec<Bin> = (0..max_bins)
        .map(|i| Bin {
            lower: min + width * i as f64,
            upper: if i + 1 == max_bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();
    for &v in &finite {
        let idx = (((v - min) / width) as usize).min(max_bins - 1);
        bins[idx].count += 1;
    }
    bins
}

/// Months in which a strategic event fired on one trajectory, in order.
pub fn event_timeline(trial: &TrialResult) -> Vec<(u32, EventKind)> {
    trial.history.iter().filter_map(|r| r.event.map(|e| (r.month.0, e))).collect()
}

/// Share of trials (%) still running after each month `1..=horizon`.
///
/// A trial that stopped in month m counts as running through month m−1 only.
pub fn survival_curve(trials: &[TrialResult], horizon: u32) -> Vec<f64> {
    if trials.is_empty() {
        return vec![0.0; horizon as usize];
    }
    let n = trials.len() as f64;
    (1..=horizon)
        .map(|m| {
            let alive = trials
                .iter()
                .filter(|t| t.duration > m || (t.duration == m && t.final_cash >= 0.0))
                .count();
            alive as f64 / n * 100.0
        })
        .collect()
}

/// A structural invariant broken by a trial record.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialViolation {
    /// `history.len()` differs from `duration`.
    HistoryLengthMismatch { trial: u64, duration: u32, history_len: usize },
    /// Trial ran past the configured horizon.
    DurationExceedsHorizon { trial: u64, duration: u32, horizon: u32 },
    /// Month numbers are not 1, 2, 3, ...
    MonthSequenceGap { trial: u64, index: usize, month: u32 },
    /// `final_cash` differs from the last recorded cash.
    FinalCashMismatch { trial: u64, final_cash: f64, last_cash: f64 },
    /// A month ended in deficit but the trial kept going.
    ContinuedAfterDeficit { trial: u64, month: u32, cash: f64 },
    /// Trial ended before the horizon without a deficit.
    EarlyStopWithoutDeficit { trial: u64, duration: u32, last_cash: f64 },
    /// `success` disagrees with `final_cash > 0`.
    SuccessFlagMismatch { trial: u64, success: bool, final_cash: f64 },
}

impl fmt::Display for TrialViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HistoryLengthMismatch { trial, duration, history_len } => {
                write!(f, "HistoryLengthMismatch trial={trial}: duration={duration} history={history_len}")
            }
            Self::DurationExceedsHorizon { trial, duration, horizon } => {
                write!(f, "DurationExceedsHorizon trial={trial}: duration={duration} horizon={horizon}")
            }
            Self::MonthSequenceGap { trial, index, month } => {
                write!(f, "MonthSequenceGap trial={trial}: record {index} has month {month}")
            }
            Self::FinalCashMismatch { trial, final_cash, last_cash } => {
                write!(f, "FinalCashMismatch trial={trial}: final={final_cash} last={last_cash}")
            }
            Self::ContinuedAfterDeficit { trial, month, cash } => {
                write!(f, "ContinuedAfterDeficit trial={trial}: month={month} cash={cash}")
            }
            Self::EarlyStopWithoutDeficit { trial, duration, last_cash } => {
                write!(f, "EarlyStopWithoutDeficit trial={trial}: duration={duration} last_cash={last_cash}")
            }
            Self::SuccessFlagMismatch { trial, success, final_cash } => {
                write!(f, "SuccessFlagMismatch trial={trial}: success={success} final_cash={final_cash}")
            }
        }
    }
}

/// Check every per-trial invariant. Returns one item per violation found.
pub fn verify_trials(trials: &[TrialResult], horizon: u32) -> Vec<TrialViolation> {
    let mut violations = Vec::new();

    for t in trials {
        let id = t.trial.0;

        if t.history.len() != t.duration as usize {
            violations.push(TrialViolation::HistoryLengthMismatch {
                trial: id,
                duration: t.duration,
                history_len: t.history.len(),
            });
        }
        if t.duration > horizon {
            violations.push(TrialViolation::DurationExceedsHorizon {
                trial: id,
                duration: t.duration,
                horizon,
            });
        }
        if t.success != (t.final_cash > 0.0) {
            violations.push(TrialViolation::SuccessFlagMismatch {
                trial: id,
                success: t.success,
                final_cash: t.final_cash,
            });
        }

        for (i, r) in t.history.iter().enumerate() {
            if r.month.0 as usize != i + 1 {
                violations.push(TrialViolation::MonthSequenceGap { trial: id, index: i, month: r.month.0 });
            }
            if r.cash < 0.0 && i + 1 < t.history.len() {
                violations.push(TrialViolation::ContinuedAfterDeficit {
                    trial: id,
                    month: r.month.0,
                    cash: r.cash,
                });
            }
        }

        if let Some(last) = t.history.last() {
            // Bitwise, so an overflowed NaN trial still matches itself.
            if last.cash.to_bits() != t.final_cash.to_bits() {
                violations.push(TrialViolation::FinalCashMismatch {
                    trial: id,
                    final_cash: t.final_cash,
                    last_cash: last.cash,
                });
            }
            if t.duration < horizon && last.cash >= 0.0 {
                violations.push(TrialViolation::EarlyStopWithoutDeficit {
                    trial: id,
                    duration: t.duration,
                    last_cash: last.cash,
                });
            }
        }
    }

    violations
}
