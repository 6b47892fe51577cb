//! Plain-text rendering of simulation output for the command-line tools.

use crate::analysis::{self, DistStats, Summary, TrialViolation};
use crate::config::SimulationParameters;
use crate::events::{EventKind, EventTally, TrialResult};

/// Final-cash histogram resolution.
pub const HISTOGRAM_BINS: usize = 50;

pub fn print_parameters(params: &SimulationParameters) {
    println!("=== Scenario ===");
    println!("  Initial cash:        {:>12.0}", params.initial_cash);
    println!("  Burn rate / month:   {:>12.0}", params.burn_rate);
    println!("  Growth / month:      {:>11.1}%", params.growth_rate);
    println!("  Retention:           {:>11.1}%", params.retention_rate);
    println!("  Shock probability:   {:>11.1}%", params.shock_probability);
    println!("  Event probability:   {:>11.1}%", params.event_probability);
    println!("  Horizon (months):    {:>12}", params.horizon_months);
    println!("  Trials:              {:>12}", params.num_trials);
    println!("  Seed:                {:>12}", params.seed);
    for (i, c) in params.competitors.iter().enumerate() {
        println!(
            "  Competitor {:<2}        growth {:>6.1}%  aggressiveness {:>5.1}%",
            i + 1,
            c.growth_rate,
            c.aggressiveness
        );
    }
}

pub fn print_invariants(violations: &[TrialViolation], trials: usize) {
    let has = |f: fn(&TrialViolation) -> bool| violations.iter().any(f);
    fn status(fail: bool) -> &'static str {
        if fail { "FAIL" } else { "PASS" }
    }

    println!("\n=== Trial invariants ===");
    println!(
        "  [{}] History length equals duration",
        status(has(|v| matches!(v, TrialViolation::HistoryLengthMismatch { .. })))
    );
    println!(
        "  [{}] Duration within horizon",
        status(has(|v| matches!(v, TrialViolation::DurationExceedsHorizon { .. })))
    );
    println!(
        "  [{}] Months numbered 1..=duration",
        status(has(|v| matches!(v, TrialViolation::MonthSequenceGap { .. })))
    );
    println!(
        "  [{}] Final cash equals last recorded cash",
        status(has(|v| matches!(v, TrialViolation::FinalCashMismatch { .. })))
    );
    println!(
        "  [{}] No month simulated after a deficit",
        status(has(|v| matches!(v, TrialViolation::ContinuedAfterDeficit { .. })))
    );
    println!(
        "  [{}] Early stop only on deficit",
        status(has(|v| matches!(v, TrialViolation::EarlyStopWithoutDeficit { .. })))
    );
    println!(
        "  [{}] Success iff final cash > 0",
        status(has(|v| matches!(v, TrialViolation::SuccessFlagMismatch { .. })))
    );

    if violations.is_empty() {
        println!("  All trial invariants PASS ({trials} trials checked)");
    } else {
        println!("\n  {} violation(s):", violations.len());
        for v in violations {
            println!("    {v}");
        }
    }
}

pub fn print_summary(summary: &Summary, horizon_months: u32) {
    println!("\n=== Strategic evaluation ===");
    println!(
        "  Survival rate:            {:>6.1}%   ({} trials)",
        summary.success_rate, summary.trials
    );
    println!(
        "  Average lifetime:         {:>6.1} months of {horizon_months}",
        summary.average_lifetime
    );
    println!("  Cash volatility:      ±{:>10.0}", summary.cash_volatility);
    println!("  Strategic events:         {:>6}", summary.total_events);
    println!();
    println!("  {:<26} {:>5}", "Criterion", "Score");
    println!("  {}", "-".repeat(32));
    println!("  {:<26} {:>3}/5", "Financial robustness", summary.robustness);
    println!("  {:<26} {:>3}/5", "Time resilience", summary.resilience);
    println!("  {:<26} {:>3}/5", "Model stability", summary.stability);
    println!("  {:<26} {:>3}/5", "External vulnerability", summary.external_vulnerability);
    println!("  {}", "-".repeat(32));
    println!("  {:<26} {:>2}/20  ({})", "Total", summary.total_score, summary.verdict);
    println!("\n  Recommendation: {}", summary.recommendation.advice());
}

pub fn print_event_tally(tally: &EventTally) {
    println!("\n=== Strategic events fired ===");
    for kind in EventKind::ALL {
        println!("  {:<24} {:>8}", kind.label(), tally.get(kind));
    }
    println!("  {:<24} {:>8}", "total", tally.total());
}

pub fn print_distribution(dist: &DistStats) {
    println!("\n=== Final cash distribution (N={}) ===", dist.n);
    println!(
        "{:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10} | {:>10}",
        "min", "p5", "p25", "p50", "p75", "p95", "max", "mean", "stddev"
    );
    println!(
        "{:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0} | {:>10.0}",
        dist.min, dist.p5, dist.p25, dist.p50, dist.p75, dist.p95, dist.max, dist.mean, dist.std_dev,
    );
}

pub fn print_histogram(trials: &[TrialResult]) {
    let finals: Vec<f64> = trials.iter().map(|t| t.final_cash).collect();
    let overflowed = finals.iter().filter(|v| !v.is_finite()).count();
    let bins = analysis::histogram(&finals, HISTOGRAM_BINS);
    let peak = bins.iter().map(|b| b.count).max().unwrap_or(0);
    if peak == 0 && overflowed == 0 {
        return;
    }

    println!("\n=== Final cash histogram ===");
    const BAR_WIDTH: usize = 40;
    for b in &bins {
        let bar = "#".repeat(b.count * BAR_WIDTH / peak);
        println!("  {:>12.0} .. {:>12.0} | {:>6} {bar}", b.lower, b.upper, b.count);
    }
    if overflowed > 0 {
        println!("  ({overflowed} non-finite final cash value(s) not shown)");
    }
}

pub fn print_survival_curve(trials: &[TrialResult], horizon_months: u32) {
    println!("\n=== Survival by month ===");
    for (i, pct) in analysis::survival_curve(trials, horizon_months).iter().enumerate() {
        println!("  month {:>3} | {:>6.1}%", i + 1, pct);
    }
}

/// Month-by-month trace of one trial, with competitor columns in wargame mode.
pub fn print_trajectory(trial: &TrialResult) {
    println!("\n=== Example trajectory (trial {}) ===", trial.trial.0);
    let n_competitors = trial.history.first().map_or(0, |r| r.competitor_clients.len());

    let mut header = format!("{:>5} | {:>12} | {:>10} | {:>5}", "Month", "Cash", "Clients", "Shock");
    for i in 0..n_competitors {
        header.push_str(&format!(" | {:>10}", format!("Rival {}", i + 1)));
    }
    header.push_str(" | Event");
    println!("{header}");

    for r in &trial.history {
        let mut line = format!(
            "{:>5} | {:>12.0} | {:>10.1} | {:>5}",
            r.month.0,
            r.cash,
            r.clients,
            if r.shock { "yes" } else { "" }
        );
        for c in &r.competitor_clients {
            line.push_str(&format!(" | {c:>10.1}"));
        }
        line.push_str(&format!(" | {}", r.event.map_or("", |e| e.label())));
        println!("{line}");
    }

    let timeline = analysis::event_timeline(trial);
    if !timeline.is_empty() {
        println!("\n  Strategic events on this trajectory:");
        for (month, kind) in timeline {
            println!("    month {month:>3}: {kind}");
        }
    }
}
