//! Trial-stream analyser for runway simulation output.
//!
//! Reads a trials NDJSON file (one `TrialResult` per line, as written by
//! `runway --output`), then prints:
//!   - trial invariant status (PASS/FAIL per invariant)
//!   - strategic event tally rebuilt from the histories
//!   - final cash distribution and histogram
//!   - the full summary and score, when a parameter file is supplied
//!
//! Usage: analyse [trials.ndjson] [params.json]

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result, bail};

use runway::analysis::{final_cash_distribution, summarize, verify_trials};
use runway::config::SimulationParameters;
use runway::events::{EventTally, TrialResult};
use runway::report;

fn main() -> Result<()> {
    env_logger::init();

    let trials_path = std::env::args().nth(1).unwrap_or_else(|| "trials.ndjson".to_string());
    let params_path = std::env::args().nth(2);

    let file = File::open(&trials_path)
        .with_context(|| format!("cannot open {trials_path}; run `runway --output {trials_path}` first"))?;

    let mut trials: Vec<TrialResult> = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let trial = serde_json::from_str::<TrialResult>(&line)
            .with_context(|| format!("failed to deserialize line {}", line_no + 1))?;
        trials.push(trial);
    }
    log::info!("loaded {} trials from {trials_path}", trials.len());

    if trials.is_empty() {
        bail!("{trials_path} contains no trials");
    }

    let params = match &params_path {
        Some(path) => Some(
            SimulationParameters::from_json_file(path)
                .with_context(|| format!("loading parameters from {path}"))?,
        ),
        None => None,
    };

    // Without parameters, the longest recorded trial is the best horizon estimate.
    let horizon = match &params {
        Some(p) => p.horizon_months,
        None => trials.iter().map(|t| t.duration).max().unwrap_or(0),
    };

    let violations = verify_trials(&trials, horizon);
    if !violations.is_empty() {
        log::warn!("{} trial invariant violation(s) in {trials_path}", violations.len());
    }
    report::print_invariants(&violations, trials.len());

    let tally = EventTally::from_trials(&trials);
    report::print_event_tally(&tally);

    if let Some(dist) = final_cash_distribution(&trials) {
        report::print_distribution(&dist);
    }
    report::print_histogram(&trials);
    report::print_survival_curve(&trials, horizon);

    match &params {
        Some(p) => {
            if p.num_trials as usize != trials.len() {
                log::warn!(
                    "parameter file expects {} trials, stream holds {}",
                    p.num_trials,
                    trials.len()
                );
            }
            let summary = summarize(&trials, &tally, p);
            report::print_summary(&summary, p.horizon_months);
        }
        None => println!("\n(no parameter file given: scoring skipped)"),
    }

    Ok(())
}
