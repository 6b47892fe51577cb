use std::fs::File;
use std::io::{BufWriter, Write};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};

use runway::analysis;
use runway::config::{CompetitorProfile, SimulationParameters};
use runway::report;
use runway::simulation::Simulation;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let mut params_path: Option<String> = None;
    let mut seed: Option<u64> = None;
    let mut months: Option<u32> = None;
    let mut trials: Option<u32> = None;
    let mut cash: Option<f64> = None;
    let mut burn: Option<f64> = None;
    let mut growth: Option<f64> = None;
    let mut retention: Option<f64> = None;
    let mut shock: Option<f64> = None;
    let mut event: Option<f64> = None;
    let mut competitors: Vec<CompetitorProfile> = Vec::new();
    let mut output_path: Option<String> = None;
    let mut summary_path: Option<String> = None;
    let mut quiet = false;
    let mut serial = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--params" => params_path = Some(value(&args, &mut i)?),
            "--seed" => seed = Some(value(&args, &mut i)?),
            "--months" => months = Some(value(&args, &mut i)?),
            "--trials" => trials = Some(value(&args, &mut i)?),
            "--cash" => cash = Some(value(&args, &mut i)?),
            "--burn" => burn = Some(value(&args, &mut i)?),
            "--growth" => growth = Some(value(&args, &mut i)?),
            "--retention" => retention = Some(value(&args, &mut i)?),
            "--shock" => shock = Some(value(&args, &mut i)?),
            "--event" => event = Some(value(&args, &mut i)?),
            "--competitor" => {
                let spec: String = value(&args, &mut i)?;
                competitors.push(parse_competitor(&spec)?);
            }
            "--output" => output_path = Some(value(&args, &mut i)?),
            "--summary" => summary_path = Some(value(&args, &mut i)?),
            "--quiet" => quiet = true,
            "--serial" => serial = true,
            other => log::warn!("ignoring unknown argument {other}"),
        }
        i += 1;
    }

    let mut params = match &params_path {
        Some(path) => SimulationParameters::from_json_file(path)
            .with_context(|| format!("loading parameters from {path}"))?,
        None => SimulationParameters::canonical(),
    };
    if let Some(v) = seed {
        params.seed = v;
    }
    if let Some(v) = months {
        params.horizon_months = v;
    }
    if let Some(v) = trials {
        params.num_trials = v;
    }
    if let Some(v) = cash {
        params.initial_cash = v;
    }
    if let Some(v) = burn {
        params.burn_rate = v;
    }
    if let Some(v) = growth {
        params.growth_rate = v;
    }
    if let Some(v) = retention {
        params.retention_rate = v;
    }
    if let Some(v) = shock {
        params.shock_probability = v;
    }
    if let Some(v) = event {
        params.event_probability = v;
    }
    if !competitors.is_empty() {
        params.competitors = competitors;
    }

    let sim = Simulation::new(params)?;
    let params = sim.params();
    log::info!(
        "running {} trials over {} months (seed {}, {} competitor(s))",
        params.num_trials,
        params.horizon_months,
        params.seed,
        params.competitors.len()
    );

    let started = Instant::now();
    let output = if serial { sim.run_serial() } else { sim.run() };
    log::debug!("simulation finished in {:?}", started.elapsed());

    let summary = analysis::summarize(&output.trials, &output.event_tally, params);

    if let Some(path) = &output_path {
        let file = File::create(path).with_context(|| format!("creating {path}"))?;
        let mut writer = BufWriter::new(file);
        for t in &output.trials {
            serde_json::to_writer(&mut writer, t)?;
            writeln!(writer)?;
        }
        writer.flush()?;
        log::info!("wrote {} trials to {path}", output.trials.len());
    }

    if let Some(path) = &summary_path {
        let file = File::create(path).with_context(|| format!("creating {path}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &summary)?;
        writer.flush()?;
        log::info!("wrote summary to {path}");
    }

    if !quiet {
        let violations = analysis::verify_trials(&output.trials, params.horizon_months);
        if !violations.is_empty() {
            log::warn!("{} trial invariant violation(s)", violations.len());
        }

        report::print_parameters(params);
        report::print_invariants(&violations, output.trials.len());
        report::print_summary(&summary, params.horizon_months);
        report::print_event_tally(&output.event_tally);
        if let Some(dist) = analysis::final_cash_distribution(&output.trials) {
            report::print_distribution(&dist);
        }
        report::print_histogram(&output.trials);
        report::print_survival_curve(&output.trials, params.horizon_months);
        if let Some(first) = output.trials.first() {
            report::print_trajectory(first);
        }
    }

    Ok(())
}

/// Consume the value following the flag at `args[*i]`.
fn value<T>(args: &[String], i: &mut usize) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let flag = &args[*i];
    *i += 1;
    let raw = args.get(*i).ok_or_else(|| anyhow!("{flag} requires a value"))?;
    raw.parse().map_err(|e| anyhow!("{flag}: cannot parse {raw:?}: {e}"))
}

/// `GROWTH:AGGRESSIVENESS`, both percentages, e.g. `25:30`.
fn parse_competitor(spec: &str) -> Result<CompetitorProfile> {
    let Some((growth, aggressiveness)) = spec.split_once(':') else {
        bail!("--competitor expects GROWTH:AGGRESSIVENESS, got {spec:?}");
    };
    Ok(CompetitorProfile {
        growth_rate: growth.trim().parse().with_context(|| format!("competitor growth {growth:?}"))?,
        aggressiveness: aggressiveness
            .trim()
            .parse()
            .with_context(|| format!("competitor aggressiveness {aggressiveness:?}"))?,
    })
}
