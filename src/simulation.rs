use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::SimulationParameters;
use crate::error::InvalidParameter;
use crate::events::{EventKind, EventTally, MonthRecord, TrialResult};
use crate::market;
use crate::types::{INITIAL_CLIENTS, Month, REVENUE_PER_CLIENT, TrialId};

/// Growth multiplier applied in a month hit by a market shock.
const SHOCK_GROWTH_FACTOR: f64 = 0.5;

/// Everything one run-set produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutput {
    /// One result per trial, ordered by trial index.
    pub trials: Vec<TrialResult>,
    pub event_tally: EventTally,
}

/// Monte Carlo driver over validated parameters.
pub struct Simulation {
    params: SimulationParameters,
}

impl Simulation {
    /// Validate `params` and build a simulation over them.
    pub fn new(params: SimulationParameters) -> Result<Self, InvalidParameter> {
        params.validate()?;
        Ok(Simulation { params })
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Run every trial on the rayon pool and merge the per-trial tallies.
    pub fn run(&self) -> SimulationOutput {
        let (trials, tallies): (Vec<TrialResult>, Vec<EventTally>) = (0..self.params.num_trials)
            .into_par_iter()
            .map(|i| self.run_trial(TrialId(u64::from(i))))
            .unzip();
        merge(trials, &tallies)
    }

    /// Same as [`Simulation::run`] on the calling thread. Produces identical output.
    pub fn run_serial(&self) -> SimulationOutput {
        let (trials, tallies): (Vec<TrialResult>, Vec<EventTally>) = (0..self.params.num_trials)
            .map(|i| self.run_trial(TrialId(u64::from(i))))
            .unzip();
        merge(trials, &tallies)
    }

    /// Simulate one trial on its own random stream.
    pub fn run_trial(&self, trial: TrialId) -> (TrialResult, EventTally) {
        let mut rng = trial_rng(self.params.seed, trial);
        run_trial(&self.params, trial, &mut rng)
    }
}

/// Validate and run in one call.
pub fn simulate(params: SimulationParameters) -> Result<SimulationOutput, InvalidParameter> {
    Ok(Simulation::new(params)?.run())
}

/// Independent generator for one trial: shared seed, stream selected by trial index.
pub fn trial_rng(seed: u64, trial: TrialId) -> ChaCha20Rng {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    rng.set_stream(trial.0);
    rng
}

fn merge(trials: Vec<TrialResult>, tallies: &[EventTally]) -> SimulationOutput {
    let mut event_tally = EventTally::new();
    for t in tallies {
        event_tally.merge(t);
    }
    SimulationOutput { trials, event_tally }
}

/// Mutable state of a single trial.
#[derive(Debug, Clone)]
struct TrialState {
    cash: f64,
    clients: f64,
    growth_rate: f64,
    retention: f64,
    competitor_clients: Vec<f64>,
}

impl TrialState {
    fn new(params: &SimulationParameters) -> Self {
        TrialState {
            cash: params.initial_cash,
            clients: INITIAL_CLIENTS,
            growth_rate: params.growth_rate,
            retention: params.retention_rate,
            competitor_clients: vec![INITIAL_CLIENTS; params.competitors.len()],
        }
    }

    /// Advance one month and return its record.
    fn step(
        &mut self,
        params: &SimulationParameters,
        month: Month,
        rng: &mut impl Rng,
        tally: &mut EventTally,
    ) -> MonthRecord {
        let shock = rng.random::<f64>() < params.shock_probability / 100.0;
        let mut effective_growth =
            self.growth_rate / 100.0 * if shock { SHOCK_GROWTH_FACTOR } else { 1.0 };

        if params.wargame() {
            effective_growth *= market::apply_competition(
                &params.competitors,
                &mut self.competitor_clients,
                self.clients,
            );
        }

        let event = if rng.random::<f64>() < params.event_probability / 100.0 {
            let kind = EventKind::ALL[rng.random_range(0..EventKind::ALL.len())];
            kind.apply(&mut self.cash, &mut self.growth_rate, &mut self.retention);
            tally.record(kind);
            Some(kind)
        } else {
            None
        };

        // Churn applies to the pre-growth base; acquisition is added on top.
        let new_clients = self.clients * effective_growth;
        self.clients = self.clients * (self.retention / 100.0) + new_clients;

        self.cash += self.clients * REVENUE_PER_CLIENT - params.burn_rate;

        MonthRecord {
            month,
            cash: self.cash,
            clients: self.clients,
            shock,
            event,
            competitor_clients: self.competitor_clients.clone(),
        }
    }
}

/// Simulate one trial until the horizon or the first month that ends in deficit.
pub fn run_trial(
    params: &SimulationParameters,
    trial: TrialId,
    rng: &mut impl Rng,
) -> (TrialResult, EventTally) {
    let mut state = TrialState::new(params);
    let mut tally = EventTally::new();
    let mut history = Vec::with_capacity(params.horizon_months as usize);

    let mut month = Month::FIRST;
    while month.0 <= params.horizon_months {
        let record = state.step(params, month, rng, &mut tally);
        history.push(record);
        if state.cash < 0.0 {
            break;
        }
        month = month.next();
    }

    let result = TrialResult {
        trial,
        success: state.cash > 0.0,
        final_cash: state.cash,
        duration: history.len() as u32,
        history,
    };
    (result, tally)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::CompetitorProfile;

    /// No shocks, no events, no competitors.
    fn quiet_params(horizon_months: u32) -> SimulationParameters {
        SimulationParameters {
            seed: 7,
            initial_cash: 20_000.0,
            burn_rate: 5_000.0,
            growth_rate: 20.0,
            retention_rate: 80.0,
            shock_probability: 0.0,
            event_probability: 0.0,
            horizon_months,
            num_trials: 4,
            competitors: vec![],
        }
    }

    fn single_trial(params: &SimulationParameters) -> TrialResult {
        Simulation::new(params.clone()).unwrap().run_trial(TrialId(0)).0
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    // ── Deterministic trajectories ────────────────────────────────────────────

    #[test]
    fn quiet_three_month_trace_matches_hand_computation() {
        let trial = single_trial(&quiet_params(3));
        let trace: Vec<(u32, f64, f64)> =
            trial.history.iter().map(|r| (r.month.0, r.clients, r.cash)).collect();

        let expected = [(1, 100.0, 16_000.0), (2, 100.0, 12_000.0), (3, 100.0, 8_000.0)];
        assert_eq!(trace.len(), expected.len());
        for ((m, clients, cash), (em, ec, ecash)) in trace.iter().zip(expected) {
            assert_eq!(*m, em);
            assert_close(*clients, ec);
            assert_close(*cash, ecash);
        }
        assert!(trial.success);
        assert_eq!(trial.duration, 3);
        assert_close(trial.final_cash, 8_000.0);
    }

    #[test]
    fn quiet_trajectory_follows_closed_form_recurrence() {
        let params = SimulationParameters {
            growth_rate: 35.0,
            retention_rate: 90.0,
            burn_rate: 1_000.0,
            initial_cash: 5_000.0,
            ..quiet_params(10)
        };
        let trial = single_trial(&params);

        let mut clients = INITIAL_CLIENTS;
        let mut cash = params.initial_cash;
        for record in &trial.history {
            clients *= params.retention_rate / 100.0 + params.growth_rate / 100.0;
            cash += clients * REVENUE_PER_CLIENT - params.burn_rate;
            assert!((record.clients - clients).abs() < 1e-6 * clients.abs().max(1.0));
            assert!((record.cash - cash).abs() < 1e-6 * cash.abs().max(1.0));
            assert!(!record.shock);
            assert!(record.event.is_none());
            assert!(record.competitor_clients.is_empty());
        }
        assert_eq!(trial.duration, 10);
    }

    #[test]
    fn full_shock_halves_growth_every_month() {
        let params = SimulationParameters { shock_probability: 100.0, ..quiet_params(2) };
        let trial = single_trial(&params);
        assert!(trial.history.iter().all(|r| r.shock));
        // 100 * 0.8 + 100 * 0.1 = 90, then 81
        assert_close(trial.history[0].clients, 90.0);
        assert_close(trial.history[1].clients, 81.0);
    }

    #[test]
    fn single_competitor_erodes_growth() {
        let params = SimulationParameters {
            competitors: vec![CompetitorProfile { growth_rate: 0.0, aggressiveness: 100.0 }],
            ..quiet_params(1)
        };
        let trial = single_trial(&params);
        let record = &trial.history[0];
        // loss = 100/200 → growth 20 % * 0.5
        assert_close(record.clients, 90.0);
        assert_eq!(record.competitor_clients, vec![100.0]);
    }

    #[test]
    fn competitor_snapshots_track_compounding() {
        let params = SimulationParameters {
            competitors: vec![
                CompetitorProfile { growth_rate: 25.0, aggressiveness: 30.0 },
                CompetitorProfile { growth_rate: -10.0, aggressiveness: 30.0 },
            ],
            ..quiet_params(3)
        };
        let trial = single_trial(&params);
        for (i, record) in trial.history.iter().enumerate() {
            let n = (i + 1) as i32;
            assert_close(record.competitor_clients[0], 100.0 * 1.25_f64.powi(n));
            assert_close(record.competitor_clients[1], 100.0 * 0.9_f64.powi(n));
        }
    }

    #[test]
    fn competitor_order_changes_trajectory() {
        let fast = CompetitorProfile { growth_rate: 100.0, aggressiveness: 50.0 };
        let flat = CompetitorProfile { growth_rate: 0.0, aggressiveness: 50.0 };
        let forward =
            single_trial(&SimulationParameters { competitors: vec![fast, flat], ..quiet_params(1) });
        let reversed =
            single_trial(&SimulationParameters { competitors: vec![flat, fast], ..quiet_params(1) });
        // 80 + 20 * 0.65625 vs 80 + 20 * 0.625
        assert_close(forward.history[0].clients, 93.125);
        assert_close(reversed.history[0].clients, 92.5);
    }

    // ── Early stop ────────────────────────────────────────────────────────────

    #[test]
    fn trial_stops_in_first_deficit_month() {
        let params = SimulationParameters {
            initial_cash: 1_000.0,
            growth_rate: 0.0,
            retention_rate: 0.0,
            ..quiet_params(12)
        };
        let trial = single_trial(&params);
        assert_eq!(trial.duration, 1);
        assert_eq!(trial.history.len(), 1);
        assert_close(trial.final_cash, -4_000.0);
        assert!(!trial.success);
    }

    #[test]
    fn zero_cash_is_failure_but_does_not_stop() {
        // 100 clients kept, revenue 1_000, burn 5_000 from 4_000 → exactly 0.
        let params = SimulationParameters {
            initial_cash: 4_000.0,
            growth_rate: 0.0,
            retention_rate: 100.0,
            ..quiet_params(1)
        };
        let trial = single_trial(&params);
        assert_eq!(trial.duration, 1);
        assert_eq!(trial.final_cash, 0.0);
        assert!(!trial.success);

        let longer = single_trial(&SimulationParameters { horizon_months: 2, ..params });
        assert_eq!(longer.duration, 2, "cash == 0 is not a deficit");
    }

    #[test]
    fn clients_are_not_clamped_at_zero() {
        let params = SimulationParameters {
            initial_cash: 1_000_000.0,
            growth_rate: -50.0,
            retention_rate: 0.0,
            ..quiet_params(1)
        };
        let trial = single_trial(&params);
        assert_close(trial.history[0].clients, -50.0);
    }

    // ── Strategic events ──────────────────────────────────────────────────────

    #[test]
    fn certain_events_fire_every_month_and_are_tallied() {
        let params = SimulationParameters {
            event_probability: 100.0,
            num_trials: 50,
            initial_cash: 1_000_000.0,
            ..quiet_params(6)
        };
        let out = Simulation::new(params).unwrap().run();
        let months: u64 = out.trials.iter().map(|t| t.duration as u64).sum();
        assert_eq!(out.event_tally.total(), months);
        assert!(out.trials.iter().flat_map(|t| &t.history).all(|r| r.event.is_some()));
        assert_eq!(out.event_tally, EventTally::from_trials(&out.trials));
        for kind in EventKind::ALL {
            assert!(out.event_tally.get(kind) > 0, "{kind} never drawn in 300 events");
        }
    }

    #[test]
    fn funding_lands_before_cash_update() {
        // With every month eventful, a deficit month can only be observed after
        // the event effect; check the recorded cash reflects the injection.
        let params = SimulationParameters {
            event_probability: 100.0,
            num_trials: 200,
            growth_rate: 0.0,
            retention_rate: 100.0,
            initial_cash: 10_000.0,
            ..quiet_params(1)
        };
        let out = Simulation::new(params).unwrap().run();
        for trial in &out.trials {
            let record = &trial.history[0];
            let expected = match record.event {
                Some(EventKind::Funding) => 10_000.0 + 20_000.0 + 1_000.0 - 5_000.0,
                Some(EventKind::CriticalBug) => 10_000.0 + 900.0 - 5_000.0,
                _ => 10_000.0 + 1_000.0 - 5_000.0,
            };
            assert_close(record.cash, expected);
        }
    }

    #[test]
    fn event_effects_persist_and_growth_changes_lag_one_month() {
        let params = SimulationParameters {
            event_probability: 100.0,
            num_trials: 200,
            initial_cash: 1_000_000.0,
            growth_rate: 20.0,
            retention_rate: 80.0,
            ..quiet_params(3)
        };
        let out = Simulation::new(params.clone()).unwrap().run();

        for trial in &out.trials {
            assert_eq!(trial.duration, 3);

            // Replay from the recorded events: growth used in month m is the rate
            // left by events of months < m, retention includes this month's event.
            let (mut growth, mut retention) = (params.growth_rate, params.retention_rate);
            let (mut clients, mut cash) = (INITIAL_CLIENTS, params.initial_cash);
            for record in &trial.history {
                let effective_growth = growth / 100.0;
                match record.event {
                    Some(EventKind::Funding) => cash += 20_000.0,
                    Some(EventKind::Partnership) => growth *= 1.2,
                    Some(EventKind::CriticalBug) => retention *= 0.9,
                    Some(EventKind::ReputationCrisis) => growth *= 0.7,
                    None => panic!("month {} had no event", record.month.0),
                }
                clients = clients * retention / 100.0 + clients * effective_growth;
                cash += clients * REVENUE_PER_CLIENT - params.burn_rate;
                assert_close(record.clients, clients);
                assert_close(record.cash, cash);
            }

            // A funding round in month 2 leaves rates alone, isolating the month-1 event.
            let (first, second) = (&trial.history[0], &trial.history[1]);
            if second.event == Some(EventKind::Funding) {
                let expected_month_two = match first.event {
                    Some(EventKind::Partnership) => first.clients * (0.8 + 0.24),
                    Some(EventKind::ReputationCrisis) => first.clients * (0.8 + 0.14),
                    Some(EventKind::CriticalBug) => first.clients * (0.72 + 0.2),
                    _ => first.clients,
                };
                assert_close(second.clients, expected_month_two);
            }
        }

        // Growth events wait a month; a critical bug bites at once.
        for trial in &out.trials {
            let first = &trial.history[0];
            let expected = match first.event {
                Some(EventKind::CriticalBug) => 92.0,
                _ => 100.0,
            };
            assert_close(first.clients, expected);
        }

        for kind in EventKind::ALL {
            assert!(
                out.trials.iter().any(|t| t.history[0].event == Some(kind)),
                "{kind} never drawn in month 1"
            );
        }
    }

    #[test]
    fn no_events_means_empty_tally() {
        let out = Simulation::new(quiet_params(12)).unwrap().run();
        assert_eq!(out.event_tally.total(), 0);
    }

    // ── Run-set contract ──────────────────────────────────────────────────────

    #[test]
    fn invalid_parameters_produce_no_trials() {
        let params = SimulationParameters { num_trials: 0, ..quiet_params(12) };
        assert!(simulate(params).is_err());
        let params = SimulationParameters { retention_rate: 150.0, ..quiet_params(12) };
        let err = simulate(params).unwrap_err();
        assert_eq!(err.name, "retention_rate");
    }

    #[test]
    fn trials_are_ordered_by_index() {
        let out = simulate(SimulationParameters::canonical()).unwrap();
        assert_eq!(out.trials.len(), 1_000);
        for (i, t) in out.trials.iter().enumerate() {
            assert_eq!(t.trial, TrialId(i as u64));
        }
    }

    #[test]
    fn same_seed_produces_identical_output() {
        let params = SimulationParameters {
            competitors: vec![CompetitorProfile { growth_rate: 25.0, aggressiveness: 30.0 }],
            ..SimulationParameters::canonical()
        };
        let a = simulate(params.clone()).unwrap();
        let b = simulate(params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_diverge() {
        let a = simulate(SimulationParameters { seed: 1, ..SimulationParameters::canonical() });
        let b = simulate(SimulationParameters { seed: 2, ..SimulationParameters::canonical() });
        assert_ne!(a.unwrap().trials, b.unwrap().trials);
    }

    #[test]
    fn parallel_and_serial_runs_agree() {
        let sim = Simulation::new(SimulationParameters::canonical()).unwrap();
        assert_eq!(sim.run(), sim.run_serial());
    }

    #[test]
    fn trials_use_independent_streams() {
        let sim = Simulation::new(SimulationParameters::canonical()).unwrap();
        let out = sim.run();
        let distinct = out
            .trials
            .windows(2)
            .filter(|w| w[0].history != w[1].history)
            .count();
        assert!(distinct > 0, "adjacent trials must not replay the same stream");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_trial_structure_holds(
            seed in any::<u64>(),
            initial_cash in 1_000u32..100_000,
            burn_rate in 500u32..30_000,
            growth_rate in -50i32..300,
            retention_rate in 0u32..=100,
            shock_probability in 0u32..=100,
            event_probability in 0u32..=100,
            horizon_months in 1u32..36,
            num_trials in 1u32..40,
            competitors in prop::collection::vec((-20i32..300, 0u32..=100), 0..4),
        ) {
            let params = SimulationParameters {
                seed,
                initial_cash: initial_cash as f64,
                burn_rate: burn_rate as f64,
                growth_rate: growth_rate as f64,
                retention_rate: retention_rate as f64,
                shock_probability: shock_probability as f64,
                event_probability: event_probability as f64,
                horizon_months,
                num_trials,
                competitors: competitors
                    .into_iter()
                    .map(|(g, a)| CompetitorProfile { growth_rate: g as f64, aggressiveness: a as f64 })
                    .collect(),
            };
            let n_competitors = params.competitors.len();
            let out = simulate(params).unwrap();

            prop_assert_eq!(out.trials.len(), num_trials as usize);
            prop_assert!(out.event_tally.total() <= num_trials as u64 * horizon_months as u64);
            prop_assert_eq!(&out.event_tally, &EventTally::from_trials(&out.trials));

            for t in &out.trials {
                prop_assert_eq!(t.history.len(), t.duration as usize);
                prop_assert!(t.duration >= 1 && t.duration <= horizon_months);
                prop_assert_eq!(t.success, t.final_cash > 0.0);
                let last = t.history.last().unwrap();
                prop_assert_eq!(last.cash, t.final_cash);
                if t.duration < horizon_months {
                    prop_assert!(last.cash < 0.0);
                }
                for (i, r) in t.history.iter().enumerate() {
                    prop_assert_eq!(r.month, Month(i as u32 + 1));
                    prop_assert_eq!(r.competitor_clients.len(), n_competitors);
                }
            }
        }
    }
}
