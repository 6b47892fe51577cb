use runway::config::{CompetitorProfile, SimulationParameters};
use runway::simulation::Simulation;

pub struct Scenario {
    pub trials: u32,
    pub months: u32,
    pub competitors: usize,
}

pub const SMALL: Scenario = Scenario { trials: 100, months: 12, competitors: 0 };

pub const MEDIUM: Scenario = Scenario { trials: 1_000, months: 24, competitors: 2 };

pub const LARGE: Scenario = Scenario { trials: 5_000, months: 36, competitors: 3 };

/// Competitors with staggered growth so every erosion term is non-trivial.
pub fn make_competitors(n: usize) -> Vec<CompetitorProfile> {
    (0..n)
        .map(|i| CompetitorProfile { growth_rate: 15.0 + 10.0 * i as f64, aggressiveness: 30.0 })
        .collect()
}

/// Canonical economics with a large cash buffer so trials rarely stop early
/// and every scenario runs close to its full horizon.
pub fn build_params(scenario: &Scenario, seed: u64) -> SimulationParameters {
    SimulationParameters {
        seed,
        initial_cash: 1_000_000.0,
        horizon_months: scenario.months,
        num_trials: scenario.trials,
        competitors: make_competitors(scenario.competitors),
        ..SimulationParameters::canonical()
    }
}

pub fn build_simulation(scenario: &Scenario, seed: u64) -> Simulation {
    Simulation::new(build_params(scenario, seed)).expect("bench scenarios are valid")
}
