use crate::config::CompetitorProfile;

/// Advance every competitor by one month and return the factor by which they
/// jointly scale our effective growth this month.
///
/// Competitors are processed in list order. Each one compounds its own client
/// base first, then takes its bite using the market total as it stands at that
/// point in the loop: earlier competitors contribute their already-grown counts,
/// later ones their previous-month counts. The result therefore depends on list
/// order.
pub fn apply_competition(
    competitors: &[CompetitorProfile],
    competitor_clients: &mut [f64],
    own_clients: f64,
) -> f64 {
    debug_assert_eq!(competitors.len(), competitor_clients.len());

    let mut factor = 1.0;
    for (i, competitor) in competitors.iter().enumerate() {
        competitor_clients[i] *= 1.0 + competitor.growth_rate / 100.0;
        let market = own_clients + competitor_clients.iter().sum::<f64>();
        let loss = market_share_loss(competitor, competitor_clients[i], market);
        factor *= (1.0 - loss).max(0.0);
    }
    factor
}

/// Fraction of our acquisition a competitor takes, given its client count and
/// the current market total.
pub fn market_share_loss(competitor: &CompetitorProfile, clients: f64, market: f64) -> f64 {
    // An empty market has no share to take.
    if market == 0.0 {
        return 0.0;
    }
    competitor.aggressiveness / 100.0 * (clients / market)
}
