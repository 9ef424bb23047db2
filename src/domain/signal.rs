//! Trend tests over a window of recent closes.

use rust_decimal::Decimal;

/// Least-squares slope of `closes` against their index (0, 1, 2, ...).
///
/// `None` when fewer than two points are given.
pub fn regression_slope(closes: &[Decimal]) -> Option<Decimal> {
    if closes.len() < 2 {
        return None;
    }
    let n = Decimal::from(closes.len());
    let mean_x = closes
        .iter()
        .enumerate()
        .map(|(i, _)| Decimal::from(i))
        .sum::<Decimal>()
        / n;
    let mean_y = closes.iter().copied().sum::<Decimal>() / n;

    let mut numerator = Decimal::ZERO;
    let mut denominator = Decimal::ZERO;
    for (i, close) in closes.iter().enumerate() {
        let dx = Decimal::from(i) - mean_x;
        numerator += dx * (*close - mean_y);
        denominator += dx * dx;
    }
    numerator.checked_div(denominator)
}

/// Every close is strictly greater than the one before it.
pub fn all_sequential_increases(closes: &[Decimal]) -> bool {
    closes.windows(2).all(|w| w[1] > w[0])
}
