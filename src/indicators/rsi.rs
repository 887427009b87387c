/// Calculate Relative Strength Index (RSI)
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Sums gains and losses over the last `period` consecutive deltas.
/// Returns `0.0` with fewer than `period + 1` samples and `100.0` when
/// there are no losses in the window.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 0.0;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    let start = prices.len() - period;
    for i in start..prices.len() {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    if losses == 0.0 {
        return 100.0;
    }

    let rs = gains / losses;
    (100.0 - (100.0 / (1.0 + rs))).clamp(0.0, 100.0)
}
