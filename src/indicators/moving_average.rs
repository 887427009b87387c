/// Calculate Simple Moving Average (SMA) over the last `period` prices
///
/// Returns `0.0` when there are fewer than `period` samples (or `period` is 0).
/// Callers must read `0.0` as "not yet computable", never as a trend value.
pub fn moving_average(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return 0.0;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    sum / period as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        assert_eq!(moving_average(&prices, 5), 104.0);
    }

    #[test]
    fn test_sma_uses_latest_samples() {
        let prices = vec![1.0, 1.0, 1.0, 10.0, 20.0];
        assert_eq!(moving_average(&prices, 2), 15.0);
    }

    #[test]
    fn test_sma_insufficient_data() {
        for len in 0..5 {
            let prices = vec![100.0; len];
            assert_eq!(moving_average(&prices, 5), 0.0);
        }
    }

    #[test]
    fn test_sma_zero_period() {
        assert_eq!(moving_average(&[100.0, 101.0], 0), 0.0);
    }
}
