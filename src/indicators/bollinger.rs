use serde::Serialize;

use super::moving_average;

/// Bollinger Bands: moving average plus/minus a multiple of the standard deviation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BollingerBands {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Calculate Bollinger Bands over the last `period` prices
///
/// Uses the population standard deviation. All three bands are `0.0`
/// when there are fewer than `period` samples.
pub fn bollinger_bands(prices: &[f64], period: usize, std_dev_multiplier: f64) -> BollingerBands {
    if period == 0 || prices.len() < period {
        return BollingerBands::default();
    }

    let middle = moving_average(prices, period);

    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let sd = variance.sqrt();

    BollingerBands {
        middle,
        upper: middle + sd * std_dev_multiplier,
        lower: middle - sd * std_dev_multiplier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_known_values() {
        // mean 5, population sd 2
        let prices = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger_bands(&prices, 8, 2.0);

        assert_eq!(bands.middle, 5.0);
        assert!((bands.upper - 9.0).abs() < 1e-9);
        assert!((bands.lower - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bands_width_matches_std_dev() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let period = 20;
        let k = 2.5;

        let bands = bollinger_bands(&prices, period, k);
        let window = &prices[prices.len() - period..];
        let mean = window.iter().sum::<f64>() / period as f64;
        let sd = (window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64).sqrt();

        assert!(((bands.upper - bands.lower) - 2.0 * sd * k).abs() < 1e-9);
        assert!((bands.middle - mean).abs() < 1e-9);
    }

    #[test]
    fn test_flat_prices_collapse_bands() {
        let bands = bollinger_bands(&[50.0; 20], 20, 2.0);
        assert_eq!(bands.middle, 50.0);
        assert_eq!(bands.upper, 50.0);
        assert_eq!(bands.lower, 50.0);
    }

    #[test]
    fn test_insufficient_data() {
        let bands = bollinger_bands(&[1.0, 2.0, 3.0], 20, 2.0);
        assert_eq!(bands, BollingerBands::default());
    }
}
