use crate::{Error, Result};

/// Number of prices kept by default
pub const WINDOW_CAPACITY: usize = 100;

/// Rolling window of recent prices, newest last
///
/// Not synchronized by itself; the controller owns it behind its lock.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: Vec<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    /// Create a window holding at most `capacity` prices (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prices: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a price
    ///
    /// Rejects non-positive and non-finite prices. If the window is full,
    /// removes the oldest price.
    pub fn append(&mut self, price: f64) -> Result<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::InvalidPrice(price));
        }

        self.prices.push(price);

        if self.prices.len() > self.capacity {
            let excess = self.prices.len() - self.capacity;
            self.prices.drain(..excess);
        }

        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.prices
    }

    pub fn latest(&self) -> Option<f64> {
        self.prices.last().copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PriceWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_window() {
        let window = PriceWindow::new();
        assert_eq!(window.capacity(), 100);
        assert!(window.is_empty());
        assert_eq!(window.latest(), None);
    }

    #[test]
    fn test_append() {
        let mut window = PriceWindow::new();
        window.append(100.0).unwrap();
        window.append(101.0).unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window.as_slice(), &[100.0, 101.0]);
        assert_eq!(window.latest(), Some(101.0));
    }

    #[test]
    fn test_rejects_invalid_prices() {
        let mut window = PriceWindow::new();

        for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = window.append(price).unwrap_err();
            assert!(matches!(err, Error::InvalidPrice(_)));
        }
        assert!(window.is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let mut window = PriceWindow::new();

        for i in 0..150 {
            window.append(100.0 + i as f64).unwrap();
            assert!(window.len() <= 100);
        }

        // Oldest 50 evicted: 150..249 remain
        assert_eq!(window.len(), 100);
        assert_eq!(window.as_slice()[0], 150.0);
        assert_eq!(window.latest(), Some(249.0));
    }

    #[test]
    fn test_small_capacity_fifo() {
        let mut window = PriceWindow::with_capacity(3);
        for price in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.append(price).unwrap();
        }
        assert_eq!(window.as_slice(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut window = PriceWindow::with_capacity(0);
        window.append(1.0).unwrap();
        window.append(2.0).unwrap();
        assert_eq!(window.as_slice(), &[2.0]);
    }
}
