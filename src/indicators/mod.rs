// Technical indicators module
// Pure functions over a price slice: MA, RSI, Bollinger Bands.
// Insufficient data yields 0.0 rather than an error.

pub mod bollinger;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{bollinger_bands, BollingerBands};
pub use moving_average::moving_average;
pub use rsi::rsi;
