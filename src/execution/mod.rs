// Price window and the periodic trading controller
pub mod controller;
pub mod price_window;

pub use controller::{
    ControllerStatus, CycleOutcome, SkipReason, TradingController, TradingTarget,
};
pub use price_window::{PriceWindow, WINDOW_CAPACITY};
