pub mod engine;
pub mod market_data;
pub mod persist;
pub mod settings;
pub mod telemetry;
pub mod watchlist;
