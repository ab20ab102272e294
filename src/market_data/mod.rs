// Market data module entrypoint
pub mod adapters;   // venue-specific quote feeds (CoinGecko, Alpha Vantage, static rates)
pub mod normaliser; // converts wire strings/floats -> fixed-scale decimals
pub mod fallback;   // primary feed with a static fallback
pub mod router;     // polls a feed and publishes the latest quote
