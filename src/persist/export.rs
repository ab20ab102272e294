use std::io::Write;

use crate::persist::types::{PersistError, PersistResult, TradeRecord};

/// Write trade history as CSV, one row per trade, with a header row.
pub fn write_trades_csv<W: Write>(trades: &[TradeRecord], writer: W) -> PersistResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for trade in trades {
        csv_writer
            .serialize(trade)
            .map_err(|e| PersistError::Serialization(e.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}
