//! Signal persistence port trait.

use crate::domain::entry::Entries;
use crate::domain::error::IctError;
use crate::domain::signal::SignalRecord;
use crate::domain::timeframe::Timeframe;

/// Durable store for signals, keyed by (asset, timeframe, system, timestamp).
/// Writing the same key twice replaces the earlier row, except that a stored
/// `result` or `risk_amount` survives a write that leaves it empty.
pub trait SignalSink {
    fn upsert_signal(&self, signal: &SignalRecord) -> Result<(), IctError>;

    /// Default implementation: one `upsert_signal` per candidate.
    fn upsert_entries(
        &self,
        asset: &str,
        timeframe: Timeframe,
        entries: &Entries,
    ) -> Result<usize, IctError> {
        for candidate in entries.values() {
            self.upsert_signal(&SignalRecord::from_candidate(asset, timeframe, candidate))?;
        }
        Ok(entries.len())
    }

    fn load_signals(&self, asset: Option<&str>) -> Result<Vec<SignalRecord>, IctError>;
}
