//! Market data access port trait.

use crate::domain::error::IctError;
use crate::domain::series::MarketSeries;
use crate::domain::timeframe::Timeframe;

/// Source of validated bar series. Implementations return a fully built
/// [`MarketSeries`]; an empty result is `IctError::NoData`.
pub trait MarketDataPort {
    fn fetch_series(&self, asset: &str, timeframe: Timeframe) -> Result<MarketSeries, IctError>;

    fn list_assets(&self) -> Result<Vec<String>, IctError>;
}
