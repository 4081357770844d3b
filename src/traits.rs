use crate::error::Result;
use crate::types::MeasurementResult;
use async_trait::async_trait;

/// Measure: anything that can produce one speed measurement.
///
/// The cache only talks to this trait, so the real CLI runner and test
/// fakes are interchangeable.
#[async_trait]
pub trait Measure: Sync + Send {
    /// Run a single measurement. Implementations must not retry internally.
    async fn measure(&self) -> Result<MeasurementResult>;
}
