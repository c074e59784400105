mod postgres;
mod record;
mod writer;

pub use postgres::*;
pub use record::*;
pub use writer::*;

use async_trait::async_trait;

/// Destination of time-series records.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    async fn write_batch(&self, records: &[TimeseriesRecord]) -> anyhow::Result<()>;
}
