use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::EventStream;
use crate::fill::FillScheduler;
use crate::sink::TimeseriesRecord;

/// Drains the event stream into the sink writer and runs the fill scheduler
/// on its tick, until cancelled or either end of the pipeline goes away.
pub async fn run_pipeline(
    mut events: EventStream,
    mut fill: FillScheduler,
    records: mpsc::Sender<TimeseriesRecord>,
    token: CancellationToken,
) {
    for record in fill.initial_fill(Utc::now()) {
        if !forward(&records, &mut fill, record).await {
            return;
        }
    }

    let mut ticker = tokio::time::interval(fill.config().tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("pipeline cancelled");
                break;
            }
            event = events.next() => {
                let Some(event) = event else {
                    warn!("event stream ended");
                    break;
                };

                let Some(record) = TimeseriesRecord::from_event(&event) else {
                    debug!(resource = %event.resource, event_kind = %event.event_kind, "event carries no sensor state");
                    continue;
                };

                if !forward(&records, &mut fill, record).await {
                    break;
                }
            }
            _ = ticker.tick() => {
                for record in fill.tick(Utc::now()) {
                    if !forward(&records, &mut fill, record).await {
                        return;
                    }
                }
            }
        }
    }

    info!("pipeline stopped");
}

async fn forward(
    records: &mpsc::Sender<TimeseriesRecord>,
    fill: &mut FillScheduler,
    record: TimeseriesRecord,
) -> bool {
    debug!(
        measurement = %record.measurement,
        tags = ?record.tags,
        fields = ?record.fields,
        "writing record"
    );

    fill.record_write(record.sensor_id, record.timestamp);

    if records.send(record).await.is_err() {
        error!("sink writer stopped, dropping records");
        return false;
    }

    true
}
