use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::sink::{Sink, TimeseriesRecord};

#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Records buffered before a write is forced.
    pub batch_size: usize,

    /// Longest a buffered record waits before being written.
    pub flush_interval: Duration,

    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            channel_capacity: 1024,
        }
    }
}

/// Spawns the task that owns the sink.
///
/// The task drains and flushes whatever is buffered once every sender has
/// been dropped, then exits.
pub fn spawn_writer(
    sink: Arc<dyn Sink>,
    config: WriterConfig,
) -> (mpsc::Sender<TimeseriesRecord>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = tokio::spawn(run_writer(sink, config, rx));

    (tx, handle)
}

async fn run_writer(
    sink: Arc<dyn Sink>,
    config: WriterConfig,
    mut rx: mpsc::Receiver<TimeseriesRecord>,
) {
    let batch_size = config.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);

    let mut ticker = tokio::time::interval(config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            record = rx.recv() => {
                let Some(record) = record else {
                    break;
                };

                batch.push(record);
                if batch.len() >= batch_size {
                    flush(sink.as_ref(), &mut batch).await;
                }
            }
            _ = ticker.tick() => flush(sink.as_ref(), &mut batch).await,
        }
    }

    flush(sink.as_ref(), &mut batch).await;
    debug!("sink writer finished");
}

async fn flush(sink: &dyn Sink, batch: &mut Vec<TimeseriesRecord>) {
    if batch.is_empty() {
        return;
    }

    let count = batch.len();
    match sink.write_batch(batch).await {
        Ok(()) => debug!(count, "wrote records"),
        Err(err) => error!(count, "failed to write records: {err:#}"),
    }

    batch.clear();
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::deconz::{Fields, SensorId};

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<SensorId>>>,
        failures: Mutex<usize>,
    }

    impl RecordingSink {
        fn failing(times: usize) -> Self {
            Self {
                failures: Mutex::new(times),
                ..Self::default()
            }
        }

        fn batches(&self) -> Vec<Vec<SensorId>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn write_batch(&self, records: &[TimeseriesRecord]) -> anyhow::Result<()> {
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(anyhow!("database unavailable"));
                }
            }

            self.batches
                .lock()
                .unwrap()
                .push(records.iter().map(|r| r.sensor_id).collect());
            Ok(())
        }
    }

    fn record(sensor_id: SensorId) -> TimeseriesRecord {
        TimeseriesRecord {
            sensor_id,
            measurement: "deflux_ZHATemperature".to_string(),
            tags: Default::default(),
            fields: Fields::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushes_full_batches() {
        let sink = Arc::new(RecordingSink::default());
        let config = WriterConfig {
            batch_size: 2,
            flush_interval: Duration::from_secs(3600),
            ..WriterConfig::default()
        };
        let (tx, handle) = spawn_writer(sink.clone(), config);

        for id in 1..=5 {
            tx.send(record(id)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sink.batches(), [vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushes_on_interval() {
        let sink = Arc::new(RecordingSink::default());
        let config = WriterConfig {
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            ..WriterConfig::default()
        };
        let (tx, handle) = spawn_writer(sink.clone(), config);

        tx.send(record(7)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(sink.batches(), [vec![7]]);

        drop(tx);
        handle.await.unwrap();
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_errors_do_not_stop_writer() {
        let sink = Arc::new(RecordingSink::failing(1));
        let config = WriterConfig {
            batch_size: 1,
            ..WriterConfig::default()
        };
        let (tx, handle) = spawn_writer(sink.clone(), config);

        tx.send(record(1)).await.unwrap();
        tx.send(record(2)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sink.batches(), [vec![2]]);
    }
}
