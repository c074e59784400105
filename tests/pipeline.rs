use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use deconz_ingest::connection::{
    ConnectionConfig, ConnectionManager, EventSource, FrameStream,
};
use deconz_ingest::deconz::{FieldValue, Sensors, parse_sensors};
use deconz_ingest::directory::{CachingDirectory, SensorDirectory, SensorSource};
use deconz_ingest::event::EventDecoder;
use deconz_ingest::fill::{FillConfig, FillScheduler};
use deconz_ingest::pipeline::run_pipeline;
use deconz_ingest::sink::{Sink, TimeseriesRecord, WriterConfig, spawn_writer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct StaticSensors(String);

#[async_trait]
impl SensorSource for StaticSensors {
    async fn fetch_sensors(&self) -> anyhow::Result<Sensors> {
        parse_sensors(&self.0)
    }
}

fn sensors_body() -> String {
    let last_seen = Utc::now().format("%Y-%m-%dT%H:%MZ");
    format!(
        r#"{{
            "1": {{
                "type": "ZHATemperature",
                "name": "Living room",
                "lastseen": "{last_seen}",
                "config": {{"battery": 91}},
                "state": {{"temperature": 2062}}
            }},
            "5": {{
                "type": "ZHAFire",
                "name": "Smoke detector",
                "state": {{"fire": false, "lowbattery": false, "tampered": false}}
            }}
        }}"#
    )
}

/// Serves one connection with the given frames, then keeps it open.
struct OneShotSource {
    frames: Mutex<Option<Vec<Vec<u8>>>>,
}

struct HeldOpen {
    frames: std::vec::IntoIter<Vec<u8>>,
}

#[async_trait]
impl EventSource for OneShotSource {
    async fn connect(&self) -> anyhow::Result<Box<dyn FrameStream>> {
        let frames = self.frames.lock().unwrap().take();
        match frames {
            Some(frames) => Ok(Box::new(HeldOpen {
                frames: frames.into_iter(),
            })),
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl FrameStream for HeldOpen {
    async fn next_frame(&mut self) -> Option<anyhow::Result<Vec<u8>>> {
        match self.frames.next() {
            Some(frame) => Some(Ok(frame)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

struct ChannelSink(mpsc::UnboundedSender<TimeseriesRecord>);

#[async_trait]
impl Sink for ChannelSink {
    async fn write_batch(&self, records: &[TimeseriesRecord]) -> anyhow::Result<()> {
        for record in records {
            self.0.send(record.clone())?;
        }
        Ok(())
    }
}

async fn directory() -> Arc<dyn SensorDirectory> {
    Arc::new(
        CachingDirectory::new(StaticSensors(sensors_body()), Duration::from_secs(3600))
            .await
            .unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_websocket_events_reach_the_sink() {
    let directory = directory().await;

    let frames = [
        r#"{"t": "event", "e": "changed", "r": "lights", "id": "3", "state": {"on": true}}"#,
        r#"{"t": "event", "e": "changed", "r": "sensors", "id": "1", "state": {"temperature": 2150}}"#,
        r#"{"t": "event", "e": "changed", "r": "sensors", "id": "77", "state": {"temperature": 1}}"#,
        r#"{"t": "event", "e": "changed", "r": "sensors", "id": "5", "state": {"fire": true}}"#,
    ]
    .map(|frame| frame.as_bytes().to_vec());
    let source = OneShotSource {
        frames: Mutex::new(Some(frames.to_vec())),
    };

    let (written, mut sink_rx) = mpsc::unbounded_channel();
    let writer_config = WriterConfig {
        batch_size: 1,
        ..WriterConfig::default()
    };
    let (records, writer) = spawn_writer(Arc::new(ChannelSink(written)), writer_config);

    let (manager, events) = ConnectionManager::start(
        Arc::new(source),
        EventDecoder::new(Arc::clone(&directory)),
        ConnectionConfig::default(),
    );
    let fill = FillScheduler::new(directory, FillConfig::default());

    let token = CancellationToken::new();
    let pipeline = tokio::spawn(run_pipeline(events, fill, records, token.clone()));

    let temperature = sink_rx.recv().await.unwrap();
    assert_eq!(temperature.measurement, "deflux_ZHATemperature");
    assert_eq!(temperature.tags["name"], "Living room");
    assert_eq!(temperature.tags["source"], "websocket");
    assert_eq!(temperature.fields["temperature"], FieldValue::Float(21.5));
    assert_eq!(temperature.fields["battery"], FieldValue::Int(91));

    let fire = sink_rx.recv().await.unwrap();
    assert_eq!(fire.measurement, "deflux_ZHAFire");
    assert_eq!(fire.tags["id"], "5");
    assert_eq!(fire.fields["fire"], FieldValue::Bool(true));
    assert_eq!(fire.fields["battery"], FieldValue::Int(0));

    token.cancel();
    pipeline.await.unwrap();
    assert!(manager.shutdown(Duration::from_secs(1)).await);
    writer.await.unwrap();

    assert!(sink_rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fill_repeats_rest_state() {
    let directory = directory().await;

    let source = OneShotSource {
        frames: Mutex::new(Some(Vec::new())),
    };

    let (written, mut sink_rx) = mpsc::unbounded_channel();
    let writer_config = WriterConfig {
        batch_size: 1,
        ..WriterConfig::default()
    };
    let (records, writer) = spawn_writer(Arc::new(ChannelSink(written)), writer_config);

    let (manager, events) = ConnectionManager::start(
        Arc::new(source),
        EventDecoder::new(Arc::clone(&directory)),
        ConnectionConfig::default(),
    );
    let fill_config = FillConfig {
        enabled: true,
        initial_fill: true,
        fill_interval: TimeDelta::zero(),
        ..FillConfig::default()
    };
    let fill = FillScheduler::new(directory, fill_config);

    let token = CancellationToken::new();
    let pipeline = tokio::spawn(run_pipeline(events, fill, records, token.clone()));

    // the smoke detector was never seen, so only the thermometer is filled
    let initial = sink_rx.recv().await.unwrap();
    assert_eq!(initial.sensor_id, 1);
    assert_eq!(initial.tags["source"], "rest");
    assert_eq!(initial.fields["temperature"], FieldValue::Float(20.62));

    let refill = sink_rx.recv().await.unwrap();
    assert_eq!(refill.sensor_id, 1);
    assert_eq!(refill.tags["source"], "rest");

    token.cancel();
    pipeline.await.unwrap();
    assert!(manager.shutdown(Duration::from_secs(1)).await);
    writer.await.unwrap();
}
