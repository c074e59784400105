use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::deconz::{Sensor, SensorId};
use crate::directory::SensorDirectory;
use crate::sink::{Source, TimeseriesRecord};

#[derive(Debug, Clone)]
pub struct FillConfig {
    pub enabled: bool,

    /// Write every recently seen sensor once at startup.
    pub initial_fill: bool,

    /// Age of the last write after which a sensor is filled from REST state.
    pub fill_interval: TimeDelta,

    /// Sensors not seen by the gateway for this long are assumed offline.
    pub last_seen_timeout: TimeDelta,

    pub tick: Duration,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_fill: true,
            fill_interval: TimeDelta::minutes(30),
            last_seen_timeout: TimeDelta::hours(2),
            tick: Duration::from_secs(60),
        }
    }
}

/// Repeats the last REST-known state of sensors whose push stream has gone
/// quiet, so the time series keeps a value per fill interval.
pub struct FillScheduler {
    directory: Arc<dyn SensorDirectory>,
    config: FillConfig,
    last_write: BTreeMap<SensorId, DateTime<Utc>>,
}

impl FillScheduler {
    pub fn new(directory: Arc<dyn SensorDirectory>, config: FillConfig) -> Self {
        Self {
            directory,
            config,
            last_write: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &FillConfig {
        &self.config
    }

    /// Notes that a record for `id` was written at `at`.
    pub fn record_write(&mut self, id: SensorId, at: DateTime<Utc>) {
        self.last_write.insert(id, at);
    }

    pub fn last_write(&self, id: SensorId) -> Option<DateTime<Utc>> {
        self.last_write.get(&id).copied()
    }

    /// Records for every known sensor seen within the last-seen timeout.
    pub fn initial_fill(&mut self, now: DateTime<Utc>) -> Vec<TimeseriesRecord> {
        if !self.config.enabled || !self.config.initial_fill {
            return Vec::new();
        }

        let sensors = self.directory.all();
        let mut records = Vec::new();

        for sensor in sensors.values() {
            if sensor.last_seen.is_none() {
                continue;
            }

            if let Some(record) = self.fill(sensor, now) {
                records.push(record);
            }
        }

        info!(count = records.len(), "initial fill");

        records
    }

    /// Records for sensors whose last write is older than the fill interval.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimeseriesRecord> {
        if !self.config.enabled {
            return Vec::new();
        }

        debug!(fill_interval = %self.config.fill_interval, "checking for stale sensors");

        let due: Vec<SensorId> = self
            .last_write
            .iter()
            .filter(|(_, last_write)| **last_write + self.config.fill_interval <= now)
            .map(|(id, _)| *id)
            .collect();

        let mut records = Vec::new();
        for id in due {
            let sensor = match self.directory.get(id) {
                Ok(sensor) => sensor,
                Err(err) => {
                    warn!(sensor_id = id, "could not retrieve sensor: {err}");
                    continue;
                }
            };

            if let Some(record) = self.fill(&sensor, now) {
                records.push(record);
            }
        }

        records
    }

    fn fill(&mut self, sensor: &Sensor, now: DateTime<Utc>) -> Option<TimeseriesRecord> {
        if !sensor.seen_within(self.config.last_seen_timeout, now) {
            match sensor.last_seen {
                Some(last_seen) => warn!(
                    sensor_id = sensor.id,
                    "sensor last seen {} ago, assuming it is offline",
                    now - last_seen
                ),
                None => warn!(sensor_id = sensor.id, "sensor never seen, assuming it is offline"),
            }
            return None;
        }

        let record = TimeseriesRecord::from_sensor(sensor, Source::Rest, now)?;
        self.record_write(sensor.id, now);

        Some(record)
    }
}
