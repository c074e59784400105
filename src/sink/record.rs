use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, indexmap};

use crate::deconz::{Fields, Sensor, SensorId, merge_battery};
use crate::event::SensorEvent;

pub const MEASUREMENT_PREFIX: &str = "deflux";

/// Path a record's state arrived by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Rest,
    Websocket,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Rest => "rest",
            Source::Websocket => "websocket",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Tags = IndexMap<&'static str, String>;

/// One point for the time-series store.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesRecord {
    pub sensor_id: SensorId,
    pub measurement: String,
    pub tags: Tags,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
}

impl TimeseriesRecord {
    /// Builds a record from a pushed event. Events without fields yield
    /// nothing.
    pub fn from_event(event: &SensorEvent) -> Option<Self> {
        let sensor = event.sensor.as_ref()?;
        if event.is_empty() {
            return None;
        }

        Some(Self::new(
            sensor,
            Source::Websocket,
            event.fields.clone(),
            event.received_at,
        ))
    }

    /// Builds a record from the state last reported over REST.
    pub fn from_sensor(sensor: &Sensor, source: Source, at: DateTime<Utc>) -> Option<Self> {
        if !sensor.state.has_fields() {
            return None;
        }

        let mut fields = sensor.state.fields();
        merge_battery(&mut fields, sensor.battery);

        Some(Self::new(sensor, source, fields, at))
    }

    fn new(sensor: &Sensor, source: Source, fields: Fields, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor_id: sensor.id,
            measurement: format!("{MEASUREMENT_PREFIX}_{}", sensor.type_tag),
            tags: indexmap! {
                "name" => sensor.name.clone(),
                "type" => sensor.type_tag.clone(),
                "id" => sensor.id.to_string(),
                "source" => source.as_str().to_string(),
            },
            fields,
            timestamp,
        }
    }
}
