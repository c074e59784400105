use std::collections::{BTreeMap, HashMap};

use anyhow::{Context as _, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::{debug, warn};

use crate::deconz::{SensorState, SensorType, UnknownSensorType};

pub type SensorId = u32;

/// Sensors indexed by their id.
pub type Sensors = BTreeMap<SensorId, Sensor>;

#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: SensorId,

    pub type_tag: String,

    pub name: String,

    pub last_seen: Option<DateTime<Utc>>,

    /// Battery level in percent, 0 when the gateway reports none.
    pub battery: u8,

    pub state: SensorState,
}

impl Sensor {
    pub fn sensor_type(&self) -> Result<SensorType, UnknownSensorType> {
        self.type_tag.parse()
    }

    /// Returns whether the gateway has heard from the sensor within `timeout`
    /// of `now`. A sensor that was never seen is treated as offline.
    pub fn seen_within(&self, timeout: TimeDelta, now: DateTime<Utc>) -> bool {
        self.last_seen
            .is_some_and(|last_seen| last_seen + timeout >= now)
    }

    fn from_raw(id: SensorId, raw: RawSensor) -> Self {
        let state = match (raw.type_tag.parse::<SensorType>(), &raw.state) {
            (Ok(sensor_type), Some(state)) => match SensorState::decode(sensor_type, state.get()) {
                Ok(state) => state,
                Err(err) => {
                    warn!(sensor_id = id, sensor_type = %sensor_type, "failed to decode REST state: {err}");
                    SensorState::Unsupported
                }
            },
            (Ok(_), None) => SensorState::Empty,
            (Err(err), _) => {
                debug!(sensor_id = id, "{err}");
                SensorState::Unsupported
            }
        };

        Self {
            id,
            last_seen: raw.lastseen.as_deref().and_then(parse_last_seen),
            battery: raw
                .config
                .battery
                .and_then(|b| u8::try_from(b).ok())
                .unwrap_or(0),
            type_tag: raw.type_tag,
            name: raw.name,
            state,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSensor {
    #[serde(rename = "type")]
    type_tag: String,

    #[serde(default)]
    name: String,

    #[serde(default)]
    lastseen: Option<String>,

    #[serde(default)]
    config: RawSensorConfig,

    #[serde(default)]
    state: Option<Box<RawValue>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSensorConfig {
    #[serde(default)]
    battery: Option<i64>,
}

/// Parses the body of the `/sensors` REST endpoint.
pub fn parse_sensors(body: &str) -> Result<Sensors> {
    let raw: HashMap<String, RawSensor> =
        serde_json::from_str(body).context("failed to decode /sensors response")?;

    let mut sensors = Sensors::new();
    for (key, raw_sensor) in raw {
        let Ok(id) = key.parse::<SensorId>() else {
            warn!("ignoring sensor with non-numeric id: {key}");
            continue;
        };

        sensors.insert(id, Sensor::from_raw(id, raw_sensor));
    }

    Ok(sensors)
}

fn parse_last_seen(v: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.with_timezone(&Utc));
    }

    // The gateway reports lastseen with minute precision, e.g. 2020-11-22T11:26Z
    ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(v, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::deconz::FieldValue;

    const SENSORS_BODY: &str = r#"{
        "1": {
            "type": "ZHATemperature",
            "name": "Living room",
            "lastseen": "2022-01-04T05:57Z",
            "config": {"battery": 91, "on": true},
            "state": {"lastupdated": "2022-01-04T05:57:50.067", "temperature": 2062}
        },
        "2": {
            "type": "ZHAThermostat",
            "name": "Radiator",
            "config": {"battery": null},
            "state": {"heatsetpoint": 2100}
        },
        "3": {
            "type": "ZHAHumidity",
            "name": "Bathroom",
            "lastseen": "garbage",
            "state": {"humidity": "wet"}
        },
        "sensor-x": {"type": "ZHAWater", "name": "ignored"}
    }"#;

    #[test]
    fn test_parse_sensors() {
        let sensors = parse_sensors(SENSORS_BODY).unwrap();
        assert_eq!(sensors.keys().copied().collect::<Vec<_>>(), [1, 2, 3]);

        let living_room = &sensors[&1];
        assert_eq!(living_room.name, "Living room");
        assert_eq!(living_room.sensor_type(), Ok(SensorType::ZhaTemperature));
        assert_eq!(living_room.battery, 91);
        assert_eq!(
            living_room.last_seen,
            Some(Utc.with_ymd_and_hms(2022, 1, 4, 5, 57, 0).unwrap())
        );
        assert_eq!(
            living_room.state.fields()["temperature"],
            FieldValue::Float(20.62)
        );
    }

    #[test]
    fn test_parse_sensors_keeps_undecodable_sensors() {
        let sensors = parse_sensors(SENSORS_BODY).unwrap();

        let radiator = &sensors[&2];
        assert_eq!(radiator.state, SensorState::Unsupported);
        assert_eq!(radiator.battery, 0);
        assert!(radiator.sensor_type().is_err());

        let bathroom = &sensors[&3];
        assert_eq!(bathroom.state, SensorState::Unsupported);
        assert_eq!(bathroom.last_seen, None);
    }

    #[test]
    fn test_parse_sensors_rejects_invalid_body() {
        assert!(parse_sensors("[]").is_err());
        assert!(parse_sensors("not json").is_err());
    }

    #[test]
    fn test_parse_last_seen_formats() {
        let expected = Utc.with_ymd_and_hms(2020, 11, 22, 11, 26, 0).unwrap();
        assert_eq!(parse_last_seen("2020-11-22T11:26Z"), Some(expected));
        assert_eq!(parse_last_seen("2020-11-22T11:26:00Z"), Some(expected));
        assert_eq!(parse_last_seen("2020-11-22T11:26:00"), Some(expected));
        assert_eq!(parse_last_seen(""), None);
    }

    #[test]
    fn test_seen_within() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 31, 0).unwrap();
        let mut sensor = parse_sensors(SENSORS_BODY).unwrap().remove(&1).unwrap();

        sensor.last_seen = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 29, 0).unwrap());
        assert!(sensor.seen_within(TimeDelta::hours(2), now));

        sensor.last_seen = Some(Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap());
        assert!(!sensor.seen_within(TimeDelta::hours(2), now));

        sensor.last_seen = None;
        assert!(!sensor.seen_within(TimeDelta::hours(2), now));
    }
}
