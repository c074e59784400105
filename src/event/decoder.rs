use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::deconz::{Fields, SensorId, SensorState, SensorType, merge_battery};
use crate::directory::SensorDirectory;
use crate::event::{RawEnvelope, SensorEvent};

/// Reasons a single websocket message is dropped. None of them affect the
/// connection the message arrived on.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event envelope: {0}")]
    MalformedEnvelope(serde_json::Error),

    #[error("invalid sensor id: {0:?}")]
    InvalidSensorId(Option<String>),

    #[error("unable to get sensor with id {0}")]
    NotFound(SensorId),

    #[error("sensor {id} has unknown type {type_tag}")]
    UnknownType { id: SensorId, type_tag: String },

    #[error("unable to decode {sensor_type} state of sensor {id}: {error}")]
    MalformedState {
        id: SensorId,
        sensor_type: SensorType,
        error: serde_json::Error,
    },
}

/// Turns raw websocket messages into [`SensorEvent`]s, using the directory to
/// learn each sensor's type.
#[derive(Clone)]
pub struct EventDecoder {
    directory: Arc<dyn SensorDirectory>,
}

impl EventDecoder {
    pub fn new(directory: Arc<dyn SensorDirectory>) -> Self {
        Self { directory }
    }

    pub fn decode(&self, raw: &[u8]) -> Result<SensorEvent, DecodeError> {
        self.decode_at(raw, Utc::now())
    }

    pub fn decode_at(
        &self,
        raw: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<SensorEvent, DecodeError> {
        let envelope = RawEnvelope::parse(raw).map_err(DecodeError::MalformedEnvelope)?;

        // Anything but a sensor state change (lights, groups, scenes, config
        // updates) passes through as an empty event.
        let Some(raw_state) = envelope.sensor_state() else {
            return Ok(SensorEvent {
                sensor_id: envelope.id.as_deref().and_then(|id| id.parse().ok()),
                event_kind: envelope.event_kind,
                resource: envelope.resource,
                sensor: None,
                state: SensorState::Empty,
                fields: Fields::new(),
                received_at,
            });
        };

        let id: SensorId = envelope
            .id
            .as_deref()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| DecodeError::InvalidSensorId(envelope.id.clone()))?;

        let sensor = self
            .directory
            .get(id)
            .map_err(|_| DecodeError::NotFound(id))?;

        let sensor_type: SensorType =
            sensor
                .type_tag
                .parse()
                .map_err(|_| DecodeError::UnknownType {
                    id,
                    type_tag: sensor.type_tag.clone(),
                })?;

        let state = SensorState::decode(sensor_type, raw_state.get()).map_err(|error| {
            DecodeError::MalformedState {
                id,
                sensor_type,
                error,
            }
        })?;

        let mut fields = state.fields();
        merge_battery(&mut fields, sensor.battery);

        Ok(SensorEvent {
            event_kind: envelope.event_kind,
            resource: envelope.resource,
            sensor_id: Some(id),
            sensor: Some(sensor),
            state,
            fields,
            received_at,
        })
    }
}
