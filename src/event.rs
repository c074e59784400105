mod decoder;
mod envelope;

pub use decoder::*;
pub use envelope::*;

use chrono::{DateTime, Utc};

use crate::deconz::{Fields, Sensor, SensorId, SensorState};

/// A decoded websocket message.
///
/// Messages that do not carry a sensor state are still delivered, with
/// [`SensorState::Empty`] and no fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub event_kind: String,

    pub resource: String,

    pub sensor_id: Option<SensorId>,

    /// Directory entry of the sensor at decode time.
    pub sensor: Option<Sensor>,

    pub state: SensorState,

    /// Projected fields, including the battery level.
    pub fields: Fields,

    pub received_at: DateTime<Utc>,
}

impl SensorEvent {
    pub fn is_empty(&self) -> bool {
        !self.state.has_fields()
    }
}
