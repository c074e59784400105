use serde::Deserialize;
use serde_json::value::RawValue;

pub const SENSORS_RESOURCE: &str = "sensors";

/// Outer shape of a websocket message.
///
/// Only the members needed to route sensor state changes are decoded; the
/// state itself is kept raw until the sensor type is known.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Message type, `"event"` for everything the gateway pushes.
    #[serde(rename = "t", default)]
    pub message_kind: String,

    /// Event kind, e.g. `"changed"` or `"added"`.
    #[serde(rename = "e", default)]
    pub event_kind: String,

    /// Resource kind, e.g. `"sensors"`, `"lights"` or `"groups"`.
    #[serde(rename = "r", default)]
    pub resource: String,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub state: Option<Box<RawValue>>,
}

impl RawEnvelope {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Returns the raw state if this message reports a sensor state change.
    pub fn sensor_state(&self) -> Option<&RawValue> {
        if self.resource != SENSORS_RESOURCE {
            return None;
        }

        self.state.as_deref()
    }
}
