use indexmap::{IndexMap, indexmap};
use serde::{Deserialize, Serialize};

use crate::deconz::SensorType;

/// A single scalar written to the time-series sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// Field set of one record, in projection order.
pub type Fields = IndexMap<&'static str, FieldValue>;

/// Properties every sensor state carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommonState {
    pub lastupdated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Presence {
    #[serde(flatten)]
    pub common: CommonState,
    pub presence: bool,
}

impl Presence {
    pub fn fields(&self) -> Fields {
        indexmap! { "presence" => self.presence.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Daylight {
    #[serde(flatten)]
    pub common: CommonState,
    pub daylight: bool,
    pub status: i32,
}

impl Daylight {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "daylight" => self.daylight.into(),
            "status" => self.status.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AirQuality {
    #[serde(flatten)]
    pub common: CommonState,
    pub airquality: String,
    pub airqualityppb: i32,
}

impl AirQuality {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "airquality" => self.airquality.clone().into(),
            "airqualityppb" => self.airqualityppb.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Alarm {
    #[serde(flatten)]
    pub common: CommonState,
    pub lowbattery: bool,
    pub tampered: bool,
    pub alarm: bool,
}

impl Alarm {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "lowbattery" => self.lowbattery.into(),
            "tampered" => self.tampered.into(),
            "alarm" => self.alarm.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Battery {
    #[serde(flatten)]
    pub common: CommonState,
    pub battery: i32,
}

impl Battery {
    pub fn fields(&self) -> Fields {
        indexmap! { "battery" => self.battery.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CarbonMonoxide {
    #[serde(flatten)]
    pub common: CommonState,
    pub carbonmonoxide: bool,
    pub lowbattery: bool,
    pub tampered: bool,
}

impl CarbonMonoxide {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "CO" => self.carbonmonoxide.into(),
            "lowbattery" => self.lowbattery.into(),
            "tampered" => self.tampered.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Consumption {
    #[serde(flatten)]
    pub common: CommonState,
    pub consumption: i32,
    pub power: i32,
}

impl Consumption {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "consumption" => self.consumption.into(),
            "power" => self.power.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Fire {
    #[serde(flatten)]
    pub common: CommonState,
    pub fire: bool,
    pub lowbattery: bool,
    pub tampered: bool,
}

impl Fire {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "lowbattery" => self.lowbattery.into(),
            "tampered" => self.tampered.into(),
            "fire" => self.fire.into(),
        }
    }
}

/// Relative humidity in hundredths of a percent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Humidity {
    #[serde(flatten)]
    pub common: CommonState,
    pub humidity: i32,
}

impl Humidity {
    pub fn percent(&self) -> f64 {
        f64::from(self.humidity) / 100f64
    }

    pub fn fields(&self) -> Fields {
        indexmap! { "humidity" => self.percent().into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightLevel {
    #[serde(flatten)]
    pub common: CommonState,
    pub dark: bool,
    pub daylight: bool,
    pub lightlevel: i32,
    pub lux: i32,
}

impl LightLevel {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "daylight" => self.daylight.into(),
            "dark" => self.dark.into(),
            "lightlevel" => self.lightlevel.into(),
            "lux" => self.lux.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OpenClose {
    #[serde(flatten)]
    pub common: CommonState,
    pub open: bool,
    pub lowbattery: bool,
    pub tampered: bool,
}

impl OpenClose {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "lowbattery" => self.lowbattery.into(),
            "tampered" => self.tampered.into(),
            "open" => self.open.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Power {
    #[serde(flatten)]
    pub common: CommonState,
    pub current: i32,
    pub power: i32,
    pub voltage: i32,
}

impl Power {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "current" => self.current.into(),
            "power" => self.power.into(),
            "voltage" => self.voltage.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Pressure {
    #[serde(flatten)]
    pub common: CommonState,
    pub pressure: i32,
}

impl Pressure {
    pub fn fields(&self) -> Fields {
        indexmap! { "pressure" => self.pressure.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Switch {
    #[serde(flatten)]
    pub common: CommonState,
    pub buttonevent: i32,
}

impl Switch {
    pub fn fields(&self) -> Fields {
        indexmap! { "buttonevent" => self.buttonevent.into() }
    }
}

/// Temperature in hundredths of a degree Celsius.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Temperature {
    #[serde(flatten)]
    pub common: CommonState,
    pub temperature: i32,
}

impl Temperature {
    pub fn celsius(&self) -> f64 {
        f64::from(self.temperature) / 100f64
    }

    pub fn fields(&self) -> Fields {
        indexmap! { "temperature" => self.celsius().into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Vibration {
    #[serde(flatten)]
    pub common: CommonState,
    pub vibration: bool,
}

impl Vibration {
    pub fn fields(&self) -> Fields {
        indexmap! { "vibration" => self.vibration.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Water {
    #[serde(flatten)]
    pub common: CommonState,
    pub lowbattery: bool,
    pub tampered: bool,
    pub water: bool,
}

impl Water {
    pub fn fields(&self) -> Fields {
        indexmap! {
            "lowbattery" => self.lowbattery.into(),
            "tampered" => self.tampered.into(),
            "water" => self.water.into(),
        }
    }
}

/// Decoded state of a sensor, one variant per supported type tag.
///
/// `Empty` marks notifications that carry no sensor state at all, while
/// `Unsupported` marks a sensor whose type has no decoder. Neither projects
/// any fields.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorState {
    Empty,
    Unsupported,
    ClipPresence(Presence),
    Daylight(Daylight),
    AirQuality(AirQuality),
    Alarm(Alarm),
    Battery(Battery),
    CarbonMonoxide(CarbonMonoxide),
    Consumption(Consumption),
    Fire(Fire),
    Humidity(Humidity),
    LightLevel(LightLevel),
    OpenClose(OpenClose),
    Power(Power),
    Presence(Presence),
    Pressure(Pressure),
    Switch(Switch),
    Temperature(Temperature),
    Vibration(Vibration),
    Water(Water),
}

impl SensorState {
    /// Decodes a raw JSON state object using the schema of `sensor_type`.
    pub fn decode(sensor_type: SensorType, raw: &str) -> Result<Self, serde_json::Error> {
        let state = match sensor_type {
            SensorType::ClipPresence => SensorState::ClipPresence(serde_json::from_str(raw)?),
            SensorType::Daylight => SensorState::Daylight(serde_json::from_str(raw)?),
            SensorType::ZhaAirQuality => SensorState::AirQuality(serde_json::from_str(raw)?),
            SensorType::ZhaAlarm => SensorState::Alarm(serde_json::from_str(raw)?),
            SensorType::ZhaBattery => SensorState::Battery(serde_json::from_str(raw)?),
            SensorType::ZhaCarbonMonoxide => {
                SensorState::CarbonMonoxide(serde_json::from_str(raw)?)
            }
            SensorType::ZhaConsumption => SensorState::Consumption(serde_json::from_str(raw)?),
            SensorType::ZhaFire => SensorState::Fire(serde_json::from_str(raw)?),
            SensorType::ZhaHumidity => SensorState::Humidity(serde_json::from_str(raw)?),
            SensorType::ZhaLightLevel => SensorState::LightLevel(serde_json::from_str(raw)?),
            SensorType::ZhaOpenClose => SensorState::OpenClose(serde_json::from_str(raw)?),
            SensorType::ZhaPower => SensorState::Power(serde_json::from_str(raw)?),
            SensorType::ZhaPresence => SensorState::Presence(serde_json::from_str(raw)?),
            SensorType::ZhaPressure => SensorState::Pressure(serde_json::from_str(raw)?),
            SensorType::ZhaSwitch => SensorState::Switch(serde_json::from_str(raw)?),
            SensorType::ZhaTemperature => SensorState::Temperature(serde_json::from_str(raw)?),
            SensorType::ZhaVibration => SensorState::Vibration(serde_json::from_str(raw)?),
            SensorType::ZhaWater => SensorState::Water(serde_json::from_str(raw)?),
        };

        Ok(state)
    }

    /// Returns whether this state projects any time-series fields.
    pub fn has_fields(&self) -> bool {
        !matches!(self, SensorState::Empty | SensorState::Unsupported)
    }

    pub fn common(&self) -> Option<&CommonState> {
        match self {
            SensorState::Empty | SensorState::Unsupported => None,
            SensorState::ClipPresence(s) | SensorState::Presence(s) => Some(&s.common),
            SensorState::Daylight(s) => Some(&s.common),
            SensorState::AirQuality(s) => Some(&s.common),
            SensorState::Alarm(s) => Some(&s.common),
            SensorState::Battery(s) => Some(&s.common),
            SensorState::CarbonMonoxide(s) => Some(&s.common),
            SensorState::Consumption(s) => Some(&s.common),
            SensorState::Fire(s) => Some(&s.common),
            SensorState::Humidity(s) => Some(&s.common),
            SensorState::LightLevel(s) => Some(&s.common),
            SensorState::OpenClose(s) => Some(&s.common),
            SensorState::Power(s) => Some(&s.common),
            SensorState::Pressure(s) => Some(&s.common),
            SensorState::Switch(s) => Some(&s.common),
            SensorState::Temperature(s) => Some(&s.common),
            SensorState::Vibration(s) => Some(&s.common),
            SensorState::Water(s) => Some(&s.common),
        }
    }

    pub fn fields(&self) -> Fields {
        match self {
            SensorState::Empty | SensorState::Unsupported => Fields::new(),
            SensorState::ClipPresence(s) | SensorState::Presence(s) => s.fields(),
            SensorState::Daylight(s) => s.fields(),
            SensorState::AirQuality(s) => s.fields(),
            SensorState::Alarm(s) => s.fields(),
            SensorState::Battery(s) => s.fields(),
            SensorState::CarbonMonoxide(s) => s.fields(),
            SensorState::Consumption(s) => s.fields(),
            SensorState::Fire(s) => s.fields(),
            SensorState::Humidity(s) => s.fields(),
            SensorState::LightLevel(s) => s.fields(),
            SensorState::OpenClose(s) => s.fields(),
            SensorState::Power(s) => s.fields(),
            SensorState::Pressure(s) => s.fields(),
            SensorState::Switch(s) => s.fields(),
            SensorState::Temperature(s) => s.fields(),
            SensorState::Vibration(s) => s.fields(),
            SensorState::Water(s) => s.fields(),
        }
    }
}

/// Adds the directory's battery percentage unless the state already
/// reported one.
pub fn merge_battery(fields: &mut Fields, battery: u8) {
    fields.entry("battery").or_insert_with(|| battery.into());
}
