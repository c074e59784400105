use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown sensor type: {0}")]
pub struct UnknownSensorType(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    ClipPresence,
    Daylight,
    ZhaAirQuality,
    ZhaAlarm,
    ZhaBattery,
    ZhaCarbonMonoxide,
    ZhaConsumption,
    ZhaFire,
    ZhaHumidity,
    ZhaLightLevel,
    ZhaOpenClose,
    ZhaPower,
    ZhaPresence,
    ZhaPressure,
    ZhaSwitch,
    ZhaTemperature,
    ZhaVibration,
    ZhaWater,
}

impl SensorType {
    pub const ALL: [SensorType; 18] = [
        SensorType::ClipPresence,
        SensorType::Daylight,
        SensorType::ZhaAirQuality,
        SensorType::ZhaAlarm,
        SensorType::ZhaBattery,
        SensorType::ZhaCarbonMonoxide,
        SensorType::ZhaConsumption,
        SensorType::ZhaFire,
        SensorType::ZhaHumidity,
        SensorType::ZhaLightLevel,
        SensorType::ZhaOpenClose,
        SensorType::ZhaPower,
        SensorType::ZhaPresence,
        SensorType::ZhaPressure,
        SensorType::ZhaSwitch,
        SensorType::ZhaTemperature,
        SensorType::ZhaVibration,
        SensorType::ZhaWater,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::ClipPresence => "CLIPPresence",
            SensorType::Daylight => "Daylight",
            SensorType::ZhaAirQuality => "ZHAAirQuality",
            SensorType::ZhaAlarm => "ZHAAlarm",
            SensorType::ZhaBattery => "ZHABattery",
            SensorType::ZhaCarbonMonoxide => "ZHACarbonMonoxide",
            SensorType::ZhaConsumption => "ZHAConsumption",
            SensorType::ZhaFire => "ZHAFire",
            SensorType::ZhaHumidity => "ZHAHumidity",
            SensorType::ZhaLightLevel => "ZHALightLevel",
            SensorType::ZhaOpenClose => "ZHAOpenClose",
            SensorType::ZhaPower => "ZHAPower",
            SensorType::ZhaPresence => "ZHAPresence",
            SensorType::ZhaPressure => "ZHAPressure",
            SensorType::ZhaSwitch => "ZHASwitch",
            SensorType::ZhaTemperature => "ZHATemperature",
            SensorType::ZhaVibration => "ZHAVibration",
            SensorType::ZhaWater => "ZHAWater",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = UnknownSensorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIPPresence" => Ok(SensorType::ClipPresence),
            "Daylight" => Ok(SensorType::Daylight),
            "ZHAAirQuality" => Ok(SensorType::ZhaAirQuality),
            "ZHAAlarm" => Ok(SensorType::ZhaAlarm),
            "ZHABattery" => Ok(SensorType::ZhaBattery),
            "ZHACarbonMonoxide" => Ok(SensorType::ZhaCarbonMonoxide),
            "ZHAConsumption" => Ok(SensorType::ZhaConsumption),
            "ZHAFire" => Ok(SensorType::ZhaFire),
            "ZHAHumidity" => Ok(SensorType::ZhaHumidity),
            "ZHALightLevel" => Ok(SensorType::ZhaLightLevel),
            "ZHAOpenClose" => Ok(SensorType::ZhaOpenClose),
            "ZHAPower" => Ok(SensorType::ZhaPower),
            "ZHAPresence" => Ok(SensorType::ZhaPresence),
            "ZHAPressure" => Ok(SensorType::ZhaPressure),
            "ZHASwitch" => Ok(SensorType::ZhaSwitch),
            "ZHATemperature" => Ok(SensorType::ZhaTemperature),
            "ZHAVibration" => Ok(SensorType::ZhaVibration),
            "ZHAWater" => Ok(SensorType::ZhaWater),
            _ => Err(UnknownSensorType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_parses_from_its_tag() {
        for sensor_type in SensorType::ALL {
            assert_eq!(sensor_type.as_str().parse::<SensorType>(), Ok(sensor_type));
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        assert_eq!(
            "ZHAThermostat".parse::<SensorType>(),
            Err(UnknownSensorType("ZHAThermostat".to_string()))
        );
        // tags are case sensitive
        assert!("zhatemperature".parse::<SensorType>().is_err());
    }
}
