//! Published Sensor Readings

use crate::sensor::SensorDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol a reading originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Request/response ECU protocol
    Polled,
    /// Continuous `@`-delimited gauge stream
    Streaming,
}

impl SourceType {
    /// Wire label used in reading keys
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Polled => "polled-sensor",
            SourceType::Streaming => "streaming-sensor",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded, unit-tagged value. Ownership passes to the consumer once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sensor display name
    pub label: String,
    /// `polled-sensor` or `streaming-sensor`
    pub source_type: String,
    /// Instance index (always 0 for the polled protocol)
    pub instance: u8,
    /// Converted value
    pub value: f64,
    /// Physical unit
    pub unit: String,
}

impl SensorReading {
    pub(crate) fn new(
        sensor: &SensorDefinition,
        source: SourceType,
        instance: u8,
        value: f64,
    ) -> Self {
        Self {
            label: sensor.name.to_string(),
            source_type: source.as_str().to_string(),
            instance,
            value,
            unit: sensor.unit.to_string(),
        }
    }

    /// Address of this reading: `/<source_type>/<label>`
    pub fn key(&self) -> String {
        format!("/{}/{}", self.source_type, self.label)
    }
}

#[cfg(test)]
mod tests {
    use crate::SensorRegistry;

    #[test]
    fn test_reading_key() {
        let reading = SensorRegistry::polled().decode(0x2f, 40.0, 0).unwrap();
        assert_eq!(reading.key(), "/polled-sensor/Speed");

        let reading = SensorRegistry::streaming().decode(4, 0.0, 1).unwrap();
        assert_eq!(reading.key(), "/streaming-sensor/Boost");
        assert_eq!(reading.instance, 1);
    }

    #[test]
    fn test_reading_serializes() {
        let reading = SensorRegistry::polled().decode(0x07, 60.0, 0).unwrap();
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["label"], "Coolant Temp");
        assert_eq!(json["source_type"], "polled-sensor");
        assert_eq!(json["value"], 20.0);
    }
}
