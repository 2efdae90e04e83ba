//! Sensor Definitions and the Registry

use crate::conversion::Conversion;
use crate::error::RegistryError;
use crate::reading::{SensorReading, SourceType};
use crate::tables::{POLLED_SENSORS, STREAMING_SENSORS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Polling priority class of a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// Never polled (streaming sensors, diagnostics read on demand)
    None,
    /// Polled every 100ms by default
    Low,
    /// Polled every 40ms by default
    Medium,
    /// Polled every 20ms by default
    High,
}

impl Tier {
    /// Tiers that take part in polling, fastest first
    pub const SCHEDULED: [Tier; 3] = [Tier::High, Tier::Medium, Tier::Low];

    /// Whether sensors of this tier get a slot in the polling scheduler
    pub fn is_scheduled(&self) -> bool {
        !matches!(self, Tier::None)
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::None
    }
}

/// One entry of a sensor table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDefinition {
    /// Protocol-specific sensor id
    pub id: u16,
    /// Display name, also the reading label
    pub name: &'static str,
    /// Physical unit of the converted value
    pub unit: &'static str,
    /// Raw-to-physical formula
    pub conversion: Conversion,
    /// Polling tier
    pub tier: Tier,
}

impl SensorDefinition {
    /// Apply this sensor's conversion to a raw magnitude
    pub fn convert(&self, raw: f64) -> f64 {
        self.conversion.apply(raw)
    }
}

/// Immutable id-keyed table of sensors for one protocol.
///
/// Built once at startup and handed to the codecs behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    source: SourceType,
    sensors: BTreeMap<u16, SensorDefinition>,
}

impl SensorRegistry {
    /// Build a registry from an arbitrary table. Later duplicates replace earlier ones.
    pub fn new(source: SourceType, table: &[SensorDefinition]) -> Self {
        let sensors = table.iter().map(|sensor| (sensor.id, *sensor)).collect();
        Self { source, sensors }
    }

    /// Sensors reachable through request/response polling
    pub fn polled() -> Self {
        Self::new(SourceType::Polled, POLLED_SENSORS)
    }

    /// Sensors carried by the continuous streaming protocol
    pub fn streaming() -> Self {
        Self::new(SourceType::Streaming, STREAMING_SENSORS)
    }

    /// Which protocol this registry describes
    pub fn source(&self) -> SourceType {
        self.source
    }

    /// Look up a sensor by id
    pub fn get(&self, id: u16) -> Option<&SensorDefinition> {
        self.sensors.get(&id)
    }

    /// Number of sensors in the table
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// All sensors in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &SensorDefinition> {
        self.sensors.values()
    }

    /// Ids of the sensors in `tier`, ascending
    pub fn tier_members(&self, tier: Tier) -> Vec<u16> {
        self.sensors
            .values()
            .filter(|sensor| sensor.tier == tier)
            .map(|sensor| sensor.id)
            .collect()
    }

    /// Convert a raw magnitude into a published reading.
    pub fn decode(&self, id: u16, raw: f64, instance: u8) -> Result<SensorReading, RegistryError> {
        let sensor = self.get(id).ok_or(RegistryError::UnknownSensor(id))?;
        let value = sensor.convert(raw);
        if !value.is_finite() {
            return Err(RegistryError::NonFiniteValue { id, raw });
        }
        Ok(SensorReading::new(sensor, self.source, instance, value))
    }

    /// Label an already converted value without applying the formula again.
    pub fn label(&self, id: u16, value: f64) -> Result<SensorReading, RegistryError> {
        let sensor = self.get(id).ok_or(RegistryError::UnknownSensor(id))?;
        if !value.is_finite() {
            return Err(RegistryError::NonFiniteValue { id, raw: value });
        }
        Ok(SensorReading::new(sensor, self.source, 0, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::select;

    #[test]
    fn test_engine_rpm_decode() {
        let registry = SensorRegistry::polled();
        let reading = registry.decode(0x21, 256.0, 0).unwrap();
        assert_eq!(reading.label, "Engine RPM");
        assert_eq!(reading.unit, "RPM");
        assert_eq!(reading.source_type, "polled-sensor");
        assert_eq!(reading.value, 8000.0);
    }

    #[test]
    fn test_coolant_temp_decode() {
        let registry = SensorRegistry::polled();
        let reading = registry.decode(0x07, 60.0, 0).unwrap();
        assert_eq!(reading.label, "Coolant Temp");
        assert_eq!(reading.value, 20.0);
    }

    #[test]
    fn test_unknown_sensor() {
        let registry = SensorRegistry::polled();
        assert!(matches!(
            registry.decode(0x01, 1.0, 0),
            Err(RegistryError::UnknownSensor(0x01))
        ));
    }

    #[test]
    fn test_non_finite_conversion_rejected() {
        // Air/Fuel Ratio divides by the raw value
        let registry = SensorRegistry::polled();
        assert!(matches!(
            registry.decode(0x32, 0.0, 0),
            Err(RegistryError::NonFiniteValue { id: 0x32, .. })
        ));
    }

    #[test]
    fn test_tier_members_sorted_and_exclude_none() {
        let registry = SensorRegistry::polled();
        let high = registry.tier_members(Tier::High);
        assert_eq!(high, vec![0x17, 0x21, 0x26, 0x2f, 0x33]);

        for tier in Tier::SCHEDULED {
            for id in registry.tier_members(tier) {
                assert!(registry.get(id).unwrap().tier.is_scheduled());
            }
        }
    }

    #[test]
    fn test_streaming_sensors_are_never_scheduled() {
        let registry = SensorRegistry::streaming();
        assert_eq!(registry.len(), 21);
        assert!(registry.iter().all(|sensor| !sensor.tier.is_scheduled()));
    }

    proptest! {
        #[test]
        fn decode_applies_table_entry(sensor in select(POLLED_SENSORS), raw in any::<u32>()) {
            let registry = SensorRegistry::polled();
            let expected = sensor.convert(raw as f64);
            match registry.decode(sensor.id, raw as f64, 0) {
                Ok(reading) => {
                    prop_assert_eq!(reading.label, sensor.name);
                    prop_assert_eq!(reading.unit, sensor.unit);
                    prop_assert_eq!(reading.value, expected);
                }
                Err(e) => {
                    prop_assert!(!expected.is_finite());
                    prop_assert_eq!(e, RegistryError::NonFiniteValue { id: sensor.id, raw: raw as f64 });
                }
            }
        }

        #[test]
        fn streaming_decode_keeps_instance(
            sensor in select(STREAMING_SENSORS),
            raw in 0u16..0x1000,
            instance in any::<u8>(),
        ) {
            let reading = SensorRegistry::streaming().decode(sensor.id, raw as f64, instance).unwrap();
            prop_assert_eq!(reading.instance, instance);
            prop_assert_eq!(reading.source_type, "streaming-sensor");
            prop_assert_eq!(reading.value, sensor.convert(raw as f64));
        }
    }

    #[test]
    fn test_label_keeps_value() {
        let registry = SensorRegistry::polled();
        let reading = registry.label(0x2f, 88.5).unwrap();
        assert_eq!(reading.label, "Speed");
        assert_eq!(reading.value, 88.5);
    }
}
