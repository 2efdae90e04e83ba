//! Sensor Tables
//!
//! Ids, labels, units and formulas for the polled ECU protocol and the
//! streaming gauge protocol.

use crate::conversion::Conversion::{self, *};
use crate::sensor::{SensorDefinition, Tier};

const fn sensor(
    id: u16,
    name: &'static str,
    unit: &'static str,
    conversion: Conversion,
    tier: Tier,
) -> SensorDefinition {
    SensorDefinition {
        id,
        name,
        unit,
        conversion,
        tier,
    }
}

const FUEL_TRIM: Conversion = OffsetScale {
    offset: -128.0,
    scale: 0.2,
};
const OXYGEN_VOLTS: Conversion = Scale(0.01952);
const PERCENT_OF_BYTE: Conversion = Scale(100.0 / 255.0);

/// Request/response sensors, keyed by request id
pub const POLLED_SENSORS: &[SensorDefinition] = &[
    sensor(0x04, "Timing Advance Int", "°", Offset(-20.0), Tier::Medium),
    sensor(0x06, "Timing Advance", "°", Offset(-20.0), Tier::Medium),
    sensor(0x07, "Coolant Temp", "C", Offset(-40.0), Tier::Medium),
    sensor(0x0c, "Fuel Trim Low (LTFT)", "%", FUEL_TRIM, Tier::None),
    sensor(0x0d, "Fuel Trim Mid (LTFT)", "%", FUEL_TRIM, Tier::None),
    sensor(0x0e, "Fuel Trim High (LTFT)", "%", FUEL_TRIM, Tier::None),
    sensor(0x0f, "Oxygen Feedback Trim (STFT)", "%", FUEL_TRIM, Tier::None),
    sensor(0x10, "Coolant Temp Scaled", "C", Offset(-40.0), Tier::Medium),
    sensor(0x11, "MAF Air Temp", "C", Offset(-40.0), Tier::Low),
    // (-2.7 * raw + 597.7) * 0.556
    sensor(
        0x12,
        "EGR Temperature",
        "C",
        Linear {
            scale: -2.7 * 0.556,
            offset: 597.7 * 0.556,
        },
        Tier::Medium,
    ),
    sensor(0x13, "Front Oxygen Sensor", "V", OXYGEN_VOLTS, Tier::None),
    sensor(0x14, "Battery Level", "V", Scale(0.07333), Tier::Medium),
    sensor(0x15, "Barometer", "kPa", Scale(0.49), Tier::None),
    sensor(0x16, "ISC Steps", "steps", Divide(1.2), Tier::Low),
    sensor(0x17, "Throttle Position", "%", PERCENT_OF_BYTE, Tier::High),
    sensor(0x1a, "Air Flow Meter", "Hz", Scale(6.25), Tier::Medium),
    sensor(0x1c, "Engine Load", "%", Scale(0.625), Tier::Medium),
    sensor(0x1d, "Acceleration Enrichment", "", Scale(200.0 / 255.0), Tier::None),
    sensor(0x1f, "ECU Load Previous load", "%", Scale(0.625), Tier::None),
    sensor(0x21, "Engine RPM", "RPM", Scale(31.25), Tier::High),
    sensor(0x24, "Target Idle RPM", "RPM", Scale(7.8), Tier::Low),
    sensor(0x26, "Knock Sum", "knocks", Identity, Tier::High),
    sensor(0x29, "Injector Pulse Width", "ms", Divide(1000.0), Tier::Medium),
    sensor(0x2c, "Air Volume", "", Identity, Tier::Low),
    sensor(0x2f, "Speed", "km/h", Scale(2.0), Tier::High),
    sensor(0x30, "Knock Voltage", "V", Scale(0.0195), Tier::None),
    sensor(0x31, "Volumetric Efficiency", "V", Scale(0.0195), Tier::None),
    sensor(0x32, "Air/Fuel Ratio (Map)", "AFR", Reciprocal(14.7 * 128.0), Tier::Medium),
    sensor(0x33, "Timing", "°", Offset(-20.0), Tier::High),
    sensor(0x38, "Boost (MDP)", "PSI", Scale(0.19348), Tier::Low),
    sensor(0x39, "Fuel Tank Pressure", "PSI", Identity, Tier::None),
    sensor(0x3c, "Rear Oxygen Sensor #1", "V", OXYGEN_VOLTS, Tier::None),
    sensor(0x3d, "Front Oxygen Sensor #2", "V", OXYGEN_VOLTS, Tier::None),
    sensor(0x3e, "Rear Oxygen Sensor #2", "V", OXYGEN_VOLTS, Tier::None),
    sensor(0x4a, "Purge Solenoid Duty Cycle", "%", PERCENT_OF_BYTE, Tier::None),
    sensor(0x80, "ECU ID Type", "", Identity, Tier::None),
    sensor(0x82, "ECU ID Version", "", Identity, Tier::None),
    sensor(0x85, "EGR Duty Cycle", "", Divide(1.28), Tier::Low),
    sensor(0x86, "Wastegate Duty Cycle", "%", Divide(2.0), Tier::Low),
    sensor(0x96, "RAW MAF ADC value", "V", Identity, Tier::None),
];

/// Streaming gauge sensors, keyed by record type id. None of them are polled.
pub const STREAMING_SENSORS: &[SensorDefinition] = &[
    // (raw / 3.75 + 68) / 100
    sensor(
        0,
        "Wide-Band Air/Fuel",
        "Lambda",
        Linear {
            scale: 1.0 / 375.0,
            offset: 0.68,
        },
        Tier::None,
    ),
    sensor(1, "Exhaust Gas Temperature", "°C", Identity, Tier::None),
    sensor(2, "Fluid Temperature", "°C", Identity, Tier::None),
    sensor(
        3,
        "Vacuum",
        "mm/Hg",
        Linear {
            scale: 2.23,
            offset: 760.4,
        },
        Tier::None,
    ),
    sensor(4, "Boost", "Bar", Scale(0.0689476 / 329.48), Tier::None),
    sensor(5, "Air Intake Temperature", "°C", Identity, Tier::None),
    sensor(6, "RPM", "RPM", Scale(19.55), Tier::None),
    sensor(7, "Vehicle Speed", "km/h", Divide(3.97), Tier::None),
    sensor(8, "Throttle Position", "%", Identity, Tier::None),
    sensor(9, "Engine Load", "%", Identity, Tier::None),
    sensor(10, "Fuel Pressure", "Bar", Divide(74.22), Tier::None),
    sensor(11, "Timing", "°", Offset(-64.0), Tier::None),
    sensor(12, "MAP", "kPa", Identity, Tier::None),
    sensor(13, "MAF", "g/s", Identity, Tier::None),
    sensor(14, "Short Term Fuel Trim", "%", Offset(-100.0), Tier::None),
    sensor(15, "Long Term Fuel Trim", "%", Offset(-100.0), Tier::None),
    sensor(16, "Narrow-Band Oxygen Sensor", "%", Identity, Tier::None),
    sensor(17, "Fuel Level", "%", Identity, Tier::None),
    sensor(18, "Volt Meter", "V", Divide(51.15), Tier::None),
    sensor(19, "Knock", "V", Divide(204.6), Tier::None),
    sensor(20, "Duty Cycle", "+ Duty", Divide(10.23), Tier::None),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        for table in [POLLED_SENSORS, STREAMING_SENSORS] {
            let ids: HashSet<u16> = table.iter().map(|s| s.id).collect();
            assert_eq!(ids.len(), table.len());
        }
    }

    #[test]
    fn test_egr_formula_matches_expanded_form() {
        let egr = POLLED_SENSORS.iter().find(|s| s.id == 0x12).unwrap();
        let raw = 100.0;
        let expected = (-2.7 * raw + 597.7) * 0.556;
        assert!((egr.convert(raw) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_wideband_formula() {
        let afr = STREAMING_SENSORS.iter().find(|s| s.id == 0).unwrap();
        let raw = 120.0;
        assert!((afr.convert(raw) - (raw / 3.75 + 68.0) / 100.0).abs() < 1e-9);
    }
}
