//! ---
//! fds_section: "02-telemetry-generation"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Telemetry record data model."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// One tick of simulated pump telemetry, already rounded to channel precision.
///
/// Record order within a device's sequence is temporally meaningful; sequences
/// are consumed front-to-back and never reordered or deduplicated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PumpTelemetryRecord {
    /// Motor power draw in kW, 2 decimals.
    pub motor_power_kw: f64,
    /// Motor shaft speed in rpm, integer valued.
    pub motor_speed: f64,
    /// Pump rate in gallons per minute, 1 decimal.
    pub pump_rate: f64,
    /// Cumulative pump-on time in hours, 2 decimals.
    pub time_pump_on: f64,
    /// Casing friction coefficient, 2 decimals.
    pub casing_friction: f64,
}

impl PumpTelemetryRecord {
    pub const fn new(
        motor_power_kw: f64,
        motor_speed: f64,
        pump_rate: f64,
        time_pump_on: f64,
        casing_friction: f64,
    ) -> Self {
        Self {
            motor_power_kw,
            motor_speed,
            pump_rate,
            time_pump_on,
            casing_friction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_field_device_casing() {
        let record = PumpTelemetryRecord::new(152.31, 812.0, 331.4, 240.12, 1_530.77);
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["MotorPowerKw"], 152.31);
        assert_eq!(json["MotorSpeed"], 812.0);
        assert_eq!(json["PumpRate"], 331.4);
        assert_eq!(json["TimePumpOn"], 240.12);
        assert_eq!(json["CasingFriction"], 1_530.77);
    }
}
