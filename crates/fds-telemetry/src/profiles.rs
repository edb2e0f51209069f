//! ---
//! fds_section: "02-telemetry-generation"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Per-channel waveform profiles for pump operating states."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---

/// Sampling rate shared by every channel profile.
pub const SAMPLING_RATE: f64 = 10_000.0;

/// Waveform parameters defining one telemetry channel's behaviour in a given
/// operating state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    pub frequency: f64,
    pub amplitude: f64,
    pub mean: f64,
}

impl ChannelProfile {
    pub const fn new(frequency: f64, amplitude: f64, mean: f64) -> Self {
        Self {
            frequency,
            amplitude,
            mean,
        }
    }
}

/// The five channel profiles describing one pump operating state.
#[derive(Debug, Clone, Copy)]
pub struct PumpStateProfile {
    pub motor_power_kw: ChannelProfile,
    pub motor_speed: ChannelProfile,
    pub pump_rate: ChannelProfile,
    pub time_pump_on: ChannelProfile,
    pub casing_friction: ChannelProfile,
}

/// Healthy electric submersible pump: slow waveforms around nominal set
/// points.
pub const NORMAL_STATE: PumpStateProfile = PumpStateProfile {
    motor_power_kw: ChannelProfile::new(5.0, 30.0, 150.0),
    motor_speed: ChannelProfile::new(2.0, 60.0, 800.0),
    pump_rate: ChannelProfile::new(4.0, 25.0, 320.0),
    time_pump_on: ChannelProfile::new(1.0, 2.5, 240.0),
    casing_friction: ChannelProfile::new(3.0, 120.0, 1_500.0),
};

/// Failed pump: depressed power/speed/rate, elevated friction, with much
/// choppier waveforms.
pub const FAILED_STATE: PumpStateProfile = PumpStateProfile {
    motor_power_kw: ChannelProfile::new(80.0, 18.0, 60.0),
    motor_speed: ChannelProfile::new(60.0, 30.0, 560.0),
    pump_rate: ChannelProfile::new(70.0, 15.0, 210.0),
    time_pump_on: ChannelProfile::new(10.0, 1.2, 242.0),
    casing_friction: ChannelProfile::new(50.0, 200.0, 2_400.0),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_state_diverges_from_normal_on_every_channel() {
        assert!(FAILED_STATE.motor_power_kw.mean < NORMAL_STATE.motor_power_kw.mean);
        assert!(FAILED_STATE.motor_speed.mean < NORMAL_STATE.motor_speed.mean);
        assert!(FAILED_STATE.pump_rate.mean < NORMAL_STATE.pump_rate.mean);
        assert!(FAILED_STATE.casing_friction.mean > NORMAL_STATE.casing_friction.mean);
        assert!(FAILED_STATE.time_pump_on.frequency > NORMAL_STATE.time_pump_on.frequency);
    }

    #[test]
    fn run_time_deltas_support_a_positive_ramp_step() {
        // The gradual-failure run-time ramp is parameterized by these deltas;
        // both must be positive for the sawtooth step to advance.
        let freq_delta = FAILED_STATE.time_pump_on.frequency - NORMAL_STATE.time_pump_on.frequency;
        let amp_delta = NORMAL_STATE.time_pump_on.amplitude - FAILED_STATE.time_pump_on.amplitude;
        assert!(freq_delta > 0.0);
        assert!(amp_delta > 0.0);
    }
}
