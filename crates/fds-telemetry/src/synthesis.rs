//! ---
//! fds_section: "02-telemetry-generation"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Normal-to-failed telemetry composition and interpolation."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::profiles::{PumpStateProfile, FAILED_STATE, NORMAL_STATE, SAMPLING_RATE};
use crate::record::PumpTelemetryRecord;
use crate::waveform::periodic;

/// Wobble applied to each gradual-failure step, as a fraction of the stepped
/// value. Models sensor noise during degradation.
const MOTOR_POWER_WOBBLE: f64 = 0.02;
const MOTOR_SPEED_WOBBLE: f64 = 0.007;
const PUMP_RATE_WOBBLE: f64 = 0.02;
const CASING_FRICTION_WOBBLE: f64 = 0.002;

/// Rounding precision per channel, applied to every value before use.
const MOTOR_POWER_DECIMALS: i32 = 2;
const MOTOR_SPEED_DECIMALS: i32 = 0;
const PUMP_RATE_DECIMALS: i32 = 1;
const TIME_PUMP_ON_DECIMALS: i32 = 2;
const CASING_FRICTION_DECIMALS: i32 = 2;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn round_all(values: &mut [f64], decimals: i32) {
    for value in values {
        *value = round_to(*value, decimals);
    }
}

/// Raw per-channel value sequences for one pump, equal length per state when
/// generated from a profile. The run-time channel may be longer than the
/// others after a gradual-failure ramp; record materialization truncates to
/// the shortest channel.
#[derive(Debug, Clone, Default)]
pub struct PumpChannels {
    pub motor_power_kw: Vec<f64>,
    pub motor_speed: Vec<f64>,
    pub pump_rate: Vec<f64>,
    pub time_pump_on: Vec<f64>,
    pub casing_friction: Vec<f64>,
}

impl PumpChannels {
    /// Sample every channel waveform of `profile` for `sample_size` ticks.
    pub fn from_profile(profile: &PumpStateProfile, sample_size: usize) -> Self {
        let sample = |p: &crate::profiles::ChannelProfile| {
            periodic(sample_size, SAMPLING_RATE, p.frequency, p.amplitude, p.mean)
        };
        Self {
            motor_power_kw: sample(&profile.motor_power_kw),
            motor_speed: sample(&profile.motor_speed),
            pump_rate: sample(&profile.pump_rate),
            time_pump_on: sample(&profile.time_pump_on),
            casing_friction: sample(&profile.casing_friction),
        }
    }

    /// Round every channel to its defined precision. Idempotent.
    pub fn rounded(mut self) -> Self {
        round_all(&mut self.motor_power_kw, MOTOR_POWER_DECIMALS);
        round_all(&mut self.motor_speed, MOTOR_SPEED_DECIMALS);
        round_all(&mut self.pump_rate, PUMP_RATE_DECIMALS);
        round_all(&mut self.time_pump_on, TIME_PUMP_ON_DECIMALS);
        round_all(&mut self.casing_friction, CASING_FRICTION_DECIMALS);
        self
    }

    /// Number of complete records available across all channels.
    pub fn record_len(&self) -> usize {
        self.motor_power_kw
            .len()
            .min(self.motor_speed.len())
            .min(self.pump_rate.len())
            .min(self.time_pump_on.len())
            .min(self.casing_friction.len())
    }

    /// Materialize the ordered record sequence, truncating to the shortest
    /// channel.
    pub fn records(&self) -> Vec<PumpTelemetryRecord> {
        let len = self.record_len();
        (0..len)
            .map(|i| {
                PumpTelemetryRecord::new(
                    self.motor_power_kw[i],
                    self.motor_speed[i],
                    self.pump_rate[i],
                    self.time_pump_on[i],
                    self.casing_friction[i],
                )
            })
            .collect()
    }

    fn extend(&mut self, other: PumpChannels) {
        self.motor_power_kw.extend(other.motor_power_kw);
        self.motor_speed.extend(other.motor_speed);
        self.pump_rate.extend(other.pump_rate);
        self.time_pump_on.extend(other.time_pump_on);
        self.casing_friction.extend(other.casing_friction);
    }
}

/// Walk `transition` ticks from the last normal value toward the first failed
/// value, perturbing each step with a fresh uniform wobble draw.
fn linear_ramp<R: Rng>(
    rng: &mut R,
    last_normal: f64,
    first_failed: f64,
    transition: usize,
    wobble: f64,
) -> Vec<f64> {
    let step = (last_normal - first_failed) / transition as f64;
    let mut last = last_normal;
    let mut ramp = Vec::with_capacity(transition);
    for _ in 0..transition {
        last -= step;
        let band = (last * wobble).abs();
        ramp.push(rng.gen_range(last - band..=last + band));
    }
    ramp
}

/// Run time degrades differently from the linear channels: two concatenated
/// sawtooth halves parameterized by the failed-minus-normal frequency delta
/// and the normal-minus-failed amplitude delta, the first half scaled 1.5x.
/// This yields an accelerating-then-settling pattern over `2 * ceil(t/2) + 2`
/// ticks.
fn run_time_ramp(transition: usize) -> Vec<f64> {
    let half = transition.div_ceil(2) + 1;
    let freq_delta = FAILED_STATE.time_pump_on.frequency - NORMAL_STATE.time_pump_on.frequency;
    let amp_delta = NORMAL_STATE.time_pump_on.amplitude - FAILED_STATE.time_pump_on.amplitude;

    let mut ramp = periodic(half, SAMPLING_RATE, freq_delta * 1.5, amp_delta * 1.5, 0.0);
    ramp.extend(periodic(half, SAMPLING_RATE, freq_delta, amp_delta, 0.0));
    ramp
}

/// Compose normal-state and failed-state channel sequences into a single
/// ordered sequence, optionally bridged by a randomized degradation ramp.
///
/// Both inputs are rounded to channel precision before any interpolation, so
/// the ramp anchors are themselves already rounded. With `transition == 0` the
/// failure is abrupt and the segments concatenate directly.
///
/// Callers must supply non-empty normal and failed sequences when a ramp is
/// requested; the ramp anchors on the last normal and first failed values.
pub fn synthesize<R: Rng>(
    normal: PumpChannels,
    failed: PumpChannels,
    transition: usize,
    rng: &mut R,
) -> Result<PumpChannels> {
    let normal = normal.rounded();
    let failed = failed.rounded();

    let mut composed = normal;
    if transition > 0 {
        let last = |values: &Vec<f64>, channel: &str| -> Result<f64> {
            values
                .last()
                .copied()
                .ok_or_else(|| anyhow!("normal {channel} sequence is empty; cannot anchor ramp"))
        };
        let first = |values: &Vec<f64>, channel: &str| -> Result<f64> {
            values
                .first()
                .copied()
                .ok_or_else(|| anyhow!("failed {channel} sequence is empty; cannot anchor ramp"))
        };

        let mut ramp = PumpChannels {
            motor_power_kw: linear_ramp(
                rng,
                last(&composed.motor_power_kw, "motor power")?,
                first(&failed.motor_power_kw, "motor power")?,
                transition,
                MOTOR_POWER_WOBBLE,
            ),
            motor_speed: linear_ramp(
                rng,
                last(&composed.motor_speed, "motor speed")?,
                first(&failed.motor_speed, "motor speed")?,
                transition,
                MOTOR_SPEED_WOBBLE,
            ),
            pump_rate: linear_ramp(
                rng,
                last(&composed.pump_rate, "pump rate")?,
                first(&failed.pump_rate, "pump rate")?,
                transition,
                PUMP_RATE_WOBBLE,
            ),
            time_pump_on: run_time_ramp(transition),
            casing_friction: linear_ramp(
                rng,
                last(&composed.casing_friction, "casing friction")?,
                first(&failed.casing_friction, "casing friction")?,
                transition,
                CASING_FRICTION_WOBBLE,
            ),
        };
        ramp = ramp.rounded();
        composed.extend(ramp);
    }
    composed.extend(failed);
    Ok(composed)
}

/// Generate the full ordered telemetry sequence for one simulated pump.
///
/// `failure == false` yields `sample_size` normal-state records. Otherwise the
/// sequence is a normal block of `sample_size`, an optional degradation ramp
/// of `fail_over_iterations` ticks, and a failed block of `sample_size`.
pub fn generate_pump_telemetry(
    sample_size: usize,
    failure: bool,
    fail_over_iterations: usize,
    seed: u64,
) -> Result<Vec<PumpTelemetryRecord>> {
    if sample_size == 0 {
        return Err(anyhow!("sample_size must be greater than zero"));
    }
    let normal = PumpChannels::from_profile(&NORMAL_STATE, sample_size);
    if !failure {
        return Ok(normal.rounded().records());
    }

    let failed = PumpChannels::from_profile(&FAILED_STATE, sample_size);
    let mut rng = StdRng::seed_from_u64(seed);
    let composed = synthesize(normal, failed, fail_over_iterations, &mut rng)?;
    Ok(composed.records())
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 40;
    const M: usize = 30;
    const T: usize = 25;

    fn segments() -> (PumpChannels, PumpChannels) {
        (
            PumpChannels::from_profile(&NORMAL_STATE, N),
            PumpChannels::from_profile(&FAILED_STATE, M),
        )
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn abrupt_failure_concatenates_without_ramp() {
        let (normal, failed) = segments();
        let composed = synthesize(normal, failed, 0, &mut rng()).unwrap();
        assert_eq!(composed.motor_power_kw.len(), N + M);
        assert_eq!(composed.motor_speed.len(), N + M);
        assert_eq!(composed.pump_rate.len(), N + M);
        assert_eq!(composed.time_pump_on.len(), N + M);
        assert_eq!(composed.casing_friction.len(), N + M);
        assert_eq!(composed.records().len(), N + M);
    }

    #[test]
    fn gradual_failure_lengths_compose() {
        let (normal, failed) = segments();
        let composed = synthesize(normal, failed, T, &mut rng()).unwrap();
        assert_eq!(composed.motor_power_kw.len(), N + T + M);
        assert_eq!(composed.motor_speed.len(), N + T + M);
        assert_eq!(composed.pump_rate.len(), N + T + M);
        assert_eq!(composed.casing_friction.len(), N + T + M);
        // Run time uses two ceil(T/2)+1 halves.
        assert_eq!(composed.time_pump_on.len(), N + 2 * T.div_ceil(2) + 2 + M);
        // Records truncate to the linear channels.
        assert_eq!(composed.records().len(), N + T + M);
    }

    #[test]
    fn odd_transition_length_still_composes() {
        let (normal, failed) = segments();
        let composed = synthesize(normal, failed, 7, &mut rng()).unwrap();
        assert_eq!(composed.motor_power_kw.len(), N + 7 + M);
        assert_eq!(composed.time_pump_on.len(), N + 2 * 4 + 2 + M);
    }

    #[test]
    fn rounding_is_idempotent() {
        let (normal, failed) = segments();
        let composed = synthesize(normal, failed, T, &mut rng()).unwrap();
        let rounded_again = composed.clone().rounded();
        assert_eq!(composed.motor_power_kw, rounded_again.motor_power_kw);
        assert_eq!(composed.motor_speed, rounded_again.motor_speed);
        assert_eq!(composed.pump_rate, rounded_again.pump_rate);
        assert_eq!(composed.time_pump_on, rounded_again.time_pump_on);
        assert_eq!(composed.casing_friction, rounded_again.casing_friction);
    }

    #[test]
    fn motor_speed_is_integer_valued() {
        let records = generate_pump_telemetry(50, true, 10, 3).unwrap();
        for record in records {
            assert_eq!(record.motor_speed, record.motor_speed.round());
        }
    }

    #[test]
    fn linear_ramp_stays_within_wobble_band() {
        let (normal, failed) = segments();
        let normal = normal.rounded();
        let failed = failed.rounded();
        let last_normal = *normal.motor_power_kw.last().unwrap();
        let first_failed = failed.motor_power_kw[0];
        let step = (last_normal - first_failed) / T as f64;

        let composed = synthesize(normal, failed, T, &mut rng()).unwrap();
        let ramp = &composed.motor_power_kw[N..N + T];
        for (i, value) in ramp.iter().enumerate() {
            let expected = last_normal - step * (i + 1) as f64;
            // Wobble band plus rounding slack for the 2-decimal channel.
            let tolerance = (expected * MOTOR_POWER_WOBBLE).abs() + 0.005 + 1e-9;
            assert!(
                (value - expected).abs() <= tolerance,
                "tick {i}: {value} outside {expected} +/- {tolerance}"
            );
        }
    }

    #[test]
    fn ramp_walks_from_normal_endpoint_toward_failed_start() {
        let (normal, failed) = segments();
        let composed = synthesize(normal, failed, T, &mut rng()).unwrap();
        let last_normal = composed.casing_friction[N - 1];
        let first_failed = composed.casing_friction[N + T];
        let mid = composed.casing_friction[N + T / 2];
        let lo = last_normal.min(first_failed) * 0.95;
        let hi = last_normal.max(first_failed) * 1.05;
        assert!(mid >= lo && mid <= hi, "ramp midpoint {mid} escaped [{lo}, {hi}]");
    }

    #[test]
    fn wobble_draws_are_fresh_per_tick() {
        let (normal, failed) = segments();
        let composed = synthesize(normal, failed, T, &mut rng()).unwrap();
        let ramp = &composed.motor_power_kw[N..N + T];
        let step = ramp[1] - ramp[0];
        let uniform = ramp
            .windows(2)
            .all(|pair| (pair[1] - pair[0] - step).abs() < 1e-9);
        assert!(!uniform, "ramp must not advance by a shared fixed offset");
    }

    #[test]
    fn empty_failed_segment_fails_fast_when_ramping() {
        let normal = PumpChannels::from_profile(&NORMAL_STATE, N);
        let err = synthesize(normal, PumpChannels::default(), T, &mut rng())
            .expect_err("ramp needs a failed anchor");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn no_failure_sequence_is_pure_normal_state() {
        let records = generate_pump_telemetry(120, false, 625, 9).unwrap();
        assert_eq!(records.len(), 120);
        for record in records {
            assert!(record.motor_power_kw >= NORMAL_STATE.motor_power_kw.mean);
            assert!(
                record.motor_power_kw
                    <= NORMAL_STATE.motor_power_kw.mean + NORMAL_STATE.motor_power_kw.amplitude
            );
        }
    }

    #[test]
    fn same_seed_reproduces_the_sequence() {
        let a = generate_pump_telemetry(60, true, 15, 1234).unwrap();
        let b = generate_pump_telemetry(60, true, 15, 1234).unwrap();
        assert_eq!(a, b);
    }
}
