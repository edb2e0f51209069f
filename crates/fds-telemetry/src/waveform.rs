//! ---
//! fds_section: "02-telemetry-generation"
//! fds_subsection: "module"
//! fds_type: "source"
//! fds_scope: "code"
//! fds_description: "Periodic waveform sampling primitives."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---

/// Sample a periodic sawtooth waveform.
///
/// Each sample advances a running phase by `frequency / sampling_rate *
/// amplitude` and wraps it back into `[0, amplitude)`, so the output ramps
/// from `mean` to `mean + amplitude` with `sampling_rate / frequency` samples
/// per period. Pure function, no state.
///
/// A non-positive phase step (zero/negative `frequency` or `amplitude`) cannot
/// describe a periodic signal; the output degenerates to a constant sequence
/// at `mean`.
pub fn periodic(
    length: usize,
    sampling_rate: f64,
    frequency: f64,
    amplitude: f64,
    mean: f64,
) -> Vec<f64> {
    let step = frequency / sampling_rate * amplitude;
    if !(step > 0.0) {
        return vec![mean; length];
    }

    let mut data = Vec::with_capacity(length);
    let mut phase = 0.0_f64;
    let mut k = 0_u64;
    for _ in 0..length {
        let mut x = phase + k as f64 * step;
        if x >= amplitude {
            x %= amplitude;
            phase = x;
            k = 0;
        }
        data.push(mean + x);
        k += 1;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_within_amplitude_band() {
        let wave = periodic(1_000, 100.0, 2.0, 5.0, 40.0);
        assert_eq!(wave.len(), 1_000);
        for value in &wave {
            assert!(*value >= 40.0 && *value < 45.0, "value {value} out of band");
        }
    }

    #[test]
    fn wraps_at_period_boundary() {
        // frequency 10 @ sampling rate 100 -> period of 10 samples.
        let wave = periodic(25, 100.0, 10.0, 1.0, 0.0);
        assert_eq!(wave[0], 0.0);
        assert!((wave[1] - 0.1).abs() < 1e-12);
        assert!((wave[10] - wave[0]).abs() < 1e-12, "phase wraps after one period");
        assert!((wave[11] - wave[1]).abs() < 1e-12);
    }

    #[test]
    fn degenerate_step_yields_constant_mean() {
        assert_eq!(periodic(4, 100.0, 0.0, 5.0, 7.5), vec![7.5; 4]);
        assert_eq!(periodic(4, 100.0, 2.0, -1.0, 7.5), vec![7.5; 4]);
    }

    #[test]
    fn empty_request_yields_empty_sequence() {
        assert!(periodic(0, 100.0, 2.0, 5.0, 0.0).is_empty());
    }
}
