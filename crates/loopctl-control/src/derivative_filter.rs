//! First-order low-pass filter for the derivative term.
//!
//! The filter operates on the raw, unscaled derivative of the error.  The
//! derivative gain is applied afterwards by the PID core, so a gain change
//! never disturbs the filter state.

/// Smoothing factor for one step of length `dt`.
///
/// `0` holds the previous value (non-positive `dt`); `1` passes the raw value
/// through (filtering disabled).
pub fn smoothing_factor(dt: f64, filter_time: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if filter_time <= 0.0 {
        1.0
    } else {
        dt / (filter_time + dt)
    }
}

/// Filter `raw` against `previous`, returning the new filtered derivative.
pub fn filter(raw: f64, dt: f64, filter_time: f64, previous: f64) -> f64 {
    let alpha = smoothing_factor(dt, filter_time);
    (1.0 - alpha) * previous + alpha * raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_filter_time_passes_raw_value() {
        assert_eq!(filter(10.0, 1.0, 0.0, 3.0), 10.0);
    }

    #[test]
    fn non_positive_dt_holds_previous() {
        assert_eq!(filter(10.0, 0.0, 0.5, 3.0), 3.0);
        assert_eq!(filter(10.0, -1.0, 0.0, 3.0), 3.0);
    }

    #[test]
    fn alpha_follows_time_constant() {
        // dt == filter_time → alpha = 0.5
        assert!((smoothing_factor(0.2, 0.2) - 0.5).abs() < 1e-12);
        assert!((filter(4.0, 0.2, 0.2, 0.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn converges_to_constant_input() {
        let mut y = 0.0;
        for _ in 0..200 {
            y = filter(5.0, 0.1, 1.0, y);
        }
        assert!((y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn attenuates_single_spike() {
        let y = filter(100.0, 0.01, 0.1, 0.0);
        assert!(y < 10.0);
    }
}
