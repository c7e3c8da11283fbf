//! Bounce scheduling: deferring an eligible task without marking it started.

use rand::Rng;

/// Base back-off unit, in seconds. See [`new_bounce_time`].
pub const BOUNCE_BASE_SECONDS: i64 = 5;

/// Draw the next `time.bounced` deadline.
///
/// Triangular distribution on `[now + B, now + B + bounced * B]` where
/// `B = BOUNCE_BASE_SECONDS`, mode at the midpoint — matching
/// `random.triangular(low, high)` with no explicit mode, whose documented
/// default is `(low + high) / 2`. A small, fixed minimum delay before a
/// bounced task is reconsidered, widening for tasks that have bounced
/// repeatedly, but without committing to exponential growth.
///
/// `bounced` is the bounce count *before* this call increments it.
pub fn new_bounce_time(now: i64, bounced: u32) -> i64 {
    let low = now + BOUNCE_BASE_SECONDS;
    let width = BOUNCE_BASE_SECONDS * i64::from(bounced);
    if width == 0 {
        return low;
    }
    let high = low + width;
    let low_f = low as f64;
    let high_f = high as f64;
    let mode_f = low_f + (high_f - low_f) / 2.0;

    // Inverse-CDF sampling of Triangular(low, high, mode): draw u uniformly,
    // split at the CDF value of `mode`, invert whichever half u landed in.
    let mut rng = rand::rng();
    let u: f64 = rng.random();
    let split = (mode_f - low_f) / (high_f - low_f);
    let offset = if u < split {
        ((high_f - low_f) * (mode_f - low_f) * u).sqrt()
    } else {
        (high_f - low_f) - ((high_f - low_f) * (high_f - mode_f) * (1.0 - u)).sqrt()
    };
    low + offset.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_bounce_has_no_width() {
        let t = new_bounce_time(1_700_000_000, 0);
        assert_eq!(t, 1_700_000_005);
    }

    #[test]
    fn repeated_bounce_widens_the_window() {
        for _ in 0..200 {
            let t = new_bounce_time(1_700_000_000, 2);
            assert!(t >= 1_700_000_005);
            assert!(t <= 1_700_000_015);
        }
    }

    #[test]
    fn is_symmetric_about_the_midpoint() {
        let samples: Vec<i64> = (0..1000).map(|_| new_bounce_time(0, 10)).collect();
        let mean: f64 = samples.iter().sum::<i64>() as f64 / samples.len() as f64;
        // Triangular(low=5, high=55, mode=30) has mean (5+55+30)/3 = 30,
        // matching `random.triangular(low, high)`'s documented default mode
        // at the midpoint.
        assert!((mean - 30.0).abs() < 3.0, "mean {mean} should sit near the midpoint 30");
    }
}
