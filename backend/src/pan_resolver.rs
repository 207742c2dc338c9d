//! # pan_resolver (C5)
//!
//! Two independent, pure responsibilities: (a) resolving an arbitrary target
//! pan to the mechanically nearest in-range 360°-equivalent, and (b) the
//! direction-dependent overshoot correction applied once when a calibration
//! anchor is captured. Neither touches I/O — grounded in the normal-equation
//! style of `trilateration.rs`'s solver math, scaled down to closed-form
//! arithmetic since both problems here have exact solutions.

use crate::error::SpotlightError;

/// Overshoot model constants, fit from measured mechanical backlash.
const K1: f64 = 1.5728;
const K2: f64 = -0.0187;
const K3: f64 = 6.30e-5;

/// Find the representative of `{target + 360k : k ∈ ℤ}` that lies in
/// `[min, max]` and minimizes `|candidate - current|`, breaking ties toward
/// the candidate nearer zero, and remaining ties (equal absolute value,
/// e.g. ±180°) toward the positive candidate.
pub fn nearest_pan(target: f64, current: f64, (min, max): (f64, f64)) -> Result<f64, SpotlightError> {
    if min > max {
        return Err(SpotlightError::Unreachable { target, min, max });
    }

    // k such that target + 360k ∈ [min, max]:
    //   k ∈ [(min - target) / 360, (max - target) / 360]
    let k_lo = ((min - target) / 360.0).ceil() as i64;
    let k_hi = ((max - target) / 360.0).floor() as i64;

    if k_lo > k_hi {
        return Err(SpotlightError::Unreachable { target, min, max });
    }

    let mut best: Option<f64> = None;
    for k in k_lo..=k_hi {
        let candidate = target + 360.0 * k as f64;
        best = Some(match best {
            None => candidate,
            Some(b) => {
                let d_candidate = (candidate - current).abs();
                let d_best = (b - current).abs();
                if d_candidate < d_best {
                    candidate
                } else if d_candidate > d_best {
                    b
                } else if candidate.abs() < b.abs() {
                    candidate
                } else if candidate.abs() > b.abs() {
                    b
                } else if candidate > b {
                    candidate
                } else {
                    b
                }
            }
        });
    }

    best.ok_or(SpotlightError::Unreachable { target, min, max })
}

/// Correct a raw pan captured mid-sweep for mechanical overshoot. Applied
/// only when storing a calibration anchor (C7 CALCULATE), never at command
/// time.
pub fn overshoot_correct(raw_pan: f64, tilt: f64, direction: i8) -> f64 {
    let direction = direction as f64;
    raw_pan - direction * (K1 * tilt + K2 * tilt * tilt + K3 * tilt * raw_pan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_wrap_picks_nearest_in_range_candidate() {
        // range (-270,270), current +260, target -100.
        // In-range candidates: {-100, +260}; nearest to +260 is +260.
        let resolved = nearest_pan(-100.0, 260.0, (-270.0, 270.0)).unwrap();
        assert_eq!(resolved, 260.0);
    }

    #[test]
    fn pan_wrap_equal_distance_tie_prefers_positive_candidate() {
        // current exactly between -180 and +180 in a [-270, 270] range:
        // target 180, current 0 → both -180 and 180 are 180 away, and both
        // have the same absolute value, so the distance and nearer-zero
        // tie-breaks both leave it ambiguous; the positive one wins.
        let resolved = nearest_pan(180.0, 0.0, (-270.0, 270.0)).unwrap();
        assert_eq!(resolved, 180.0);
    }

    #[test]
    fn pan_wrap_unreachable_outside_range() {
        let err = nearest_pan(10.0, 0.0, (20.0, 30.0)).unwrap_err();
        assert!(matches!(err, SpotlightError::Unreachable { .. }));
    }

    #[test]
    fn overshoot_matches_worked_example() {
        // raw_pan=100, tilt=50, direction=+1 → corrected ≈ 67.80
        let corrected = overshoot_correct(100.0, 50.0, 1);
        assert!((corrected - 67.80).abs() < 0.01, "got {corrected}");
    }

    #[test]
    fn overshoot_direction_flips_sign_of_adjustment() {
        let plus = overshoot_correct(100.0, 50.0, 1);
        let minus = overshoot_correct(100.0, 50.0, -1);
        assert!((plus + minus - 200.0).abs() < 1e-9);
    }
}
