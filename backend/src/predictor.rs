//! # predictor (C6) — PanTiltPredictor
//!
//! Given four calibrated `(x, y, pan, tilt)` reference anchors, solves for
//! the light's physical position `(Lx, Ly, h)` by nonlinear least squares,
//! then forward-projects arbitrary stage coordinates to `(pan, tilt)`.
//!
//! The optimizer is a small Gauss-Newton solver with box projection — the
//! pack's dependency set carries no bound-constrained NLS crate, and the
//! design notes call this adequate for a four-residual problem. It is
//! grounded in `trilateration.rs`'s Gauss-Newton-over-normal-equations
//! shape (per-unknown 2×2 solve there; here a single 3×3 solve over
//! `(Lx, Ly, h)` with a numerically differentiated Jacobian, since the
//! forward model's angular residuals don't reduce to a closed-form
//! derivative as cleanly as range residuals do).

use crate::error::SpotlightError;

/// One calibrated reference point: a known stage coordinate and the
/// (possibly overshoot-corrected) pan/tilt observed there.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
    /// Observed pan, degrees, in `[-270, 270]` (fixture's mechanical range).
    pub pan_deg: f64,
    /// Observed tilt, degrees, in `[0, 90]`.
    pub tilt_deg: f64,
}

pub struct PanTiltPredictor {
    lx: f64,
    ly: f64,
    h: f64,
}

const MAX_ITER: usize = 10_000;
const CONVERGE_TOL: f64 = 1e-10;
const JACOBIAN_EPS: f64 = 1e-6;

impl PanTiltPredictor {
    /// Solve for the light position from exactly four anchors.
    pub fn solve(anchors: &[Anchor; 4]) -> Result<Self, SpotlightError> {
        let xs = anchors.map(|a| a.x);
        let ys = anchors.map(|a| a.y);
        let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let bounds = [(min_x - 10.0, max_x + 10.0), (min_y - 10.0, max_y + 10.0), (1.0, 100.0)];
        let mut p = [(min_x + max_x) / 2.0, (min_y + max_y) / 2.0, 10.0];

        let observed: Vec<(f64, f64)> =
            anchors.iter().map(|a| (normalize_pan_for_fit(a.pan_deg), a.tilt_deg)).collect();

        let mut converged = false;
        for _ in 0..MAX_ITER {
            let r0 = residuals(&p, anchors, &observed);
            let jacobian = numeric_jacobian(&p, anchors, &observed, &r0);

            let mut jtj = [[0.0; 3]; 3];
            let mut jtr = [0.0; 3];
            for (row, r) in r0.iter().enumerate() {
                for a in 0..3 {
                    jtr[a] += jacobian[row][a] * r;
                    for b in 0..3 {
                        jtj[a][b] += jacobian[row][a] * jacobian[row][b];
                    }
                }
            }

            let rhs = [-jtr[0], -jtr[1], -jtr[2]];
            let delta = match solve3(jtj, rhs) {
                Some(d) => d,
                None => break,
            };

            for k in 0..3 {
                p[k] = (p[k] + delta[k]).clamp(bounds[k].0, bounds[k].1);
            }

            let step_norm = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
            if step_norm < CONVERGE_TOL {
                converged = true;
                break;
            }
        }

        if !converged {
            return Err(SpotlightError::SolverFailed { reason: "did not converge".into() });
        }
        if p[2] <= 0.0 {
            return Err(SpotlightError::SolverFailed { reason: format!("non-positive height h={}", p[2]) });
        }

        Ok(Self { lx: p[0], ly: p[1], h: p[2] })
    }

    /// Solved light position in feet.
    pub fn light_position(&self) -> (f64, f64, f64) {
        (self.lx, self.ly, self.h)
    }

    /// Forward-project a stage coordinate to `(pan, tilt)`, pan remapped
    /// into `[-270, 270]`.
    pub fn predict(&self, x: f64, y: f64) -> (f64, f64) {
        let (pan_0_360, tilt) = forward_project(self.lx, self.ly, self.h, x, y);
        let pan = if pan_0_360 > 270.0 { pan_0_360 - 360.0 } else { pan_0_360 };
        (pan, tilt)
    }
}

fn normalize_pan_for_fit(pan_deg: f64) -> f64 {
    if pan_deg < 0.0 {
        pan_deg + 360.0
    } else {
        pan_deg
    }
}

/// `pan` in `[0, 360)`, `tilt` in `[0, 90]`.
fn forward_project(lx: f64, ly: f64, h: f64, x: f64, y: f64) -> (f64, f64) {
    let dx = x - lx;
    let dy = y - ly;
    let dist = (dx * dx + dy * dy).sqrt();
    let pan = dy.atan2(dx).to_degrees().rem_euclid(360.0);
    let tilt = (dist / h).atan().to_degrees();
    (pan, tilt)
}

/// Angular-unit-vector + tilt residual vector: 3 components per anchor
/// (cos diff, sin diff, tilt diff), avoiding the wrap discontinuity a raw
/// angle difference would hit.
fn residuals(p: &[f64; 3], anchors: &[Anchor; 4], observed: &[(f64, f64)]) -> Vec<f64> {
    let (lx, ly, h) = (p[0], p[1], p[2]);
    let mut out = Vec::with_capacity(anchors.len() * 3);
    for (a, &(pan_obs, tilt_obs)) in anchors.iter().zip(observed) {
        let (pan_calc, tilt_calc) = forward_project(lx, ly, h, a.x, a.y);
        let pan_calc_rad = pan_calc.to_radians();
        let pan_obs_rad = pan_obs.to_radians();
        out.push(pan_calc_rad.cos() - pan_obs_rad.cos());
        out.push(pan_calc_rad.sin() - pan_obs_rad.sin());
        out.push(tilt_calc - tilt_obs);
    }
    out
}

fn numeric_jacobian(
    p: &[f64; 3],
    anchors: &[Anchor; 4],
    observed: &[(f64, f64)],
    r0: &[f64],
) -> Vec<[f64; 3]> {
    let mut jacobian = vec![[0.0; 3]; r0.len()];
    for k in 0..3 {
        let mut perturbed = *p;
        perturbed[k] += JACOBIAN_EPS;
        let r1 = residuals(&perturbed, anchors, observed);
        for row in 0..r0.len() {
            jacobian[row][k] = (r1[row] - r0[row]) / JACOBIAN_EPS;
        }
    }
    jacobian
}

/// Solve a 3×3 linear system via Gaussian elimination with partial
/// pivoting. `None` if the system is (near-)singular.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot_row = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot_row][col].abs() < 1e-14 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let sum: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - sum) / a[row][row];
    }
    Some(x)
}
