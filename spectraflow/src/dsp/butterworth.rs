//! Butterworth low-pass design and zero-phase application.
//!
//! The design path mirrors the classical recipe: analog prototype poles on
//! the unit half-circle, cutoff pre-warp, bilinear transform, then real
//! polynomial coefficients.  Zero-phase filtering runs the filter forward
//! and backward over an odd-reflected extension of the signal with
//! steady-state initial conditions, so short windows keep sensible edges.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::error::{EngineError, Result};

/// Transfer-function coefficients `(b, a)` of a Butterworth low-pass of the
/// given order, for a normalized cutoff `wn` in (0, 1) where 1 is Nyquist.
pub(crate) fn butter_lowpass(order: usize, wn: f64) -> (Vec<f64>, Vec<f64>) {
    debug_assert!(order >= 1, "order must be positive");
    debug_assert!(wn > 0.0 && wn < 1.0, "cutoff must be inside (0, Nyquist)");
    // analog prototype: poles equally spaced on the left unit half-circle
    let n = order as i32;
    let mut poles: Vec<Complex64> = (0..order)
        .map(|k| {
            let m = (-n + 1 + 2 * k as i32) as f64;
            -(Complex64::i() * PI * m / (2.0 * n as f64)).exp()
        })
        .collect();
    // pre-warp the cutoff and scale the prototype
    let fs = 2.0;
    let warped = 2.0 * fs * (PI * wn / fs).tan();
    for pole in poles.iter_mut() {
        *pole *= warped;
    }
    let gain = warped.powi(n);
    // bilinear transform; the digital zeros all land at -1
    let fs2 = 2.0 * fs;
    let digital: Vec<Complex64> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let denom: Complex64 = poles.iter().map(|&p| fs2 - p).product();
    let gain = gain * (Complex64::new(1.0, 0.0) / denom).re;
    let zeros = vec![Complex64::new(-1.0, 0.0); order];
    let b = poly(&zeros).iter().map(|c| c.re * gain).collect();
    let a = poly(&digital).iter().map(|c| c.re).collect();
    (b, a)
}

/// Monic polynomial coefficients from its roots, highest power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs
}

/// Direct-form II transposed IIR filter.  `state` holds the filter delay
/// line (order entries) and is updated in place.  Assumes `a[0] == 1`.
pub(crate) fn lfilter(b: &[f64], a: &[f64], x: &[f64], state: &mut [f64]) -> Vec<f64> {
    let order = state.len();
    let mut y = Vec::with_capacity(x.len());
    for &xk in x {
        let yk = b[0] * xk + state.first().copied().unwrap_or(0.0);
        for i in 0..order {
            let carry = if i + 1 < order { state[i + 1] } else { 0.0 };
            state[i] = b.get(i + 1).copied().unwrap_or(0.0) * xk + carry
                - a.get(i + 1).copied().unwrap_or(0.0) * yk;
        }
        y.push(yk);
    }
    y
}

/// Initial delay-line state matching the steady-state response to a unit
/// step, so a constant signal passes through without a transient.
pub(crate) fn lfilter_zi(b: &[f64], a: &[f64]) -> Vec<f64> {
    let taps = a.len().max(b.len());
    let order = taps - 1;
    let mut apad = vec![0.0; taps];
    let mut bpad = vec![0.0; taps];
    apad[..a.len()].copy_from_slice(a);
    bpad[..b.len()].copy_from_slice(b);
    // I minus the transposed companion matrix of a
    let mut matrix = vec![vec![0.0; order]; order];
    for i in 0..order {
        matrix[i][i] = 1.0;
        matrix[i][0] += apad[i + 1];
        if i + 1 < order {
            matrix[i][i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (1..taps).map(|i| bpad[i] - apad[i] * bpad[0]).collect();
    solve(matrix, rhs)
}

/// Gaussian elimination with partial pivoting for the small, well-formed
/// systems produced by [lfilter_zi].
fn solve(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Vec<f64> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().partial_cmp(&m[j][col].abs()).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or(col);
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        let lead = m[col][col];
        for row in col + 1..n {
            let factor = m[row][col] / lead;
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for k in row + 1..n {
            acc -= m[row][k] * x[k];
        }
        x[row] = acc / m[row][row];
    }
    x
}

/// Zero-phase filtering: forward pass, reverse, forward again, reverse.
pub(crate) fn filtfilt(b: &[f64], a: &[f64], x: &[f64], node: &str) -> Result<Vec<f64>> {
    let a0 = a[0];
    let b: Vec<f64> = b.iter().map(|v| v / a0).collect();
    let a: Vec<f64> = a.iter().map(|v| v / a0).collect();
    let taps = a.len().max(b.len());
    let edge = 3 * (taps - 1);
    let n = x.len();
    if n <= edge {
        return Err(EngineError::validation(
            node,
            format!("signal of {n} samples is too short for order-{} zero-phase filtering", taps - 1),
        ));
    }
    // odd extension about both end points
    let first = x[0];
    let last = x[n - 1];
    let mut ext = Vec::with_capacity(n + 2 * edge);
    for i in (1..=edge).rev() {
        ext.push(2.0 * first - x[i]);
    }
    ext.extend_from_slice(x);
    for i in 1..=edge {
        ext.push(2.0 * last - x[n - 1 - i]);
    }
    let zi = lfilter_zi(&b, &a);
    let mut state: Vec<f64> = zi.iter().map(|z| z * ext[0]).collect();
    let forward = lfilter(&b, &a, &ext, &mut state);
    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let mut state: Vec<f64> = zi.iter().map(|z| z * reversed[0]).collect();
    let backward = lfilter(&b, &a, &reversed, &mut state);
    let mut y: Vec<f64> = backward.into_iter().rev().collect();
    y.drain(..edge);
    y.truncate(n);
    Ok(y)
}

#[cfg(test)]
mod tests {

    use std::f64::consts::TAU;

    use super::*;

    fn close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tol, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn second_order_half_band_coefficients() {
        // classical reference values for butter(2, 0.5)
        let (b, a) = butter_lowpass(2, 0.5);
        close(&b, &[0.2928932188134524, 0.5857864376269048, 0.2928932188134524], 1e-12);
        close(&a, &[1.0, 0.0, 0.1715728752538099], 1e-12);
    }

    #[test]
    fn dc_gain_is_unity() {
        for order in [1, 2, 4, 6] {
            let (b, a) = butter_lowpass(order, 0.1);
            let gain = b.iter().sum::<f64>() / a.iter().sum::<f64>();
            assert!((gain - 1.0).abs() < 1e-9, "order {order}: {gain}");
        }
    }

    #[test]
    fn steady_state_passes_constants_exactly() {
        let (b, a) = butter_lowpass(4, 0.2);
        let x = vec![3.25; 50];
        let zi = lfilter_zi(&b, &a);
        let mut state: Vec<f64> = zi.iter().map(|z| z * x[0]).collect();
        let y = lfilter(&b, &a, &x, &mut state);
        close(&y, &x, 1e-9);
    }

    #[test]
    fn filtfilt_preserves_constants_and_length() {
        let (b, a) = butter_lowpass(4, 0.1);
        let x = vec![-1.5; 200];
        let y = filtfilt(&b, &a, &x, "test").unwrap();
        close(&y, &x, 1e-9);
    }

    #[test]
    fn filtfilt_attenuates_out_of_band_tones() {
        let (b, a) = butter_lowpass(4, 0.1); // cutoff 0.05 Hz at fs = 1 Hz
        let n = 1000;
        let low: Vec<f64> = (0..n).map(|k| (TAU * 0.01 * k as f64).sin()).collect();
        let high: Vec<f64> = (0..n).map(|k| (TAU * 0.4 * k as f64).sin()).collect();
        let mixed: Vec<f64> = low.iter().zip(&high).map(|(l, h)| l + h).collect();
        let y = filtfilt(&b, &a, &mixed, "test").unwrap();
        assert_eq!(y.len(), n);
        let power = |xs: &[f64], f: f64| {
            let (mut re, mut im) = (0.0, 0.0);
            for (k, &v) in xs.iter().enumerate() {
                re += v * (TAU * f * k as f64).cos();
                im += v * (TAU * f * k as f64).sin();
            }
            (re * re + im * im).sqrt() * 2.0 / xs.len() as f64
        };
        // the 0.4 Hz tone drops by more than 40 dB, the passband survives
        assert!(power(&y, 0.4) / power(&mixed, 0.4) < 0.01);
        assert!(power(&y, 0.01) / power(&mixed, 0.01) > 0.9);
    }

    #[test]
    fn short_signals_are_rejected() {
        let (b, a) = butter_lowpass(4, 0.2);
        let err = filtfilt(&b, &a, &[1.0; 10], "test").unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }
}
