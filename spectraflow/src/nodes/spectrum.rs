use std::any::Any;
use std::f64::consts::TAU;

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::dsp::mean;
use crate::error::{EngineError, Result};
use crate::node::{Node, NodeCore, PortSpec};
use crate::types::{Kind, SpectrumFrame, Value};

const PARAMETERS: &[PortSpec] = &[
    ("freq_range", Kind::Real),
    ("fft_size_factor", Kind::Scalar),
];
const INPUTS: &[PortSpec] = &[("value", Kind::Real), ("fs", Kind::Scalar)];
const OUTPUTS: &[PortSpec] = &[
    ("f_plot", Kind::Real),
    ("P1_plot", Kind::Real),
    ("freq_range", Kind::Real),
    ("frame", Kind::Spectrum),
];

/// Zoom-FFT magnitude spectrum of the current window over a frequency
/// band: the signal is heterodyned down by the band's centre frequency,
/// transformed at `next_pow2(n) * fft_size_factor` points and only the
/// bins inside the band are kept.  High relative resolution in a narrow
/// band without oversampling.
pub struct SpectrumNode {
    core: NodeCore,
}

impl SpectrumNode {
    pub fn new(name: &str) -> Self {
        let mut core = NodeCore::new(name);
        core.store_parameter("freq_range", Value::Real(vec![0.0, 0.001]));
        core.store_parameter("fft_size_factor", Value::Scalar(8.0));
        Self { core }
    }
}

fn zoom_fft(value: &[f64], fs: f64, fmin: f64, fmax: f64, factor: usize) -> (Vec<f64>, Vec<f64>) {
    let n = value.len();
    let offset = mean(value);
    let centre = (fmin + fmax) / 2.0;
    let m = n.next_power_of_two() * factor;
    let mut buffer: Vec<Complex64> = value
        .iter()
        .enumerate()
        .map(|(k, &v)| Complex64::from_polar(1.0, -TAU * centre * k as f64 / fs) * (v - offset))
        .collect();
    buffer.resize(m, Complex64::default());
    FftPlanner::new().plan_fft_forward(m).process(&mut buffer);
    // fftshift puts the centre frequency in the middle of the axis
    let half = m / 2;
    let mut freqs = Vec::new();
    let mut mags = Vec::new();
    for i in 0..m {
        let freq = (i as f64 - half as f64) * fs / m as f64 + centre;
        if freq >= fmin && freq <= fmax {
            let bin = (i + half) % m;
            freqs.push(freq.max(f64::MIN_POSITIVE));
            mags.push((buffer[bin].norm() / n as f64).max(f64::MIN_POSITIVE));
        }
    }
    (freqs, mags)
}

impl Node for SpectrumNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn parameter_ports(&self) -> &'static [PortSpec] {
        PARAMETERS
    }

    fn input_ports(&self) -> &'static [PortSpec] {
        INPUTS
    }

    fn output_ports(&self) -> &'static [PortSpec] {
        OUTPUTS
    }

    fn execute(&mut self) -> Result<()> {
        let name = self.core.name().to_string();
        let value = self.core.real_input("value")?;
        let fs = self.core.scalar_input("fs")?;
        let range = self.core.real_parameter("freq_range")?;
        if range.len() != 2 {
            return Err(EngineError::validation(&name, format!("freq_range must hold [fmin, fmax], got {} entries", range.len())));
        }
        let (fmin, fmax) = (range[0], range[1]);
        if !(0.0 <= fmin && fmin < fmax && fmax <= fs / 2.0) {
            return Err(EngineError::validation(
                &name,
                format!("freq_range must satisfy 0 <= fmin < fmax <= fs/2 = {}, got ({fmin}, {fmax})", fs / 2.0),
            ));
        }
        let factor = self.core.scalar_parameter("fft_size_factor")?;
        if factor < 1.0 || factor.fract() != 0.0 {
            return Err(EngineError::validation(&name, format!("fft_size_factor must be a positive integer, got {factor}")));
        }
        if value.is_empty() {
            return Err(EngineError::validation(&name, "input window is empty"));
        }
        let (freqs, mags) = zoom_fft(value, fs, fmin, fmax, factor as usize);
        debug!("zoom fft: {} bins inside ({fmin}, {fmax}) Hz", freqs.len());
        self.core.set_output("f_plot", Value::Real(freqs.clone()));
        self.core.set_output("P1_plot", Value::Real(mags.clone()));
        self.core.set_output("freq_range", Value::Real(vec![fmin, fmax]));
        self.core
            .set_output("frame", Value::Spectrum(SpectrumFrame::new(freqs, mags, (fmin, fmax))));
        self.core.mark_clean();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn fed(values: Vec<f64>, fs: f64) -> SpectrumNode {
        let mut node = SpectrumNode::new("spectrum");
        node.set_input("value", Value::Real(values)).unwrap();
        node.set_input("fs", Value::Scalar(fs)).unwrap();
        node
    }

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|k| (TAU * freq * k as f64 / fs).sin()).collect()
    }

    #[test]
    fn peak_lands_within_one_bin_of_the_tone() {
        let mut node = fed(sine(0.01, 1.0, 1000), 1.0);
        node.set_parameter("freq_range", Value::Real(vec![0.005, 0.02])).unwrap();
        node.execute().unwrap();
        let freqs = node.core().output("f_plot").unwrap().as_real().unwrap().to_vec();
        let mags = node.core().output("P1_plot").unwrap().as_real().unwrap().to_vec();
        assert_eq!(freqs.len(), mags.len());
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(ix, _)| ix)
            .unwrap();
        let m = 1000usize.next_power_of_two() * 8;
        let bin = 1.0 / m as f64;
        assert!((freqs[peak] - 0.01).abs() <= bin, "peak at {}", freqs[peak]);
    }

    #[test]
    fn axis_is_confined_to_the_band() {
        let mut node = fed(sine(0.01, 1.0, 256), 1.0);
        node.set_parameter("freq_range", Value::Real(vec![0.004, 0.03])).unwrap();
        node.execute().unwrap();
        let freqs = node.core().output("f_plot").unwrap().as_real().unwrap();
        assert!(freqs.iter().all(|&f| (0.004..=0.03).contains(&f)));
        assert!(!freqs.is_empty());
    }

    #[test]
    fn silent_windows_clamp_to_epsilon() {
        let mut node = fed(vec![0.0; 128], 1.0);
        node.set_parameter("freq_range", Value::Real(vec![0.0, 0.1])).unwrap();
        node.execute().unwrap();
        let mags = node.core().output("P1_plot").unwrap().as_real().unwrap();
        assert!(mags.iter().all(|&p| p >= f64::MIN_POSITIVE));
        // logarithms of the clamped values stay finite for plotting
        assert!(mags.iter().all(|&p| p.log10().is_finite()));
    }

    #[test]
    fn degenerate_bands_are_rejected() {
        let mut node = fed(sine(0.01, 1.0, 128), 1.0);
        node.set_parameter("freq_range", Value::Real(vec![0.02, 0.02])).unwrap();
        assert!(matches!(node.execute().unwrap_err(), EngineError::Validation { .. }));
        node.set_parameter("freq_range", Value::Real(vec![0.0, 0.6])).unwrap();
        assert!(matches!(node.execute().unwrap_err(), EngineError::Validation { .. }));
    }

    #[test]
    fn bundled_frame_matches_the_flat_ports() {
        let mut node = fed(sine(0.02, 1.0, 200), 1.0);
        node.set_parameter("freq_range", Value::Real(vec![0.01, 0.05])).unwrap();
        node.execute().unwrap();
        let frame = node.core().output("frame").unwrap().as_spectrum().unwrap().clone();
        let freqs = node.core().output("f_plot").unwrap().as_real().unwrap();
        assert_eq!(frame.freqs, freqs);
        assert_eq!(frame.band, (0.01, 0.05));
    }
}
