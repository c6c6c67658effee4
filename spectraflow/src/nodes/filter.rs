use std::any::Any;

use strum_macros::{Display, FromRepr};

use crate::dsp::{butter_lowpass, filtfilt, interp_linear, linspace, mean};
use crate::error::{EngineError, Result};
use crate::node::{Node, NodeCore, PortSpec};
use crate::types::{Kind, Value};

/// Selects the smoothing algorithm applied by [FilterNode].
#[derive(Clone, Copy, Debug, Display, Eq, FromRepr, PartialEq)]
#[repr(u8)]
pub enum FilterType {
    MeanDownsample = 1,
    LowPass = 2,
}

const PARAMETERS: &[PortSpec] = &[
    ("enable", Kind::Bool),
    ("filter_type", Kind::Scalar),
    ("window", Kind::Scalar),
    ("cutoff_freq", Kind::Scalar),
    ("filter_order", Kind::Scalar),
];
const INPUTS: &[PortSpec] = &[
    ("time", Kind::Time),
    ("value", Kind::Real),
    ("fs", Kind::Scalar),
];
const OUTPUTS: &[PortSpec] = &[
    ("time", Kind::Time),
    ("value", Kind::Real),
    ("fs", Kind::Scalar),
    ("is_filtered", Kind::Bool),
    ("filter_type", Kind::Scalar),
    ("filter_info", Kind::Text),
];

/// Optional smoothing stage: pass-through, mean-downsample-and-resample,
/// or Butterworth zero-phase low-pass.  The signal length never changes.
pub struct FilterNode {
    core: NodeCore,
}

impl FilterNode {
    pub fn new(name: &str) -> Self {
        let mut core = NodeCore::new(name);
        core.store_parameter("enable", Value::Bool(false));
        core.store_parameter("filter_type", Value::Scalar(FilterType::MeanDownsample as u8 as f64));
        core.store_parameter("window", Value::Scalar(5.0));
        core.store_parameter("cutoff_freq", Value::Scalar(0.01));
        core.store_parameter("filter_order", Value::Scalar(4.0));
        Self { core }
    }
}

/// Block means of width `window`, the last block absorbing the tail, then
/// linear interpolation of the means back onto the original sample grid.
/// Preserves the sample count, not the frequency content.
fn mean_downsample_resample(value: &[f64], window: usize) -> Vec<f64> {
    let n = value.len();
    let blocks = n / window;
    if blocks <= 1 {
        return vec![mean(value); n];
    }
    let mut means = Vec::with_capacity(blocks);
    for i in 0..blocks {
        let lo = i * window;
        let hi = if i + 1 == blocks { n } else { lo + window };
        means.push(mean(&value[lo..hi]));
    }
    let knots = linspace(1.0, n as f64, blocks);
    let grid: Vec<f64> = (1..=n).map(|i| i as f64).collect();
    interp_linear(&knots, &means, &grid)
}

impl Node for FilterNode {
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
        let time = self.core.time_input("time")?.to_vec();
        let value = self.core.real_input("value")?.to_vec();
        let fs = self.core.scalar_input("fs")?;
        let enable = self.core.bool_parameter("enable")?;
        let type_code = self.core.scalar_parameter("filter_type")?;
        let filter_type = FilterType::from_repr(type_code as u8).filter(|_| type_code.fract() == 0.0)
            .ok_or_else(|| EngineError::validation(&name, format!("unknown filter_type {type_code}")))?;

        let (filtered, info) = if !enable {
            (value, String::new())
        } else {
            match filter_type {
                FilterType::MeanDownsample => {
                    let window = self.core.scalar_parameter("window")?;
                    let w = window.round();
                    if w < 1.0 {
                        return Err(EngineError::validation(&name, format!("window must be at least 1, got {window}")));
                    }
                    let w = w as usize;
                    (
                        mean_downsample_resample(&value, w),
                        format!("mean downsample, window={w}"),
                    )
                }
                FilterType::LowPass => {
                    let cutoff = self.core.scalar_parameter("cutoff_freq")?;
                    let order = self.core.scalar_parameter("filter_order")?;
                    if order < 1.0 || order.fract() != 0.0 {
                        return Err(EngineError::validation(&name, format!("filter_order must be a positive integer, got {order}")));
                    }
                    if cutoff <= 0.0 || cutoff >= fs / 2.0 {
                        return Err(EngineError::validation(
                            &name,
                            format!("cutoff_freq must lie in (0, fs/2 = {}), got {cutoff}", fs / 2.0),
                        ));
                    }
                    let (b, a) = butter_lowpass(order as usize, cutoff / (fs / 2.0));
                    (
                        filtfilt(&b, &a, &value, &name)?,
                        format!("lowpass, cutoff={cutoff} Hz"),
                    )
                }
            }
        };
        debug!("filter '{info}' over {} samples", filtered.len());
        self.core.set_output("time", Value::Time(time));
        self.core.set_output("value", Value::Real(filtered));
        self.core.set_output("fs", Value::Scalar(fs));
        self.core.set_output("is_filtered", Value::Bool(enable));
        self.core.set_output("filter_type", Value::Scalar(type_code));
        self.core.set_output("filter_info", Value::Text(info));
        self.core.mark_clean();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
