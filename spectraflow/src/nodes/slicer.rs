use std::any::Any;

use itertools::Itertools;

use crate::error::{EngineError, Result};
use crate::node::{Node, NodeCore, PortSpec};
use crate::time::{format_date, format_stamp};
use crate::types::{Kind, Value};

const PARAMETERS: &[PortSpec] = &[
    ("slice_duration", Kind::Scalar),
    ("overlap_ratio", Kind::Scalar),
    ("current_slice", Kind::Scalar),
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
    ("num_slices", Kind::Scalar),
    ("slice_start_times", Kind::Texts),
    ("current_slice", Kind::Scalar),
    ("slice_index", Kind::Real),
    ("slice_time_range", Kind::Text),
    ("slice_points", Kind::Scalar),
    ("step_points", Kind::Scalar),
];

/// Cuts the signal into overlapping windows of a fixed duration and
/// exposes one window at a time.  The requested slice index is clamped
/// into the valid range, never rejected.
pub struct SlicerNode {
    core: NodeCore,
}

impl SlicerNode {
    pub fn new(name: &str) -> Self {
        let mut core = NodeCore::new(name);
        core.store_parameter("slice_duration", Value::Scalar(86_400.0));
        core.store_parameter("overlap_ratio", Value::Scalar(0.5));
        core.store_parameter("current_slice", Value::Scalar(1.0));
        Self { core }
    }
}

impl Node for SlicerNode {
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
        let time = self.core.time_input("time")?;
        let value = self.core.real_input("value")?;
        let fs = self.core.scalar_input("fs")?;
        let duration = self.core.scalar_parameter("slice_duration")?;
        let overlap = self.core.scalar_parameter("overlap_ratio")?;
        let requested = self.core.scalar_parameter("current_slice")?;

        if duration <= 0.0 {
            return Err(EngineError::validation(&name, format!("slice_duration must be positive, got {duration}")));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(EngineError::validation(&name, format!("overlap_ratio must lie in [0, 1), got {overlap}")));
        }
        let n = value.len();
        if n == 0 {
            return Err(EngineError::validation(&name, "input signal is empty"));
        }
        if time.len() != n {
            return Err(EngineError::validation(
                &name,
                format!("time and value lengths differ: {} vs {n}", time.len()),
            ));
        }
        let slice_points = (duration * fs).round() as i64;
        if slice_points < 1 {
            return Err(EngineError::validation(&name, "slice_duration is shorter than one sample"));
        }
        let step_points = (slice_points as f64 * (1.0 - overlap)).round() as i64;
        if step_points < 1 {
            return Err(EngineError::validation(&name, "overlap_ratio leaves an empty step"));
        }
        let num_slices = ((n as i64 - slice_points) / step_points + 1).max(1);
        let current = (requested.round() as i64).clamp(1, num_slices);

        // 1-based inclusive window bounds
        let start = (current - 1) * step_points + 1;
        let end = (start + slice_points - 1).min(n as i64);
        let lo = (start - 1) as usize;
        let hi = end as usize;

        let window_time = time[lo..hi].to_vec();
        let window_value = value[lo..hi].to_vec();
        let time_range = format!(
            "{} - {}",
            format_stamp(&window_time[0]),
            format_stamp(&window_time[window_time.len() - 1])
        );
        let start_times: Vec<String> = (1..=num_slices)
            .map(|i| ((i - 1) * step_points) as usize)
            .take_while(|&ix| ix < n)
            .map(|ix| format_date(&time[ix]))
            .dedup()
            .collect();
        debug!("slice {current}/{num_slices}: samples {start}..{end}");

        self.core.set_output("time", Value::Time(window_time));
        self.core.set_output("value", Value::Real(window_value));
        self.core.set_output("fs", Value::Scalar(fs));
        self.core.set_output("num_slices", Value::Scalar(num_slices as f64));
        self.core.set_output("slice_start_times", Value::Texts(start_times));
        self.core.set_output("current_slice", Value::Scalar(current as f64));
        self.core.set_output("slice_index", Value::Real(vec![start as f64, end as f64]));
        self.core.set_output("slice_time_range", Value::Text(time_range));
        self.core.set_output("slice_points", Value::Scalar(slice_points as f64));
        self.core.set_output("step_points", Value::Scalar(step_points as f64));
        self.core.mark_clean();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
