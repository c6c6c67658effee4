use std::any::Any;

use crate::error::{EngineError, Result};
use crate::node::{Node, NodeCore, PortSpec, port_kind};
use crate::types::{HistoryFrame, Kind, Value};

const PARAMETERS: &[PortSpec] = &[
    ("history_size", Kind::Scalar),
    ("history", Kind::History),
];
const INPUTS: &[PortSpec] = &[
    ("spectrum", Kind::Real),
    ("time_point", Kind::Time),
];
const OUTPUTS: &[PortSpec] = &[
    ("history", Kind::History),
    ("times", Kind::Time),
    ("size", Kind::Scalar),
    ("log_history", Kind::History),
];

/// Fixed-capacity FIFO of past spectra and their timestamps.  The rolling
/// buffer lives in the parameter map; a row is appended only on passes
/// that delivered fresh input, so capacity changes leave the contents
/// untouched.
///
/// An empty buffer is seeded with a zero row before the first append and
/// the zero row survives until ordinary eviction removes it.
pub struct WaterfallNode {
    core: NodeCore,
    pending: bool,
}

impl WaterfallNode {
    pub fn new(name: &str) -> Self {
        let mut core = NodeCore::new(name);
        core.store_parameter("history_size", Value::Scalar(20.0));
        core.store_parameter("history", Value::History(HistoryFrame::default()));
        Self { core, pending: false }
    }

    fn buffer(&self) -> HistoryFrame {
        self.core
            .parameter("history")
            .and_then(Value::as_history)
            .cloned()
            .unwrap_or_default()
    }

    /// Empties the rolling buffer and marks the node dirty; the next pass
    /// that delivers a spectrum re-seeds it.
    pub fn clear_history(&mut self) {
        self.core.put_parameter("history", Value::History(HistoryFrame::default()));
        self.core.reset();
    }

    /// Changes the capacity, truncating the oldest rows if the buffer
    /// exceeds it.  Does not count as fresh input: no row is appended on
    /// the next pass.
    pub fn set_history_size(&mut self, size: u32) -> Result<()> {
        if size < 2 {
            return Err(EngineError::validation(
                self.core.name(),
                format!("history_size must be at least 2, got {size}"),
            ));
        }
        let mut frame = self.buffer();
        let capacity = size as usize;
        if frame.rows.len() > capacity {
            let surplus = frame.rows.len() - capacity;
            frame.rows.drain(..surplus);
            frame.times.drain(..surplus);
        }
        self.core.put_parameter("history_size", Value::Scalar(size as f64));
        self.core.put_parameter("history", Value::History(frame));
        if !self.core.dirty() {
            self.publish();
        }
        Ok(())
    }

    fn publish(&mut self) {
        let frame = self.buffer();
        let log_rows: Vec<Vec<f64>> = frame
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.log10()).collect())
            .collect();
        self.core.set_output("times", Value::Time(frame.times.clone()));
        self.core.set_output("size", Value::Scalar(frame.rows.len() as f64));
        self.core
            .set_output("log_history", Value::History(HistoryFrame::new(log_rows, frame.times.clone())));
        self.core.set_output("history", Value::History(frame));
    }
}

impl Node for WaterfallNode {
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

    fn set_input(&mut self, name: &str, value: Value) -> Result<()> {
        let kind = port_kind(INPUTS, name)
            .ok_or_else(|| EngineError::validation(self.core.name(), format!("unknown input {name}")))?;
        if value.kind() != kind {
            return Err(EngineError::validation(
                self.core.name(),
                format!("input {name} expects {kind}, got {}", value.kind()),
            ));
        }
        self.core.store_input(name, value);
        self.pending = true;
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        let name = self.core.name().to_string();
        let capacity = self.core.scalar_parameter("history_size")?;
        if capacity < 2.0 {
            return Err(EngineError::validation(&name, format!("history_size must be at least 2, got {capacity}")));
        }
        let capacity = capacity as usize;
        if self.pending {
            let row = self.core.real_input("spectrum")?.to_vec();
            let stamp = self
                .core
                .time_input("time_point")?
                .first()
                .copied()
                .ok_or_else(|| EngineError::validation(&name, "time_point is empty"))?;
            let mut frame = self.buffer();
            if let Some(previous) = frame.rows.last() {
                if previous.len() != row.len() {
                    return Err(EngineError::validation(
                        &name,
                        format!("spectrum width changed from {} to {}", previous.len(), row.len()),
                    ));
                }
            } else {
                // seed row; evicted like any other
                frame.rows.push(vec![0.0; row.len()]);
                frame.times.push(stamp);
            }
            frame.rows.push(row);
            frame.times.push(stamp);
            while frame.rows.len() > capacity {
                frame.rows.remove(0);
                frame.times.remove(0);
            }
            debug!("waterfall holds {}/{} rows", frame.rows.len(), capacity);
            self.core.put_parameter("history", Value::History(frame));
            self.pending = false;
        }
        self.publish();
        self.core.mark_clean();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
