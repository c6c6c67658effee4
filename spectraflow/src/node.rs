use std::any::Any;
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::time::Stamp;
use crate::types::{Kind, Value};

/// A named, typed port declaration.
pub type PortSpec = (&'static str, Kind);

pub(crate) fn port_kind(ports: &[PortSpec], name: &str) -> Option<Kind> {
    ports.iter().find(|(port, _)| *port == name).map(|(_, kind)| *kind)
}

/// The state every processing node carries: identity, the three
/// name -> [Value] maps and the dirty bit.
///
/// Any change to a parameter or input invalidates the previous outputs;
/// a clean node has every declared output populated.
#[derive(Debug, Default)]
pub struct NodeCore {
    name: String,
    parameters: HashMap<String, Value>,
    inputs: HashMap<String, Value>,
    outputs: HashMap<String, Value>,
    dirty: bool,
}

impl NodeCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: HashMap::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            dirty: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the node stale and drops previous outputs.
    pub fn touch(&mut self) {
        self.dirty = true;
        self.outputs.clear();
    }

    /// Drops outputs and marks dirty, keeping parameters and inputs.
    pub fn reset(&mut self) {
        self.outputs.clear();
        self.dirty = true;
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    pub(crate) fn store_parameter(&mut self, name: &str, value: Value) {
        self.parameters.insert(name.to_string(), value);
        self.touch();
    }

    pub(crate) fn store_input(&mut self, name: &str, value: Value) {
        self.inputs.insert(name.to_string(), value);
        self.touch();
    }

    /// Writes a parameter without invalidating outputs.  Reserved for nodes
    /// that keep rolling state in their parameter map.
    pub(crate) fn put_parameter(&mut self, name: &str, value: Value) {
        self.parameters.insert(name.to_string(), value);
    }

    pub fn set_output(&mut self, name: &str, value: Value) {
        self.outputs.insert(name.to_string(), value);
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // Typed accessors used by execute implementations.  Wrong variants are
    // impossible through the validated setters, but direct core access can
    // still produce them, hence the checks.

    pub(crate) fn require_input(&self, name: &str) -> Result<&Value> {
        self.inputs
            .get(name)
            .ok_or_else(|| EngineError::missing_input(&self.name, name))
    }

    pub(crate) fn time_input(&self, name: &str) -> Result<&[Stamp]> {
        self.require_input(name)?
            .as_time()
            .ok_or_else(|| EngineError::validation(&self.name, format!("input {name} is not a time vector")))
    }

    pub(crate) fn real_input(&self, name: &str) -> Result<&[f64]> {
        self.require_input(name)?
            .as_real()
            .ok_or_else(|| EngineError::validation(&self.name, format!("input {name} is not a numeric vector")))
    }

    pub(crate) fn scalar_input(&self, name: &str) -> Result<f64> {
        self.require_input(name)?
            .as_scalar()
            .ok_or_else(|| EngineError::validation(&self.name, format!("input {name} is not a scalar")))
    }

    pub(crate) fn scalar_parameter(&self, name: &str) -> Result<f64> {
        self.parameter(name)
            .and_then(Value::as_scalar)
            .ok_or_else(|| EngineError::missing_parameter(&self.name, name))
    }

    pub(crate) fn bool_parameter(&self, name: &str) -> Result<bool> {
        self.parameter(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| EngineError::missing_parameter(&self.name, name))
    }

    pub(crate) fn real_parameter(&self, name: &str) -> Result<&[f64]> {
        self.parameter(name)
            .and_then(Value::as_real)
            .ok_or_else(|| EngineError::missing_parameter(&self.name, name))
    }
}

/// Implement this trait to add a processing node to the graph.  The graph
/// drives nodes exclusively through it.
pub trait Node {
    fn core(&self) -> &NodeCore;
    fn core_mut(&mut self) -> &mut NodeCore;

    /// Declared parameter schema; setters reject unknown names and wrong
    /// variants.
    fn parameter_ports(&self) -> &'static [PortSpec];
    fn input_ports(&self) -> &'static [PortSpec];
    fn output_ports(&self) -> &'static [PortSpec];

    /// Reads inputs and parameters, validates, populates every declared
    /// output and clears the dirty bit.  Must not mutate state before
    /// validation passes.
    fn execute(&mut self) -> Result<()>;

    /// Concrete-type escape hatch for node-specific verbs.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn is_dirty(&self) -> bool {
        self.core().dirty()
    }

    fn set_parameter(&mut self, name: &str, value: Value) -> Result<()> {
        let kind = port_kind(self.parameter_ports(), name)
            .ok_or_else(|| EngineError::validation(self.name(), format!("unknown parameter {name}")))?;
        if value.kind() != kind {
            return Err(EngineError::validation(
                self.name(),
                format!("parameter {name} expects {kind}, got {}", value.kind()),
            ));
        }
        self.core_mut().store_parameter(name, value);
        Ok(())
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<()> {
        let kind = port_kind(self.input_ports(), name)
            .ok_or_else(|| EngineError::validation(self.name(), format!("unknown input {name}")))?;
        if value.kind() != kind {
            return Err(EngineError::validation(
                self.name(),
                format!("input {name} expects {kind}, got {}", value.kind()),
            ));
        }
        self.core_mut().store_input(name, value);
        Ok(())
    }

    fn get_parameter(&self, name: &str) -> Option<&Value> {
        self.core().parameter(name)
    }

    /// Lazy-function contract: a dirty node executes before its output is
    /// read.  Fails with [EngineError::MissingOutput] if execute did not
    /// populate the requested port.
    fn get_output(&mut self, name: &str) -> Result<Value> {
        if self.core().dirty() {
            self.execute()?;
        }
        self.core()
            .output(name)
            .cloned()
            .ok_or_else(|| EngineError::missing_output(self.core().name(), name))
    }

    fn reset(&mut self) {
        self.core_mut().reset();
    }
}
