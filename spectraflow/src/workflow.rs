use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::graph::Graph;
use crate::nodes::{DataLoaderNode, FilterNode, FilterType, SlicerNode, SpectrumNode, WaterfallNode};
use crate::time::Stamp;
use crate::types::{Kind, Value};

const LOADER: &str = "loader";
const FILTER: &str = "filter";
const SLICER: &str = "slicer";
const SPECTRUM: &str = "spectrum";
const WATERFALL: &str = "waterfall";

fn wrong_kind(node: &str, port: &str, kind: Kind) -> EngineError {
    EngineError::validation(node, format!("output {port} does not carry a {kind} value"))
}

/// Everything the time-domain plot needs for the current window.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SliceData {
    pub time: Vec<Stamp>,
    pub value: Vec<f64>,
    pub num_slices: u32,
    pub current_slice: u32,
    pub slice_index: (u32, u32),
    pub slice_start_times: Vec<String>,
    pub slice_time_range: String,
}

/// The zoom-FFT spectrum of the current window.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpectrumData {
    pub f_plot: Vec<f64>,
    pub p1_plot: Vec<f64>,
    pub freq_range: (f64, f64),
}

/// The rolling spectrogram and its row timestamps.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WaterfallData {
    pub history: Vec<Vec<f64>>,
    pub log_history: Vec<Vec<f64>>,
    pub times: Vec<Stamp>,
    pub size: u32,
}

/// Facade over the five-node pipeline
/// loader -> filter -> slicer -> spectrum -> waterfall.
///
/// Parameter setters invalidate only the affected downstream nodes and
/// every verb ends with a graph execute, so the getters always observe a
/// consistent pipeline.  Playback is repeated calls to
/// [set_current_slice](TimeFrequency::set_current_slice).
pub struct TimeFrequency {
    graph: Graph,
}

impl TimeFrequency {
    pub fn new() -> Result<Self> {
        let mut graph = Graph::new();
        graph.add_node(Box::new(DataLoaderNode::new(LOADER)))?;
        graph.add_node(Box::new(FilterNode::new(FILTER)))?;
        graph.add_node(Box::new(SlicerNode::new(SLICER)))?;
        graph.add_node(Box::new(SpectrumNode::new(SPECTRUM)))?;
        graph.add_node(Box::new(WaterfallNode::new(WATERFALL)))?;
        for port in ["time", "value", "fs"] {
            graph.connect(LOADER, port, FILTER, port)?;
            graph.connect(FILTER, port, SLICER, port)?;
        }
        graph.connect(SLICER, "value", SPECTRUM, "value")?;
        graph.connect(SLICER, "fs", SPECTRUM, "fs")?;
        graph.connect(SPECTRUM, "P1_plot", WATERFALL, "spectrum")?;
        graph.connect(SLICER, "time", WATERFALL, "time_point")?;
        Ok(Self { graph })
    }

    /// Points the loader at a csv file and runs the whole pipeline.
    pub fn load_data(&mut self, path: &str) -> Result<()> {
        self.graph
            .set_parameter(LOADER, "filename", Value::Text(path.to_string()))?;
        self.graph.execute()
    }

    /// Re-cuts the signal; the waterfall history no longer matches the new
    /// windows and is cleared.
    pub fn set_slice_parameters(&mut self, duration: f64, overlap: f64) -> Result<()> {
        self.graph
            .set_parameter(SLICER, "slice_duration", Value::Scalar(duration))?;
        self.graph
            .set_parameter(SLICER, "overlap_ratio", Value::Scalar(overlap))?;
        self.waterfall_mut()?.clear_history();
        self.graph.execute()
    }

    /// Configures the filter stage.  `param` is the window width for
    /// [FilterType::MeanDownsample] and the cutoff frequency in Hz for
    /// [FilterType::LowPass].
    pub fn set_filter_parameters(&mut self, enable: bool, filter_type: FilterType, param: f64) -> Result<()> {
        self.graph.set_parameter(FILTER, "enable", Value::Bool(enable))?;
        self.graph
            .set_parameter(FILTER, "filter_type", Value::Scalar(filter_type as u8 as f64))?;
        match filter_type {
            FilterType::MeanDownsample => self.graph.set_parameter(FILTER, "window", Value::Scalar(param))?,
            FilterType::LowPass => self.graph.set_parameter(FILTER, "cutoff_freq", Value::Scalar(param))?,
        }
        self.graph.execute()
    }

    /// Changes the analysed band; the waterfall history no longer matches
    /// the new frequency axis and is cleared.
    pub fn set_frequency_range(&mut self, range: (f64, f64)) -> Result<()> {
        self.graph
            .set_parameter(SPECTRUM, "freq_range", Value::Real(vec![range.0, range.1]))?;
        self.waterfall_mut()?.clear_history();
        self.graph.execute()
    }

    /// Caps the spectrogram history, truncating the oldest rows.  The
    /// surviving contents are untouched, so repeating the call is a no-op.
    pub fn set_waterfall_history_size(&mut self, size: u32) -> Result<()> {
        self.waterfall_mut()?.set_history_size(size)?;
        self.graph.execute()
    }

    /// Moves the slicer to the 1-based window `index` (clamped into range)
    /// and feeds the resulting spectrum into the waterfall.
    pub fn set_current_slice(&mut self, index: u32) -> Result<()> {
        self.graph
            .set_parameter(SLICER, "current_slice", Value::Scalar(index as f64))?;
        self.graph.execute()
    }

    /// Drops every node's outputs and empties the waterfall history, then
    /// recomputes the pipeline from the retained parameters.
    pub fn reset(&mut self) -> Result<()> {
        self.waterfall_mut()?.clear_history();
        self.graph.reset();
        self.graph.execute()
    }

    pub fn slice_data(&mut self) -> Result<SliceData> {
        let time = self.graph.get_node_output(SLICER, "time")?;
        let value = self.graph.get_node_output(SLICER, "value")?;
        let num_slices = self.graph.get_node_output(SLICER, "num_slices")?;
        let current = self.graph.get_node_output(SLICER, "current_slice")?;
        let index = self.graph.get_node_output(SLICER, "slice_index")?;
        let starts = self.graph.get_node_output(SLICER, "slice_start_times")?;
        let range = self.graph.get_node_output(SLICER, "slice_time_range")?;
        let slice_index = match index.as_real().ok_or_else(|| wrong_kind(SLICER, "slice_index", Kind::Real))? {
            [start, end] => (*start as u32, *end as u32),
            other => {
                return Err(EngineError::validation(
                    SLICER,
                    format!("output slice_index must hold [start, end], got {} entries", other.len()),
                ));
            }
        };
        Ok(SliceData {
            time: time.as_time().ok_or_else(|| wrong_kind(SLICER, "time", Kind::Time))?.to_vec(),
            value: value.as_real().ok_or_else(|| wrong_kind(SLICER, "value", Kind::Real))?.to_vec(),
            num_slices: num_slices
                .as_scalar()
                .ok_or_else(|| wrong_kind(SLICER, "num_slices", Kind::Scalar))? as u32,
            current_slice: current
                .as_scalar()
                .ok_or_else(|| wrong_kind(SLICER, "current_slice", Kind::Scalar))? as u32,
            slice_index,
            slice_start_times: starts
                .as_texts()
                .ok_or_else(|| wrong_kind(SLICER, "slice_start_times", Kind::Texts))?
                .to_vec(),
            slice_time_range: range
                .as_text()
                .ok_or_else(|| wrong_kind(SLICER, "slice_time_range", Kind::Text))?
                .to_string(),
        })
    }

    pub fn spectrum_data(&mut self) -> Result<SpectrumData> {
        let frame = self.graph.get_node_output(SPECTRUM, "frame")?;
        let frame = frame
            .as_spectrum()
            .ok_or_else(|| wrong_kind(SPECTRUM, "frame", Kind::Spectrum))?;
        Ok(SpectrumData {
            f_plot: frame.freqs.clone(),
            p1_plot: frame.mags.clone(),
            freq_range: frame.band,
        })
    }

    pub fn waterfall_data(&mut self) -> Result<WaterfallData> {
        let history = self.graph.get_node_output(WATERFALL, "history")?;
        let log_history = self.graph.get_node_output(WATERFALL, "log_history")?;
        let size = self.graph.get_node_output(WATERFALL, "size")?;
        let history = history
            .as_history()
            .ok_or_else(|| wrong_kind(WATERFALL, "history", Kind::History))?;
        let log_history = log_history
            .as_history()
            .ok_or_else(|| wrong_kind(WATERFALL, "log_history", Kind::History))?;
        Ok(WaterfallData {
            history: history.rows.clone(),
            log_history: log_history.rows.clone(),
            times: history.times.clone(),
            size: size.as_scalar().ok_or_else(|| wrong_kind(WATERFALL, "size", Kind::Scalar))? as u32,
        })
    }

    pub fn sampling_rate(&mut self) -> Result<f64> {
        let fs = self.graph.get_node_output(LOADER, "fs")?;
        fs.as_scalar().ok_or_else(|| wrong_kind(LOADER, "fs", Kind::Scalar))
    }

    /// The filter stage's human-readable description of what it applied.
    pub fn filter_info(&mut self) -> Result<String> {
        let info = self.graph.get_node_output(FILTER, "filter_info")?;
        Ok(info
            .as_text()
            .ok_or_else(|| wrong_kind(FILTER, "filter_info", Kind::Text))?
            .to_string())
    }

    /// How many windows the current slicing yields.
    pub fn slice_count(&mut self) -> Result<u32> {
        let count = self.graph.get_node_output(SLICER, "num_slices")?;
        Ok(count
            .as_scalar()
            .ok_or_else(|| wrong_kind(SLICER, "num_slices", Kind::Scalar))? as u32)
    }

    /// The underlying graph, for inspection and DOT export.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn waterfall_mut(&mut self) -> Result<&mut WaterfallNode> {
        self.graph
            .node_mut(WATERFALL)?
            .as_any_mut()
            .downcast_mut::<WaterfallNode>()
            .ok_or_else(|| EngineError::validation(WATERFALL, "node is not a waterfall"))
    }
}
