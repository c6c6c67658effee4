//! End-to-end scenarios over the whole pipeline, driven through the
//! workflow facade against synthetic csv files.

use std::f64::consts::TAU;
use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use spectraflow::{
    EngineError, FilterType, Kind, Node, NodeCore, PortSpec, Stamp, TimeFrequency, Value,
};

fn start_stamp() -> Stamp {
    NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Writes `n` rows sampled at 1 Hz, one value per second.
fn write_csv(tag: &str, values: impl Iterator<Item = f64>) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("spectraflow_e2e_{tag}_{}.csv", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    for (k, value) in values.enumerate() {
        let stamp = start_stamp() + chrono::Duration::seconds(k as i64);
        writeln!(file, "{},{}", stamp.format("%Y-%m-%d %H:%M:%S%.3f"), value).unwrap();
    }
    path
}

fn sine_csv(tag: &str) -> PathBuf {
    write_csv(tag, (0..1000).map(|k| (TAU * 0.01 * k as f64).sin()))
}

fn loaded(tag: &str) -> TimeFrequency {
    let mut workflow = TimeFrequency::new().unwrap();
    workflow.load_data(sine_csv(tag).to_str().unwrap()).unwrap();
    workflow
}

#[test]
fn loads_and_slices_disjoint_windows() {
    let mut workflow = loaded("slices");
    assert!((workflow.sampling_rate().unwrap() - 1.0).abs() < 1e-9);
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    let slice = workflow.slice_data().unwrap();
    assert_eq!(slice.num_slices, 10);
    assert_eq!(slice.value.len(), 100);
    assert_eq!(slice.current_slice, 1);
    assert_eq!(slice.slice_start_times, vec!["2021-01-01".to_string()]);
}

#[test]
fn third_slice_starts_two_hundred_seconds_in() {
    let mut workflow = loaded("third");
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    workflow.set_current_slice(3).unwrap();
    let slice = workflow.slice_data().unwrap();
    assert_eq!(slice.slice_index, (201, 300));
    assert_eq!(slice.time[0], start_stamp() + chrono::Duration::seconds(200));
    assert!(slice.slice_time_range.starts_with("2021-01-01 00:03:20.000"));
}

#[test]
fn repeating_a_slice_request_is_idempotent() {
    let mut workflow = loaded("idempotent");
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    workflow.set_current_slice(4).unwrap();
    let first = workflow.slice_data().unwrap();
    workflow.set_current_slice(4).unwrap();
    assert_eq!(workflow.slice_data().unwrap(), first);
}

#[test]
fn spectral_peak_sits_on_the_tone() {
    let mut workflow = loaded("peak");
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    workflow.set_frequency_range((0.005, 0.02)).unwrap();
    let spectrum = workflow.spectrum_data().unwrap();
    assert_eq!(spectrum.freq_range, (0.005, 0.02));
    let peak = spectrum
        .p1_plot
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(ix, _)| ix)
        .unwrap();
    // one bin of the zoomed axis: fs / (next_pow2(100) * 8)
    let bin = 1.0 / (128.0 * 8.0);
    assert!(
        (spectrum.f_plot[peak] - 0.01).abs() <= bin,
        "peak at {} Hz",
        spectrum.f_plot[peak]
    );
}

#[test]
fn waterfall_retains_the_last_windows() {
    let mut workflow = loaded("waterfall");
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    workflow.set_waterfall_history_size(5).unwrap();
    for slice in 1..=10 {
        workflow.set_current_slice(slice).unwrap();
    }
    let waterfall = workflow.waterfall_data().unwrap();
    assert_eq!(waterfall.size, 5);
    assert_eq!(waterfall.history.len(), 5);
    let expected: Vec<Stamp> = (6..=10)
        .map(|slice| start_stamp() + chrono::Duration::seconds((slice - 1) * 100))
        .collect();
    assert_eq!(waterfall.times, expected);
    // log rows line up with the linear rows
    assert!((waterfall.log_history[4][0] - waterfall.history[4][0].log10()).abs() < 1e-12);
}

#[test]
fn history_size_changes_are_no_ops_on_contents() {
    let mut workflow = loaded("histsize");
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    for slice in 1..=6 {
        workflow.set_current_slice(slice).unwrap();
    }
    workflow.set_waterfall_history_size(4).unwrap();
    let first = workflow.waterfall_data().unwrap();
    workflow.set_waterfall_history_size(4).unwrap();
    assert_eq!(workflow.waterfall_data().unwrap(), first);
}

#[test]
fn lowpass_strips_a_high_tone_end_to_end() {
    let path = write_csv(
        "lowpass",
        (0..1000).map(|k| (TAU * 0.01 * k as f64).sin() + (TAU * 0.4 * k as f64).sin()),
    );
    let mut workflow = TimeFrequency::new().unwrap();
    workflow.load_data(path.to_str().unwrap()).unwrap();
    // one window spanning the whole signal exposes the filtered series
    workflow.set_slice_parameters(1000.0, 0.0).unwrap();
    let raw = workflow.slice_data().unwrap().value;
    workflow
        .set_filter_parameters(true, FilterType::LowPass, 0.05)
        .unwrap();
    assert_eq!(workflow.filter_info().unwrap(), "lowpass, cutoff=0.05 Hz");
    let filtered = workflow.slice_data().unwrap().value;
    assert_eq!(filtered.len(), raw.len());
    let amplitude = |xs: &[f64], f: f64| {
        let (mut re, mut im) = (0.0, 0.0);
        for (k, &v) in xs.iter().enumerate() {
            re += v * (TAU * f * k as f64).cos();
            im += v * (TAU * f * k as f64).sin();
        }
        (re * re + im * im).sqrt() * 2.0 / xs.len() as f64
    };
    // > 40 dB down at 0.4 Hz, passband intact
    assert!(amplitude(&filtered, 0.4) / amplitude(&raw, 0.4) < 0.01);
    assert!(amplitude(&filtered, 0.01) / amplitude(&raw, 0.01) > 0.9);
}

#[test]
fn disabled_filter_passes_the_signal_through() {
    let mut workflow = loaded("passthrough");
    workflow.set_slice_parameters(1000.0, 0.0).unwrap();
    let before = workflow.slice_data().unwrap().value;
    workflow
        .set_filter_parameters(false, FilterType::MeanDownsample, 5.0)
        .unwrap();
    assert_eq!(workflow.slice_data().unwrap().value, before);
    assert_eq!(workflow.filter_info().unwrap(), "");
}

#[test]
fn reset_recomputes_from_retained_parameters() {
    let mut workflow = loaded("reset");
    workflow.set_slice_parameters(100.0, 0.0).unwrap();
    workflow.set_current_slice(3).unwrap();
    let before = workflow.slice_data().unwrap();
    workflow.reset().unwrap();
    let after = workflow.slice_data().unwrap();
    assert_eq!(after.slice_index, before.slice_index);
    assert_eq!(after.value, before.value);
    // the waterfall starts over: zero seed row plus the fresh spectrum
    assert_eq!(workflow.waterfall_data().unwrap().size, 2);
}

// A minimal node pair exercising the public engine surface from outside
// the crate.

struct Probe {
    core: NodeCore,
}

impl Probe {
    fn new(name: &str) -> Self {
        Self {
            core: NodeCore::new(name),
        }
    }
}

impl Node for Probe {
    fn core(&self) -> &NodeCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }
    fn parameter_ports(&self) -> &'static [PortSpec] {
        &[]
    }
    fn input_ports(&self) -> &'static [PortSpec] {
        &[("in", Kind::Scalar)]
    }
    fn output_ports(&self) -> &'static [PortSpec] {
        &[("out", Kind::Scalar)]
    }
    fn execute(&mut self) -> Result<(), EngineError> {
        let value = self.core().input("in").and_then(Value::as_scalar).unwrap_or(0.0);
        self.core_mut().set_output("out", Value::Scalar(value + 1.0));
        self.core_mut().mark_clean();
        Ok(())
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[test]
fn closing_a_loop_is_rejected_before_the_edge_lands() {
    let mut graph = spectraflow::Graph::new();
    graph.add_node(Box::new(Probe::new("a"))).unwrap();
    graph.add_node(Box::new(Probe::new("b"))).unwrap();
    graph.connect("a", "out", "b", "in").unwrap();
    let err = graph.connect("b", "out", "a", "in").unwrap_err();
    assert!(matches!(err, EngineError::CycleIntroduced { .. }));
    // the graph is still executable and deterministic
    graph.execute().unwrap();
    assert_eq!(
        graph.get_node_output("b", "out").unwrap(),
        Value::Scalar(2.0)
    );
}
