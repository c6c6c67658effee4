//! Synthesises a day of 1 Hz readings, runs the pipeline over it and
//! prints the spectral peak of every window.
//!
//! ```sh
//! cargo run --example analyse
//! ```

use std::f64::consts::TAU;
use std::io::Write;

use chrono::NaiveDate;
use spectraflow::{EngineError, FilterType, TimeFrequency};

fn main() -> Result<(), EngineError> {
    env_logger::init();

    // a slow 0.01 Hz tone buried under a faster one
    let start = NaiveDate::from_ymd_opt(2021, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut path = std::env::temp_dir();
    path.push("spectraflow_analyse.csv");
    let mut file = std::fs::File::create(&path).expect("temp dir is writable");
    for k in 0..86_400i64 {
        let stamp = start + chrono::Duration::seconds(k);
        let value = (TAU * 0.01 * k as f64).sin() + 0.5 * (TAU * 0.2 * k as f64).sin();
        writeln!(file, "{},{value}", stamp.format("%Y-%m-%d %H:%M:%S%.3f")).expect("temp dir is writable");
    }

    let mut workflow = TimeFrequency::new()?;
    workflow.load_data(path.to_str().expect("temp path is utf-8"))?;
    println!("sampling rate: {:.3} Hz", workflow.sampling_rate()?);

    workflow.set_filter_parameters(true, FilterType::LowPass, 0.05)?;
    workflow.set_slice_parameters(3_600.0, 0.5)?;
    workflow.set_frequency_range((0.005, 0.02))?;
    workflow.set_waterfall_history_size(10)?;

    for slice in 1..=workflow.slice_count()? {
        workflow.set_current_slice(slice)?;
        let spectrum = workflow.spectrum_data()?;
        let peak = spectrum
            .p1_plot
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).expect("magnitudes are finite"))
            .map(|(ix, _)| spectrum.f_plot[ix])
            .unwrap_or(0.0);
        let slice_data = workflow.slice_data()?;
        println!("window {slice:>2} [{}]: peak at {peak:.4} Hz", slice_data.slice_time_range);
    }

    let waterfall = workflow.waterfall_data()?;
    println!("waterfall holds {} spectra", waterfall.size);
    Ok(())
}
