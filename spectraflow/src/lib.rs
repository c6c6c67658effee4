#![warn(clippy::perf)]
#![allow(clippy::type_complexity)]

//! # spectraflow
//!
//! A graph based engine for interactive time-frequency analysis of long,
//! uniformly-sampled scalar signals.
//!
//! Signals are ingested from a csv file of `(timestamp, value)` rows and
//! pushed through a pipeline of processing stages - filtering, windowed
//! slicing, a zoom-FFT spectrum and a rolling spectrogram - whose
//! parameters can be edited live.  The pipeline is a directed acyclic
//! graph of typed nodes with named ports; changing a parameter
//! invalidates only the affected downstream nodes, everything else reuses
//! its memoized outputs.
//!
//! ## The workflow facade
//!
//! Most users only need [TimeFrequency]:
//!
//! ```no_run
//! use spectraflow::{FilterType, TimeFrequency};
//!
//! fn main() -> Result<(), spectraflow::EngineError> {
//!     let mut workflow = TimeFrequency::new()?;
//!     workflow.load_data("readings.csv")?;
//!     workflow.set_slice_parameters(86_400.0, 0.5)?;
//!     workflow.set_filter_parameters(true, FilterType::LowPass, 0.01)?;
//!     workflow.set_frequency_range((0.0, 0.001))?;
//!     for slice in 1..=workflow.slice_count()? {
//!         workflow.set_current_slice(slice)?;
//!     }
//!     let waterfall = workflow.waterfall_data()?;
//!     println!("{} spectra retained", waterfall.size);
//!     Ok(())
//! }
//! ```
//!
//! ## The graph engine
//!
//! The engine underneath is generic: implement [Node] to add your own
//! processing stages, register them with a [Graph], wire typed edges and
//! read outputs on demand.  Execution is single-threaded and pull-based;
//! nodes run in topological order with an insertion-order tie-break, so
//! identical inputs always produce identical outputs.

#[macro_use]
extern crate log;

mod dsp;
mod error;
mod graph;
mod node;
mod nodes;
mod time;
mod types;
mod workflow;

pub use error::*;
pub use graph::*;
pub use node::*;
pub use nodes::*;
pub use time::*;
pub use types::*;
pub use workflow::*;
