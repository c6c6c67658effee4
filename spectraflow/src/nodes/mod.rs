//! The processing nodes of the time-frequency pipeline.

mod filter;
mod loader;
mod slicer;
mod spectrum;
mod waterfall;

pub use filter::*;
pub use loader::*;
pub use slicer::*;
pub use spectrum::*;
pub use waterfall::*;
