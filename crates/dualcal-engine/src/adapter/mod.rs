//! Adapters implementing [`MeasurementPort`](dualcal_core::port::MeasurementPort).

mod replay;

pub use replay::{ReplayCapture, ReplayMeasurementPort};
