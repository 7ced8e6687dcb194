//! Port definitions for the radio driver layer.
//!
//! Hexagonal-architecture port that abstracts hardware measurement, so the
//! engine can be driven by a real driver, a recorded capture replay, or a
//! deterministic test double without change.

mod measure_port;

pub use measure_port::{MeasurementPort, MeasurementRequest};
