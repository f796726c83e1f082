//! Statistics for the distribution server

pub mod metrics;

pub use metrics::{Metrics, ServerStats};
