//! Anomaly detection over rolling operational metrics
//!
//! An in-crate isolation forest drives periodic detection across three
//! metric families (resource consumption, request volume, severity
//! escalation), producing typed alerts with expected ranges and
//! rule-based explanations.

mod detector;
pub mod isolation;

pub use detector::AnomalyDetector;
pub use isolation::{Detection, IsolationForest};
