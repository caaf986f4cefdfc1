//! Helpers for testing metric exporters.
//!
//! [`conformance`] holds the lifecycle checks every [`PushMetricExporter`]
//! implementation must pass; [`metrics`] builds deterministic snapshots to
//! feed them.
//!
//! [`PushMetricExporter`]: crate::PushMetricExporter
pub mod conformance;
pub mod metrics;
