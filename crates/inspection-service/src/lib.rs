//! Field inspection service core.
//!
//! Task lifecycle events move inspections into work, photo evidence is validated and attached,
//! and finishing an inspection composes and uploads the regulatory act.

#[cfg(feature = "kafka")]
pub mod broker;
pub mod config;
pub mod error;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod telemetry;
pub mod workflows;
