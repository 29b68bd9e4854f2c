// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Registry of tracing targets and runtime control of their levels

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod control;
mod display;
pub mod targets;

// re-exports
pub use control::{TracingControl, TracingError, get_trace_ctl};
pub use tracing_subscriber::filter::LevelFilter;
