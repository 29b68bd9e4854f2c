// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Datapath configuration. A [`DatapathConfig`] is built (or loaded from YAML) once at startup,
//! validated, and then shared read-only by every stage. Behavior that would otherwise depend on
//! build-time switches branches on its fields and derived predicates instead.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

pub mod datapath;
pub mod display;
pub mod errors;

pub use datapath::{
    DatapathConfig, DatapathConfigBuilder, DirectRouting, DsrMode, ProgramKind, UnknownNsAction,
}; // re-export
pub use errors::{ConfigError, ConfigResult, stringify}; // re-export

use tracectl::trace_target;
trace_target!("config", LevelFilter::DEBUG, &["management"]);
