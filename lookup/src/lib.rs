// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Contracts of the tables and services the datapath reads but does not own: endpoints,
//! reverse NAT records, connection tracking, the FIB, the masquerade policy, the health-check
//! socket map and device MAC addresses.
//!
//! All lookups take `&self`: the datapath never mutates these tables. In-memory
//! implementations for tests live in [`testing`] (feature `testing`).

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

pub mod conntrack;
pub mod device;
pub mod endpoint;
pub mod fib;
pub mod health;
pub mod masq;
pub mod revnat;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use conntrack::{ConnTrack, CtClass, CtLookup}; // re-export
pub use device::DeviceMacs; // re-export
pub use endpoint::{EndpointFlags, EndpointInfo, EndpointLookup}; // re-export
pub use fib::{Fib, FibParams, FibRoute}; // re-export
pub use health::HealthLookup; // re-export
pub use masq::{MasqueradeDecision, MasqueradePolicy, NatTarget}; // re-export
pub use revnat::{ReverseNatLookup, ReverseNatRecord}; // re-export

use tracectl::trace_target;
trace_target!("lookup", LevelFilter::INFO, &["datapath"]);
