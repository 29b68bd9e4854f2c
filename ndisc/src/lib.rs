// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv6 neighbor discovery responder.
//!
//! Neighbor solicitations for the virtual router address, or for a local endpoint, are turned
//! into neighbor advertisements in place and sent back out of the device they came from.
//! Packets whose hop limit runs out are answered with an ICMPv6 time exceeded error sourced
//! from the router address. On the host device, ICMPv6 is additionally filtered through the
//! host firewall table.
//!
//! Answering a solicitation and building a time exceeded error both run as continuations
//! ([`HandleNsStage`], [`TimeExceededStage`]) reached from [`NdiscEntry`].

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

mod advert;
mod handler;
mod stage;
mod time_exceeded;
mod validate;

#[cfg(test)]
mod fixtures;

pub use advert::{add_option, send_reply, synthesize_advertisement};
pub use handler::{
    HostIcmp6, handle_ns, host_firewall_verdict, host_handle, is_icmp6_ndp, ndp_handle,
};
pub use stage::{HandleNsStage, NdiscEntry, TimeExceededStage, register_continuations};
pub use time_exceeded::{send_time_exceeded, synthesize_time_exceeded};
pub use validate::validate_solicitation;

use tracectl::trace_target;
trace_target!("ndisc", LevelFilter::INFO, &["datapath"]);
