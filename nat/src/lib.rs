// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Nodeport NAT on the egress path.
//!
//! Packets leaving the node go through two steps. Reverse translation restores the original
//! destination of replies to translated flows ([`rev_dnat_fwd`]). Traffic it did not restore
//! is then source-translated when the masquerade policy asks for it ([`snat_fwd`]), or when its
//! source conflicts with one of the node's own addresses.
//!
//! Both steps are written once, generic over the IP family ([`NatFamily`]), and run as
//! continuations of the stage chain ([`NatFwdStage`], [`SnatStage`]) reached from
//! [`NodeportEgress`]. Health-check probes are diverted to the encapsulation devices before
//! any translation ([`handle_health`]).
//!
//! The tables consulted along the way (reverse NAT, connection tracking, masquerade policy,
//! FIB, endpoints, device MACs) are owned elsewhere and only read here, through
//! [`NatTables`].

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]

mod family;
mod fib;
mod health;
mod l4;
mod revdnat;
mod snat;
mod stage;
mod tables;
mod tuple;

#[cfg(test)]
mod fixtures;

pub use family::NatFamily;
pub use fib::fib_lookup_and_redirect;
pub use health::{HEALTH_TUNNEL_TTL, HOST_ID, LOCAL_NODE_ID, handle_health};
pub use l4::{End, rewrite};
pub use revdnat::{RevDnatOutcome, rev_dnat_fwd};
pub use snat::{
    SnatOutcome, apply_snat, choose_masquerade_target, choose_port, has_nat_conflict,
    maybe_redirect_to_egress_gateway, snat_fwd,
};
pub use stage::{NatFwdStage, NodeportEgress, SnatStage, handle_nat_fwd, register_continuations};
pub use tables::NatTables;
pub use tuple::{extract_tuple, revalidate, snat_tuple};

use tracectl::trace_target;
trace_target!("nat", LevelFilter::INFO, &["datapath"]);
