// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![forbid(unsafe_code)] // Byte-level mutation must stay strictly safe
#![warn(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Wire layouts, checked buffer access and checksum arithmetic for the nodeport datapath.
//!
//! Nothing in this crate holds a pointer into a packet: every read and write goes through
//! [`buffer::BufferAccess`], which checks bounds and reports failures as a [`Result`].

pub mod buffer;
pub mod checksum;
pub mod eth;
pub mod family;
pub mod icmp6;
pub mod ip;
pub mod ipv4;
pub mod ipv6;
pub mod packet;
pub mod tuple;

use tracectl::trace_target;
trace_target!("net", LevelFilter::INFO, &["datapath"]);
