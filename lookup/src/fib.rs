// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! FIB lookups

use net::eth::mac::Mac;
use net::packet::{DropError, IfIndex};
use std::fmt::Display;
use std::net::IpAddr;

/// Input of a FIB lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibParams {
    pub ifindex: IfIndex, /* device the packet currently sits on */
    pub src: IpAddr,
    pub dst: IpAddr,
}

impl Display for FibParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} (from {})", self.src, self.dst, self.ifindex)
    }
}

/// A resolved route: egress device and the L2 addresses to use on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibRoute {
    pub ifindex: IfIndex,
    pub smac: Mac,
    pub dmac: Mac,
}

/// Route resolution. A missing route is reported as a [`DropError`] (usually `NoFib`).
pub trait Fib: Send + Sync {
    fn lookup(&self, params: &FibParams) -> Result<FibRoute, DropError>;
}
