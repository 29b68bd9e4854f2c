// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reverse NAT records

use net::family::IpFamily;
use net::tuple::L3Tuple;
use std::fmt::Display;

/// Original address and port to restore on a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseNatRecord<F: IpFamily> {
    pub address: F::Addr,
    pub port: u16,
}

impl<F: IpFamily> Display for ReverseNatRecord<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Lookup of the reverse NAT record of a flow.
pub trait ReverseNatLookup<F: IpFamily>: Send + Sync {
    fn lookup_rev_nat(&self, tuple: &L3Tuple<F>) -> Option<ReverseNatRecord<F>>;
}
