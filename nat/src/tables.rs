// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The external tables the NAT stages read.

use lookup::{ConnTrack, DeviceMacs, EndpointLookup, Fib, MasqueradePolicy, ReverseNatLookup};
use net::family::IpFamily;
use std::sync::Arc;

/// Read-only handles to every table one IP family of the NAT stages consults.
pub struct NatTables<F: IpFamily> {
    pub endpoints: Arc<dyn EndpointLookup>,
    pub rev_nat: Arc<dyn ReverseNatLookup<F>>,
    pub conntrack: Arc<dyn ConnTrack<F>>,
    pub masquerade: Arc<dyn MasqueradePolicy<F>>,
    pub fib: Arc<dyn Fib>,
    pub device_macs: Arc<dyn DeviceMacs>,
}

impl<F: IpFamily> Clone for NatTables<F> {
    fn clone(&self) -> Self {
        Self {
            endpoints: self.endpoints.clone(),
            rev_nat: self.rev_nat.clone(),
            conntrack: self.conntrack.clone(),
            masquerade: self.masquerade.clone(),
            fib: self.fib.clone(),
            device_macs: self.device_macs.clone(),
        }
    }
}
