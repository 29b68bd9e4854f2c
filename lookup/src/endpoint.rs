// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Local endpoint table

use bitflags::bitflags;
use net::packet::IfIndex;
use std::net::IpAddr;

bitflags! {
    /// Endpoint properties
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EndpointFlags: u8 {
        /// The endpoint is the node itself
        const HOST = 1 << 0;
    }
}

/// What the endpoint table knows about a local address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointInfo {
    pub id: u16,
    pub flags: EndpointFlags,
    pub parent_ifindex: Option<IfIndex>, /* physical device the endpoint sits behind */
}

impl EndpointInfo {
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.flags.contains(EndpointFlags::HOST)
    }
}

/// Lookup of local endpoints by address.
pub trait EndpointLookup: Send + Sync {
    fn lookup_endpoint(&self, addr: IpAddr) -> Option<EndpointInfo>;
}
