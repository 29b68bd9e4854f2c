// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Connection tuple used to key conntrack and NAT lookups.

use crate::family::IpFamily;
use crate::ip::NextHeader;
use std::fmt::Display;

/// Protocol, addresses and ports (or ICMP type / identifier) of a flow.
///
/// For ICMP echo, `sport` holds the identifier and `dport` the message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct L3Tuple<F: IpFamily> {
    /// Upper-layer protocol
    pub nexthdr: NextHeader,
    /// Source address
    pub saddr: F::Addr,
    /// Destination address
    pub daddr: F::Addr,
    /// Source port or ICMP identifier
    pub sport: u16,
    /// Destination port or ICMP type
    pub dport: u16,
}

impl<F: IpFamily> L3Tuple<F> {
    /// The tuple of the opposite direction of the same flow.
    #[must_use]
    pub fn reversed(&self) -> Self {
        L3Tuple {
            nexthdr: self.nexthdr,
            saddr: self.daddr,
            daddr: self.saddr,
            sport: self.dport,
            dport: self.sport,
        }
    }
}

impl<F: IpFamily> Display for L3Tuple<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{}",
            self.nexthdr, self.saddr, self.sport, self.daddr, self.dport
        )
    }
}
