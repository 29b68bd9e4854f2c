// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Helper types which are common between IPv4 and IPv6

use etherparse::IpNumber;
use std::fmt::Display;

/// Thin wrapper around the protocol / next-header octet.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NextHeader(pub u8);

impl NextHeader {
    /// IPv6 hop-by-hop options
    pub const HOPOPTS: NextHeader = NextHeader(0);
    /// ICMP (IPv4)
    pub const ICMP: NextHeader = NextHeader(IpNumber::ICMP.0);
    /// TCP
    pub const TCP: NextHeader = NextHeader(IpNumber::TCP.0);
    /// UDP
    pub const UDP: NextHeader = NextHeader(IpNumber::UDP.0);
    /// IPv6 routing header
    pub const ROUTING: NextHeader = NextHeader(43);
    /// IPv6 fragment header
    pub const FRAGMENT: NextHeader = NextHeader(44);
    /// Authentication header
    pub const AUTH: NextHeader = NextHeader(51);
    /// ICMPv6
    pub const ICMPV6: NextHeader = NextHeader(IpNumber::IPV6_ICMP.0);
    /// IPv6 "no next header"
    pub const NONE: NextHeader = NextHeader(59);
    /// IPv6 destination options
    pub const DSTOPTS: NextHeader = NextHeader(60);
    /// SCTP
    pub const SCTP: NextHeader = NextHeader(132);

    /// Return the protocol number as a `u8`
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// True for the transports whose first four bytes are a source and destination port.
    #[must_use]
    pub const fn has_ports(self) -> bool {
        matches!(self, Self::TCP | Self::UDP | Self::SCTP)
    }
}

impl From<u8> for NextHeader {
    fn from(value: u8) -> Self {
        NextHeader(value)
    }
}

impl From<NextHeader> for IpNumber {
    fn from(value: NextHeader) -> Self {
        IpNumber(value.0)
    }
}

impl Display for NextHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ICMP => write!(f, "icmp"),
            Self::TCP => write!(f, "tcp"),
            Self::UDP => write!(f, "udp"),
            Self::ICMPV6 => write!(f, "icmpv6"),
            Self::SCTP => write!(f, "sctp"),
            other => write!(f, "proto-{}", other.0),
        }
    }
}

/// Fragmentation state of an IP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragInfo {
    /// The packet is part of a fragmented datagram
    pub is_fragment: bool,
    /// The packet carries offset zero (and so the transport header)
    pub is_first: bool,
}

impl FragInfo {
    /// An unfragmented packet.
    pub const NONE: FragInfo = FragInfo {
        is_fragment: false,
        is_first: true,
    };

    /// True when the transport header is not present in this packet.
    #[must_use]
    pub const fn is_trailing(self) -> bool {
        self.is_fragment && !self.is_first
    }
}
