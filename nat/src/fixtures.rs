// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Addresses and frames shared by the tests of this crate.

#![allow(clippy::unwrap_used)]

use crate::NatTables;
use config::DatapathConfigBuilder;
use lookup::testing::{
    CtTable, DeviceMacTable, EndpointTable, RevNatTable, StaticFib, StaticMasquerade,
};
use net::eth::mac::Mac;
use net::family::IpFamily;
use net::packet::IfIndex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

pub const IFACE_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x01]);
pub const PEER_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x02]);
pub const GW_SMAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x0a]);
pub const GW_DMAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x0b]);

pub const POD: Ipv4Addr = Ipv4Addr::new(10, 0, 1, 5);
pub const SERVER: Ipv4Addr = Ipv4Addr::new(1, 1, 1, 1);
pub const NODE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
pub const GATEWAY: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

pub const POD6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 5);
pub const SERVER6: Ipv6Addr = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
pub const NODE6: Ipv6Addr = Ipv6Addr::new(0xfd00, 1, 0, 0, 0, 0, 0, 0x10);
pub const ROUTER6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1);

const PAYLOAD: &[u8] = b"nodeport egress";

/// Configuration of a program on `if2`; callers adjust and build it.
pub fn base_config() -> DatapathConfigBuilder {
    let mut builder = DatapathConfigBuilder::default();
    builder
        .ifindex(IfIndex(2))
        .iface_mac(IFACE_MAC)
        .router_ipv6(ROUTER6);
    builder
}

/// Empty tables: nothing is masqueraded, tracked or routed.
pub fn tables<F: IpFamily>() -> NatTables<F> {
    NatTables {
        endpoints: Arc::new(EndpointTable::new()),
        rev_nat: Arc::new(RevNatTable::<F>::new()),
        conntrack: Arc::new(CtTable::<F>::new()),
        masquerade: Arc::new(StaticMasquerade::<F>::new()),
        fib: Arc::new(StaticFib::new()),
        device_macs: Arc::new(DeviceMacTable::new()),
    }
}

pub mod v4 {
    use super::{IFACE_MAC, PAYLOAD, PEER_MAC};
    use etherparse::{
        Ethernet2Header, Icmpv4Header, IpNumber, Ipv4Header, PacketBuilder, TcpHeader, UdpHeader,
    };
    use net::eth::mac::Mac;
    use std::net::Ipv4Addr;

    pub fn udp(src: Ipv4Addr, dst: Ipv4Addr, sport: u16, dport: u16) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
            .ipv4(src.octets(), dst.octets(), 64)
            .udp(sport, dport);
        let mut frame = Vec::new();
        builder.write(&mut frame, PAYLOAD).unwrap();
        frame
    }

    pub fn tcp(src: Ipv4Addr, dst: Ipv4Addr, sport: u16, dport: u16) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
            .ipv4(src.octets(), dst.octets(), 64)
            .tcp(sport, dport, 1, 512);
        let mut frame = Vec::new();
        builder.write(&mut frame, PAYLOAD).unwrap();
        frame
    }

    /// ICMP message of `icmp_type` whose identifier field is `id`.
    pub fn icmp_echo(src: Ipv4Addr, dst: Ipv4Addr, icmp_type: u8, id: u16) -> Vec<u8> {
        let [hi, lo] = id.to_be_bytes();
        let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
            .ipv4(src.octets(), dst.octets(), 64)
            .icmpv4_raw(icmp_type, 0, [hi, lo, 0, 1]);
        let mut frame = Vec::new();
        builder.write(&mut frame, PAYLOAD).unwrap();
        frame
    }

    pub struct Decoded {
        pub eth: Ethernet2Header,
        pub ip: Ipv4Header,
        pub l4: Vec<u8>,
    }

    impl Decoded {
        pub fn new(frame: &[u8]) -> Decoded {
            let (eth, rest) = Ethernet2Header::from_slice(frame).unwrap();
            let (ip, rest) = Ipv4Header::from_slice(rest).unwrap();
            Decoded {
                eth,
                ip,
                l4: rest.to_vec(),
            }
        }

        pub fn source(&self) -> Ipv4Addr {
            Ipv4Addr::from(self.ip.source)
        }

        pub fn destination(&self) -> Ipv4Addr {
            Ipv4Addr::from(self.ip.destination)
        }

        pub fn smac(&self) -> Mac {
            Mac(self.eth.source)
        }

        pub fn dmac(&self) -> Mac {
            Mac(self.eth.destination)
        }

        pub fn ports(&self) -> (u16, u16) {
            (
                u16::from_be_bytes([self.l4[0], self.l4[1]]),
                u16::from_be_bytes([self.l4[2], self.l4[3]]),
            )
        }

        pub fn icmp_id(&self) -> u16 {
            u16::from_be_bytes([self.l4[4], self.l4[5]])
        }

        pub fn header_checksum_is_valid(&self) -> bool {
            self.ip.header_checksum == self.ip.calc_header_checksum()
        }

        /// Recompute the header and transport checksums from scratch with etherparse and compare.
        pub fn checksums_are_valid(&self) -> bool {
            let l4_valid = match self.ip.protocol {
                IpNumber::UDP => {
                    let (udp, payload) = UdpHeader::from_slice(&self.l4).unwrap();
                    udp.checksum == 0
                        || udp.calc_checksum_ipv4(&self.ip, payload).unwrap() == udp.checksum
                }
                IpNumber::TCP => {
                    let (tcp, payload) = TcpHeader::from_slice(&self.l4).unwrap();
                    tcp.calc_checksum_ipv4(&self.ip, payload).unwrap() == tcp.checksum
                }
                IpNumber::ICMP => {
                    let (icmp, payload) = Icmpv4Header::from_slice(&self.l4).unwrap();
                    icmp.icmp_type.calc_checksum(payload) == icmp.checksum
                }
                _ => false,
            };
            l4_valid && self.header_checksum_is_valid()
        }
    }
}

pub mod v6 {
    use super::{IFACE_MAC, PAYLOAD, PEER_MAC};
    use etherparse::{
        Ethernet2Header, Icmpv6Header, IpNumber, Ipv6Header, PacketBuilder, TcpHeader, UdpHeader,
    };
    use net::eth::mac::Mac;
    use std::net::Ipv6Addr;

    pub fn udp(src: Ipv6Addr, dst: Ipv6Addr, sport: u16, dport: u16) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
            .ipv6(src.octets(), dst.octets(), 64)
            .udp(sport, dport);
        let mut frame = Vec::new();
        builder.write(&mut frame, PAYLOAD).unwrap();
        frame
    }

    pub fn tcp(src: Ipv6Addr, dst: Ipv6Addr, sport: u16, dport: u16) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
            .ipv6(src.octets(), dst.octets(), 64)
            .tcp(sport, dport, 1, 512);
        let mut frame = Vec::new();
        builder.write(&mut frame, PAYLOAD).unwrap();
        frame
    }

    pub fn icmp_echo(src: Ipv6Addr, dst: Ipv6Addr, id: u16) -> Vec<u8> {
        let [hi, lo] = id.to_be_bytes();
        let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
            .ipv6(src.octets(), dst.octets(), 64)
            .icmpv6_raw(net::icmp6::ECHO_REQUEST, 0, [hi, lo, 0, 1]);
        let mut frame = Vec::new();
        builder.write(&mut frame, PAYLOAD).unwrap();
        frame
    }

    pub struct Decoded {
        pub eth: Ethernet2Header,
        pub ip: Ipv6Header,
        pub l4: Vec<u8>,
    }

    impl Decoded {
        pub fn new(frame: &[u8]) -> Decoded {
            let (eth, rest) = Ethernet2Header::from_slice(frame).unwrap();
            let (ip, rest) = Ipv6Header::from_slice(rest).unwrap();
            Decoded {
                eth,
                ip,
                l4: rest.to_vec(),
            }
        }

        pub fn source(&self) -> Ipv6Addr {
            Ipv6Addr::from(self.ip.source)
        }

        pub fn destination(&self) -> Ipv6Addr {
            Ipv6Addr::from(self.ip.destination)
        }

        pub fn dmac(&self) -> Mac {
            Mac(self.eth.destination)
        }

        pub fn ports(&self) -> (u16, u16) {
            (
                u16::from_be_bytes([self.l4[0], self.l4[1]]),
                u16::from_be_bytes([self.l4[2], self.l4[3]]),
            )
        }

        /// Recompute the transport checksum from scratch with etherparse and compare.
        pub fn checksum_is_valid(&self) -> bool {
            match self.ip.next_header {
                IpNumber::UDP => {
                    let (udp, payload) = UdpHeader::from_slice(&self.l4).unwrap();
                    udp.calc_checksum_ipv6(&self.ip, payload).unwrap() == udp.checksum
                }
                IpNumber::TCP => {
                    let (tcp, payload) = TcpHeader::from_slice(&self.l4).unwrap();
                    tcp.calc_checksum_ipv6(&self.ip, payload).unwrap() == tcp.checksum
                }
                IpNumber::IPV6_ICMP => {
                    let (icmp, payload) = Icmpv6Header::from_slice(&self.l4).unwrap();
                    icmp.icmp_type
                        .calc_checksum(self.ip.source, self.ip.destination, payload)
                        .unwrap()
                        == icmp.checksum
                }
                _ => false,
            }
        }
    }
}
