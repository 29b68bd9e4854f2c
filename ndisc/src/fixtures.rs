// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Frames shared by the tests of this crate.

#![allow(clippy::unwrap_used)]

use etherparse::{Ethernet2Header, Icmpv6Header, Ipv6Header, PacketBuilder};
use net::eth::ETH_HLEN;
use net::eth::mac::Mac;
use net::ipv6;
use std::net::Ipv6Addr;

pub const IFACE_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x01]);
pub const PEER_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x02]);
pub const ROUTER: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1);
pub const PEER: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x20);
pub const ENDPOINT: Ipv6Addr = Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x30);
pub const DISTANT: Ipv6Addr = Ipv6Addr::new(0xfd01, 0, 0, 0, 0, 0, 0, 0x40);

/// Neighbor solicitation from [`PEER`] for `target`, sent to `dmac`.
pub fn ns_frame_to(dmac: Mac, target: Ipv6Addr, source_ll_option: bool) -> Vec<u8> {
    let mut payload = target.octets().to_vec();
    if source_ll_option {
        payload.extend_from_slice(&[net::icmp6::ND_OPT_SOURCE_LL_ADDR, 1]);
        payload.extend_from_slice(&PEER_MAC.0);
    }
    let builder = PacketBuilder::ethernet2(PEER_MAC.0, dmac.0)
        .ipv6(PEER.octets(), target.octets(), 255)
        .icmpv6_raw(net::icmp6::NS, 0, [0; 4]);
    let mut frame = Vec::new();
    builder.write(&mut frame, &payload).unwrap();
    frame
}

/// Unicast neighbor solicitation from [`PEER`] for `target`.
pub fn ns_frame(target: Ipv6Addr, source_ll_option: bool) -> Vec<u8> {
    ns_frame_to(IFACE_MAC, target, source_ll_option)
}

/// UDP datagram from [`PEER`] to [`DISTANT`] with the given hop limit and payload.
pub fn udp_frame(hop_limit: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
        .ipv6(PEER.octets(), DISTANT.octets(), hop_limit)
        .udp(5353, 53);
    let mut frame = Vec::new();
    builder.write(&mut frame, payload).unwrap();
    frame
}

/// TCP segment from [`PEER`] to [`DISTANT`] with the given hop limit and payload.
pub fn tcp_frame(hop_limit: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
        .ipv6(PEER.octets(), DISTANT.octets(), hop_limit)
        .tcp(40000, 443, 1, 512);
    let mut frame = Vec::new();
    builder.write(&mut frame, payload).unwrap();
    frame
}

/// ICMPv6 message of the given type from [`PEER`] to [`ROUTER`].
pub fn icmp6_frame(icmp_type: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(PEER_MAC.0, IFACE_MAC.0)
        .ipv6(PEER.octets(), ROUTER.octets(), 64)
        .icmpv6_raw(icmp_type, 0, [0; 4]);
    let mut frame = Vec::new();
    builder.write(&mut frame, payload).unwrap();
    frame
}

/// `frame` with an 8 byte extension header of type `kind` in front of its upper layer.
pub fn with_ext_header(frame: &[u8], kind: u8) -> Vec<u8> {
    let nh_off = ETH_HLEN;
    let mut out = frame[..nh_off + ipv6::HLEN].to_vec();
    let upper = out[nh_off + ipv6::NEXTHDR_OFF];
    out[nh_off + ipv6::NEXTHDR_OFF] = kind;
    let plen = u16::from_be_bytes([out[nh_off + 4], out[nh_off + 5]]) + 8;
    out[nh_off + 4..nh_off + 6].copy_from_slice(&plen.to_be_bytes());
    out.extend_from_slice(&[upper, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&frame[nh_off + ipv6::HLEN..]);
    out
}

/// A frame decoded with etherparse.
pub struct Decoded {
    pub eth: Ethernet2Header,
    pub ip: Ipv6Header,
    pub icmp: Icmpv6Header,
    pub icmp_payload: Vec<u8>,
}

impl Decoded {
    pub fn new(frame: &[u8]) -> Decoded {
        let (eth, rest) = Ethernet2Header::from_slice(frame).unwrap();
        let (ip, rest) = Ipv6Header::from_slice(rest).unwrap();
        let (icmp, rest) = Icmpv6Header::from_slice(rest).unwrap();
        Decoded {
            eth,
            ip,
            icmp,
            icmp_payload: rest.to_vec(),
        }
    }

    /// Recompute the ICMPv6 checksum from scratch with etherparse and compare.
    pub fn checksum_is_valid(&self) -> bool {
        let expected = self
            .icmp
            .icmp_type
            .calc_checksum(self.ip.source, self.ip.destination, &self.icmp_payload)
            .unwrap();
        expected == self.icmp.checksum
    }

    pub fn source(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.ip.source)
    }

    pub fn destination(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.ip.destination)
    }
}
