// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Abstraction over the two IP families, so that NAT logic is written once.

use crate::buffer::{AccessError, BufferAccess, PacketBufferMut};
use crate::checksum::CsumFlags;
use crate::eth::{ETH_P_IP, ETH_P_IPV6};
use crate::ip::{FragInfo, NextHeader};
use crate::packet::DropError;
use crate::{icmp6, ipv4, ipv6};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Summary of a parsed IP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L3Header<F: IpFamily> {
    /// Offset of the IP header
    pub nh_off: usize,
    /// Upper-layer protocol (after any IPv6 extension headers)
    pub nexthdr: NextHeader,
    /// Offset of the upper-layer header
    pub l4_off: usize,
    /// Fragmentation state
    pub frag: FragInfo,
    /// Source address
    pub saddr: F::Addr,
    /// Destination address
    pub daddr: F::Addr,
}

/// An IP family: address type, header layout and checksum conventions.
pub trait IpFamily: Copy + Debug + Default + PartialEq + Eq + Hash + Send + Sync + 'static {
    /// Address type
    type Addr: Copy + Eq + Hash + Debug + Display + Send + Sync + Into<IpAddr> + 'static;
    /// Wire representation of an address
    type Octets: AsRef<[u8]> + Copy;

    /// Human readable family name
    const NAME: &'static str;
    /// Ethertype
    const ETH_PROTO: u16;
    /// Offset of the source address inside the IP header
    const SADDR_OFF: usize;
    /// Offset of the destination address inside the IP header
    const DADDR_OFF: usize;
    /// Offset of the header checksum, if the family has one
    const L3_CSUM_OFF: Option<usize>;
    /// The family's ICMP protocol number
    const ICMP: NextHeader;
    /// ICMP echo request type
    const ICMP_ECHO_REQUEST: u8;
    /// ICMP echo reply type
    const ICMP_ECHO_REPLY: u8;
    /// Whether the ICMP checksum covers the pseudo-header
    const ICMP_PSEUDO_HDR: bool;
    /// Flags to use when patching a UDP checksum
    const UDP_CSUM_FLAGS: CsumFlags;

    /// Wire representation of `addr`.
    fn octets(addr: &Self::Addr) -> Self::Octets;

    /// Read an address at `off`.
    ///
    /// # Errors
    ///
    /// Fails if the address is not inside the buffer.
    fn load_addr<Buf: PacketBufferMut>(buf: &Buf, off: usize) -> Result<Self::Addr, AccessError>;

    /// Parse the IP header at `nh_off`.
    ///
    /// # Errors
    ///
    /// Fails with a [`DropError`] if the header is malformed or truncated.
    fn parse<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<L3Header<Self>, DropError>;

    /// Write an address at `off`.
    ///
    /// # Errors
    ///
    /// Fails if the address is not inside the buffer.
    fn store_addr<Buf: PacketBufferMut>(
        buf: &mut Buf,
        off: usize,
        addr: &Self::Addr,
    ) -> Result<(), AccessError> {
        buf.store_bytes(off, Self::octets(addr).as_ref())
    }
}

/// IPv4
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct V4;

/// IPv6
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct V6;

impl IpFamily for V4 {
    type Addr = Ipv4Addr;
    type Octets = [u8; 4];

    const NAME: &'static str = "ipv4";
    const ETH_PROTO: u16 = ETH_P_IP;
    const SADDR_OFF: usize = ipv4::SADDR_OFF;
    const DADDR_OFF: usize = ipv4::DADDR_OFF;
    const L3_CSUM_OFF: Option<usize> = Some(ipv4::CSUM_OFF);
    const ICMP: NextHeader = NextHeader::ICMP;
    const ICMP_ECHO_REQUEST: u8 = 8;
    const ICMP_ECHO_REPLY: u8 = 0;
    const ICMP_PSEUDO_HDR: bool = false;
    const UDP_CSUM_FLAGS: CsumFlags = CsumFlags::PSEUDO_HDR.union(CsumFlags::MANGLED_0);

    fn octets(addr: &Ipv4Addr) -> [u8; 4] {
        addr.octets()
    }

    fn load_addr<Buf: PacketBufferMut>(buf: &Buf, off: usize) -> Result<Ipv4Addr, AccessError> {
        buf.load::<4>(off).map(Ipv4Addr::from)
    }

    fn parse<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<L3Header<V4>, DropError> {
        ipv4::parse(buf, nh_off)
    }
}

impl IpFamily for V6 {
    type Addr = Ipv6Addr;
    type Octets = [u8; 16];

    const NAME: &'static str = "ipv6";
    const ETH_PROTO: u16 = ETH_P_IPV6;
    const SADDR_OFF: usize = ipv6::SADDR_OFF;
    const DADDR_OFF: usize = ipv6::DADDR_OFF;
    const L3_CSUM_OFF: Option<usize> = None;
    const ICMP: NextHeader = NextHeader::ICMPV6;
    const ICMP_ECHO_REQUEST: u8 = icmp6::ECHO_REQUEST;
    const ICMP_ECHO_REPLY: u8 = icmp6::ECHO_REPLY;
    const ICMP_PSEUDO_HDR: bool = true;
    const UDP_CSUM_FLAGS: CsumFlags = CsumFlags::PSEUDO_HDR;

    fn octets(addr: &Ipv6Addr) -> [u8; 16] {
        addr.octets()
    }

    fn load_addr<Buf: PacketBufferMut>(buf: &Buf, off: usize) -> Result<Ipv6Addr, AccessError> {
        buf.load::<16>(off).map(Ipv6Addr::from)
    }

    fn parse<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<L3Header<V6>, DropError> {
        ipv6::parse(buf, nh_off)
    }
}
