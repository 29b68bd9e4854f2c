// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Flow tuples read off the packet.

use net::buffer::{BufferAccess, PacketBufferMut};
use net::eth::{self, ETH_HLEN};
use net::family::{IpFamily, L3Header};
use net::packet::{Direction, DropError, DropReason};
use net::tuple::L3Tuple;
use tracing::trace;

use crate::l4;

/// Parse the IP header behind the Ethernet header again. Called after anything that may have
/// moved or resized the frame.
///
/// # Errors
///
/// [`DropReason::UnknownL3`] if the frame does not carry family `F`, otherwise the parse error.
pub fn revalidate<F: IpFamily, Buf: PacketBufferMut>(buf: &Buf) -> Result<L3Header<F>, DropError> {
    if eth::load_proto(buf)? != F::ETH_PROTO {
        return Err(DropReason::UnknownL3.into());
    }
    F::parse(buf, ETH_HLEN)
}

fn ports<F: IpFamily, Buf: PacketBufferMut>(
    buf: &Buf,
    l3: &L3Header<F>,
) -> Result<(u16, u16), DropError> {
    if l3.frag.is_trailing() {
        return Err(DropReason::FragNoSupport.into());
    }
    let sport = buf.load_be16(l3.l4_off + l4::SPORT_OFF)?;
    let dport = buf.load_be16(l3.l4_off + l4::DPORT_OFF)?;
    Ok((sport, dport))
}

fn oriented<F: IpFamily>(tuple: L3Tuple<F>, direction: Direction) -> L3Tuple<F> {
    match direction {
        Direction::Egress => tuple,
        Direction::Ingress => tuple.reversed(),
    }
}

/// Service tuple of the packet.
///
/// An egress tuple reads as the packet does on the wire, an ingress one is reversed.
///
/// # Errors
///
/// [`DropReason::UnsuppServiceProto`] for ICMP, [`DropReason::UnknownL4`] for any other
/// transport without ports. Both mean "not service traffic" and are recovered by callers
/// (see [`DropError::is_recoverable`]). [`DropReason::FragNoSupport`] for a fragment without
/// the transport header.
pub fn extract_tuple<F: IpFamily, Buf: PacketBufferMut>(
    buf: &Buf,
    l3: &L3Header<F>,
    direction: Direction,
) -> Result<L3Tuple<F>, DropError> {
    if l3.nexthdr == F::ICMP {
        return Err(DropReason::UnsuppServiceProto.into());
    }
    if !l3.nexthdr.has_ports() {
        return Err(DropReason::UnknownL4.into());
    }
    let (sport, dport) = ports(buf, l3)?;
    let tuple = L3Tuple {
        nexthdr: l3.nexthdr,
        saddr: l3.saddr,
        daddr: l3.daddr,
        sport,
        dport,
    };
    trace!("extracted {direction} tuple {tuple}");
    Ok(oriented(tuple, direction))
}

/// Tuple of a packet about to be source-translated: ports, or the identifier and type of an
/// ICMP echo message.
///
/// # Errors
///
/// [`DropReason::NatNotNeeded`] for a transport that is never translated,
/// [`DropReason::NatUnsuppProto`] for ICMP other than echo, [`DropReason::FragNoSupport`] for
/// a fragment without the transport header.
pub fn snat_tuple<F: IpFamily, Buf: PacketBufferMut>(
    buf: &Buf,
    l3: &L3Header<F>,
) -> Result<L3Tuple<F>, DropError> {
    let (sport, dport) = if l3.nexthdr.has_ports() {
        ports(buf, l3)?
    } else if l3.nexthdr == F::ICMP {
        if l3.frag.is_trailing() {
            return Err(DropReason::FragNoSupport.into());
        }
        let icmp_type = buf.load_u8(l3.l4_off)?;
        if icmp_type != F::ICMP_ECHO_REQUEST && icmp_type != F::ICMP_ECHO_REPLY {
            trace!("{} type {icmp_type} is not translated", F::ICMP);
            return Err(DropReason::NatUnsuppProto.into());
        }
        let id = buf.load_be16(l3.l4_off + l4::ICMP_ID_OFF)?;
        (id, u16::from(icmp_type))
    } else {
        return Err(DropReason::NatNotNeeded.into());
    };
    Ok(L3Tuple {
        nexthdr: l3.nexthdr,
        saddr: l3.saddr,
        daddr: l3.daddr,
        sport,
        dport,
    })
}
