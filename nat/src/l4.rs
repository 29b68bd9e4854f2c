// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Address and port rewrites with differential checksum updates.

use net::buffer::{BufferAccess, PacketBufferMut};
use net::checksum::{CsumFlags, Delta, apply_l3, apply_l4};
use net::family::{IpFamily, L3Header};
use net::ip::NextHeader;
use net::packet::{DropError, DropReason};
use std::fmt::Display;
use tracing::trace;

pub(crate) const SPORT_OFF: usize = 0;
pub(crate) const DPORT_OFF: usize = 2;
pub(crate) const TCP_CSUM_OFF: usize = 16;
pub(crate) const UDP_CSUM_OFF: usize = 6;
pub(crate) const ICMP_CSUM_OFF: usize = 2;
pub(crate) const ICMP_ID_OFF: usize = 4;

/// The end of a flow a rewrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Source,
    Destination,
}

impl Display for End {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            End::Source => write!(f, "source"),
            End::Destination => write!(f, "destination"),
        }
    }
}

struct L4Layout {
    port_off: usize,
    csum_off: usize,
    flags: CsumFlags,
    pseudo_hdr: bool,
}

fn layout<F: IpFamily>(l3: &L3Header<F>, end: End) -> Result<Option<L4Layout>, DropError> {
    if l3.frag.is_trailing() {
        return Ok(None);
    }
    let port_off = |source, destination| {
        l3.l4_off
            + match end {
                End::Source => source,
                End::Destination => destination,
            }
    };
    let layout = match l3.nexthdr {
        NextHeader::TCP => L4Layout {
            port_off: port_off(SPORT_OFF, DPORT_OFF),
            csum_off: l3.l4_off + TCP_CSUM_OFF,
            flags: CsumFlags::PSEUDO_HDR,
            pseudo_hdr: true,
        },
        NextHeader::UDP => L4Layout {
            port_off: port_off(SPORT_OFF, DPORT_OFF),
            csum_off: l3.l4_off + UDP_CSUM_OFF,
            flags: F::UDP_CSUM_FLAGS,
            pseudo_hdr: true,
        },
        // the echo identifier stands for the port on both ends
        nh if nh == F::ICMP => L4Layout {
            port_off: l3.l4_off + ICMP_ID_OFF,
            csum_off: l3.l4_off + ICMP_CSUM_OFF,
            flags: if F::ICMP_PSEUDO_HDR {
                CsumFlags::PSEUDO_HDR
            } else {
                CsumFlags::empty()
            },
            pseudo_hdr: F::ICMP_PSEUDO_HDR,
        },
        other => {
            trace!("cannot rewrite {other}");
            return Err(DropReason::NatUnsuppProto.into());
        }
    };
    Ok(Some(layout))
}

/// Rewrite the address, and the port when given, of one end of the packet at `l3`.
///
/// The IPv4 header checksum and the transport checksum are patched differentially. A
/// fragment without the transport header only has its address rewritten.
///
/// # Errors
///
/// [`DropReason::NatUnsuppProto`] for a transport that cannot be rewritten (nothing is
/// written then), [`DropReason::CsumL3`] if the header checksum cannot be patched, or the
/// [`DropError`] of the first access that fails.
pub fn rewrite<F: IpFamily, Buf: PacketBufferMut>(
    buf: &mut Buf,
    l3: &L3Header<F>,
    end: End,
    addr: F::Addr,
    port: Option<u16>,
) -> Result<(), DropError> {
    let layout = layout(l3, end)?;

    let addr_off = l3.nh_off
        + match end {
            End::Source => F::SADDR_OFF,
            End::Destination => F::DADDR_OFF,
        };
    let old_addr = F::load_addr(buf, addr_off)?;
    F::store_addr(buf, addr_off, &addr)?;
    let addr_delta = Delta::between(F::octets(&old_addr).as_ref(), F::octets(&addr).as_ref())?;
    if let Some(csum_off) = F::L3_CSUM_OFF {
        apply_l3(buf, l3.nh_off + csum_off, addr_delta)
            .map_err(|_| DropError::from(DropReason::CsumL3))?;
    }
    trace!("{end} {old_addr} -> {addr}");

    let Some(layout) = layout else {
        return Ok(());
    };
    let mut delta = if layout.pseudo_hdr {
        addr_delta
    } else {
        Delta::ZERO
    };
    if let Some(port) = port {
        let old_port = buf.load_be16(layout.port_off)?;
        buf.store_be16(layout.port_off, port)?;
        delta = delta.combine(Delta::of_word(old_port, port));
        trace!("{end} port {old_port} -> {port}");
    }
    apply_l4(buf, layout.csum_off, delta, layout.flags)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::fixtures::{NODE, NODE6, POD, POD6, SERVER, SERVER6, v4, v6};
    use net::buffer::TestBuffer;
    use net::eth::ETH_HLEN;
    use net::family::{V4, V6};
    use net::ipv4;
    use pretty_assertions::assert_eq;

    fn rewrite_source<F: IpFamily>(frame: &[u8], addr: F::Addr, port: u16) -> Vec<u8> {
        let mut buf = TestBuffer::from_raw_data(frame);
        let l3 = F::parse(&buf, ETH_HLEN).unwrap();
        rewrite(&mut buf, &l3, End::Source, addr, Some(port)).unwrap();
        buf.to_vec()
    }

    #[test]
    fn udp4_source_rewrite_keeps_checksums_valid() {
        let frame = rewrite_source::<V4>(&v4::udp(POD, SERVER, 5000, 53), NODE, 40000);
        let decoded = v4::Decoded::new(&frame);
        assert_eq!(decoded.source(), NODE);
        assert_eq!(decoded.ports(), (40000, 53));
        assert!(decoded.checksums_are_valid());
    }

    #[test]
    fn tcp4_destination_rewrite() {
        let mut buf = TestBuffer::from_raw_data(&v4::tcp(SERVER, NODE, 443, 40000));
        let l3 = V4::parse(&buf, ETH_HLEN).unwrap();
        rewrite(&mut buf, &l3, End::Destination, POD, Some(5000)).unwrap();
        let decoded = v4::Decoded::new(&buf.to_vec());
        assert_eq!(decoded.destination(), POD);
        assert_eq!(decoded.ports(), (443, 5000));
        assert!(decoded.checksums_are_valid());
    }

    #[test]
    fn icmp4_identifier_ignores_addresses() {
        let frame = rewrite_source::<V4>(&v4::icmp_echo(POD, SERVER, 8, 0x1234), NODE, 33000);
        let decoded = v4::Decoded::new(&frame);
        assert_eq!(decoded.source(), NODE);
        assert_eq!(decoded.icmp_id(), 33000);
        assert!(decoded.checksums_are_valid());
    }

    #[test]
    fn disabled_udp4_checksum_stays_disabled() {
        let mut frame = v4::udp(POD, SERVER, 5000, 53);
        let csum_off = ETH_HLEN + ipv4::MIN_LEN + UDP_CSUM_OFF;
        frame[csum_off..csum_off + 2].fill(0);
        let frame = rewrite_source::<V4>(&frame, NODE, 40000);
        assert_eq!(&frame[csum_off..csum_off + 2], &[0, 0]);
        assert!(v4::Decoded::new(&frame).header_checksum_is_valid());
    }

    #[test]
    fn ipv6_rewrites() {
        let frame = rewrite_source::<V6>(&v6::udp(POD6, SERVER6, 5000, 53), NODE6, 40000);
        let decoded = v6::Decoded::new(&frame);
        assert_eq!(decoded.source(), NODE6);
        assert!(decoded.checksum_is_valid());

        let frame = rewrite_source::<V6>(&v6::icmp_echo(POD6, SERVER6, 0x99), NODE6, 33000);
        let decoded = v6::Decoded::new(&frame);
        assert_eq!(decoded.source(), NODE6);
        assert!(decoded.checksum_is_valid());
    }

    #[test]
    fn unsupported_transport_is_left_alone() {
        let mut frame = v4::udp(POD, SERVER, 5000, 53);
        frame[ETH_HLEN + ipv4::PROTO_OFF] = 132;
        let mut buf = TestBuffer::from_raw_data(&frame);
        let l3 = V4::parse(&buf, ETH_HLEN).unwrap();
        let err = rewrite(&mut buf, &l3, End::Source, NODE, Some(1)).unwrap_err();
        assert_eq!(err.reason, DropReason::NatUnsuppProto);
        assert_eq!(buf.to_vec(), frame);
    }
}
