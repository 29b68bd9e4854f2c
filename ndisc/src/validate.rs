// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use net::buffer::{BufferAccess, PacketBufferMut};
use net::eth::{self, mac::Mac};
use net::icmp6;
use net::ip::NextHeader;
use net::ipv6;
use std::net::Ipv6Addr;
use tracing::trace;

/// Check that the frame carries a neighbor solicitation we should answer, and return its target.
///
/// The IPv6 header sits at `nh_off` and must be directly followed by the ICMPv6 header, as the
/// advertisement is built in place at that offset. Solicitations behind extension headers, or
/// with a malformed extension chain, are rejected. The solicitation must be complete up to its
/// target address and the frame must be addressed either to the target's solicited-node
/// multicast MAC or to `iface_mac`.
#[must_use]
pub fn validate_solicitation<Buf: PacketBufferMut>(
    buf: &Buf,
    nh_off: usize,
    iface_mac: Mac,
) -> Option<Ipv6Addr> {
    let (nexthdr, hdr_len, _) = ipv6::header_len_with_fraginfo(buf, nh_off).ok()?;
    if nexthdr != NextHeader::ICMPV6 {
        return None;
    }
    if hdr_len != ipv6::HLEN {
        trace!(
            "solicitation behind {} bytes of extension headers, ignoring",
            hdr_len - ipv6::HLEN
        );
        return None;
    }
    let ns = buf.load::<{ icmp6::ND_OPT_OFF }>(nh_off + hdr_len).ok()?;
    if ns[icmp6::TYPE_OFF] != icmp6::NS {
        return None;
    }
    let mut target = [0u8; 16];
    target.copy_from_slice(&ns[icmp6::ND_TARGET_OFF..]);
    let target = Ipv6Addr::from(target);

    let dmac = eth::load_dmac(buf).ok()?;
    if dmac != Mac::solicited_node_multicast(&target) && dmac != iface_mac {
        trace!("solicitation for {target} sent to {dmac}, ignoring");
        return None;
    }
    Some(target)
}
