// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 header layout

use crate::buffer::{BufferAccess, PacketBufferMut};
use crate::family::{L3Header, V4};
use crate::ip::{FragInfo, NextHeader};
use crate::packet::{DropError, DropReason};
use etherparse::Ipv4HeaderSlice;
use tracing::{debug, trace};

/// Minimum length of an IPv4 header
pub const MIN_LEN: usize = 20;
/// Maximum length of an IPv4 header
pub const MAX_LEN: usize = 60;
/// Offset of the total length field
pub const TOT_LEN_OFF: usize = 2;
/// Offset of the flags / fragment offset field
pub const FRAG_OFF: usize = 6;
/// Offset of the protocol field
pub const PROTO_OFF: usize = 9;
/// Offset of the header checksum
pub const CSUM_OFF: usize = 10;
/// Offset of the source address
pub const SADDR_OFF: usize = 12;
/// Offset of the destination address
pub const DADDR_OFF: usize = 16;

/// Parse the IPv4 header at `nh_off`.
///
/// # Errors
///
/// [`DropReason::Invalid`] if the header is truncated or malformed.
pub fn parse<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<L3Header<V4>, DropError> {
    let bytes = buf
        .as_ref()
        .get(nh_off..)
        .ok_or(DropError::from(DropReason::Invalid))?;
    let header = Ipv4HeaderSlice::from_slice(bytes).map_err(|e| {
        debug!("invalid ipv4 header at {nh_off}: {e}");
        DropError::from(DropReason::Invalid)
    })?;
    let hdr_len = usize::from(header.ihl()) * 4;
    let offset = header.fragments_offset().value();
    let frag = FragInfo {
        is_fragment: header.more_fragments() || offset != 0,
        is_first: offset == 0,
    };
    let l3 = L3Header {
        nh_off,
        nexthdr: NextHeader(header.protocol().0),
        l4_off: nh_off + hdr_len,
        frag,
        saddr: header.source_addr(),
        daddr: header.destination_addr(),
    };
    trace!("ipv4 {} -> {} {} (l4 at {})", l3.saddr, l3.daddr, l3.nexthdr, l3.l4_off);
    Ok(l3)
}

/// Read the total length field.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn load_tot_len<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<u16, DropError> {
    Ok(buf.load_be16(nh_off + TOT_LEN_OFF)?)
}
