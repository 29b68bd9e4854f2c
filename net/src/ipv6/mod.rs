// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv6 header layout and extension header walk

use crate::buffer::{AccessError, BufferAccess, PacketBufferMut};
use crate::family::{L3Header, V6};
use crate::ip::{FragInfo, NextHeader};
use crate::packet::{DropError, DropReason};
use etherparse::Ipv6HeaderSlice;
use std::net::Ipv6Addr;
use tracing::{debug, trace};

/// Length of the fixed IPv6 header
pub const HLEN: usize = 40;
/// Offset of the payload length
pub const PAYLOAD_LEN_OFF: usize = 4;
/// Offset of the next header field
pub const NEXTHDR_OFF: usize = 6;
/// Offset of the hop limit
pub const HOP_LIMIT_OFF: usize = 7;
/// Offset of the source address
pub const SADDR_OFF: usize = 8;
/// Offset of the destination address
pub const DADDR_OFF: usize = 24;
/// Most extension headers walked before giving up
pub const MAX_EXT_HEADERS: usize = 4;

/// Walk the extension headers following the fixed header at `nh_off`.
///
/// Returns the upper-layer protocol, the combined length of the fixed and extension headers,
/// and the fragmentation state.
///
/// # Errors
///
/// [`DropReason::InvalidExthdr`] if the chain is longer than [`MAX_EXT_HEADERS`] or ends in
/// "no next header"; [`DropReason::Invalid`] if it runs past the end of the buffer.
pub fn header_len_with_fraginfo<Buf: PacketBufferMut>(
    buf: &Buf,
    nh_off: usize,
) -> Result<(NextHeader, usize, FragInfo), DropError> {
    let mut nexthdr = NextHeader(buf.load_u8(nh_off + NEXTHDR_OFF)?);
    let mut len = HLEN;
    let mut frag = FragInfo::NONE;
    for _ in 0..MAX_EXT_HEADERS {
        let opt_off = nh_off + len;
        let hdr_len = match nexthdr {
            NextHeader::NONE => return Err(DropReason::InvalidExthdr.into()),
            NextHeader::FRAGMENT => {
                let frag_field = buf.load_be16(opt_off + 2)?;
                frag = FragInfo {
                    is_fragment: true,
                    is_first: frag_field & 0xfff8 == 0,
                };
                8
            }
            NextHeader::AUTH => (usize::from(buf.load_u8(opt_off + 1)?) + 2) << 2,
            NextHeader::HOPOPTS | NextHeader::ROUTING | NextHeader::DSTOPTS => {
                (usize::from(buf.load_u8(opt_off + 1)?) + 1) << 3
            }
            upper => {
                trace!("ipv6 upper layer {upper} after {len} bytes of headers");
                return Ok((upper, len, frag));
            }
        };
        nexthdr = NextHeader(buf.load_u8(opt_off)?);
        len += hdr_len;
    }
    debug!("ipv6 extension header chain too long");
    Err(DropReason::InvalidExthdr.into())
}

/// Parse the IPv6 header at `nh_off`, including its extension headers.
///
/// # Errors
///
/// See [`header_len_with_fraginfo`]; a truncated or non-v6 fixed header is
/// [`DropReason::Invalid`].
pub fn parse<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<L3Header<V6>, DropError> {
    let bytes = buf
        .as_ref()
        .get(nh_off..)
        .ok_or(DropError::from(DropReason::Invalid))?;
    let header = Ipv6HeaderSlice::from_slice(bytes).map_err(|e| {
        debug!("invalid ipv6 header at {nh_off}: {e}");
        DropError::from(DropReason::Invalid)
    })?;
    let saddr = header.source_addr();
    let daddr = header.destination_addr();
    let (nexthdr, hdr_len, frag) = header_len_with_fraginfo(buf, nh_off)?;
    Ok(L3Header {
        nh_off,
        nexthdr,
        l4_off: nh_off + hdr_len,
        frag,
        saddr,
        daddr,
    })
}

/// Read the source address.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn load_saddr<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<Ipv6Addr, AccessError> {
    buf.load::<16>(nh_off + SADDR_OFF).map(Ipv6Addr::from)
}

/// Read the destination address.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn load_daddr<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<Ipv6Addr, AccessError> {
    buf.load::<16>(nh_off + DADDR_OFF).map(Ipv6Addr::from)
}

/// Overwrite the source address.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn store_saddr<Buf: PacketBufferMut>(
    buf: &mut Buf,
    nh_off: usize,
    addr: &Ipv6Addr,
) -> Result<(), AccessError> {
    buf.store_bytes(nh_off + SADDR_OFF, &addr.octets())
}

/// Overwrite the destination address.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn store_daddr<Buf: PacketBufferMut>(
    buf: &mut Buf,
    nh_off: usize,
    addr: &Ipv6Addr,
) -> Result<(), AccessError> {
    buf.store_bytes(nh_off + DADDR_OFF, &addr.octets())
}

/// Read the payload length.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn load_payload_len<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> Result<u16, AccessError> {
    buf.load_be16(nh_off + PAYLOAD_LEN_OFF)
}

/// Overwrite the payload length.
///
/// # Errors
///
/// Fails if the header is truncated.
pub fn store_payload_len<Buf: PacketBufferMut>(
    buf: &mut Buf,
    nh_off: usize,
    len: u16,
) -> Result<(), AccessError> {
    buf.store_be16(nh_off + PAYLOAD_LEN_OFF, len)
}
