// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ICMPv6 time exceeded (hop limit) errors.

use arrayvec::ArrayVec;
use net::buffer::{BufferAccess, PacketBufferMut};
use net::checksum::l4_checksum_v6;
use net::eth::mac::Mac;
use net::icmp6;
use net::ip::NextHeader;
use net::ipv6;
use net::packet::{Direction, DropError, DropReason, PacketContext, Verdict};
use pipeline::{Continuation, Handoff, Icmp6Payload};
use std::net::Ipv6Addr;
use tracing::debug;

use crate::send_reply;

const MAX_MESSAGE_LEN: usize = icmp6::HDR_LEN + ipv6::HLEN + icmp6::TIME_EXCEED_TCP_QUOTE;

/// Hand the packet off to the time exceeded continuation.
///
/// # Errors
///
/// [`DropReason::Invalid`] if `nh_off` does not fit a scratch slot.
pub fn send_time_exceeded(nh_off: usize, direction: Direction) -> Result<Handoff, DropError> {
    let hdr_off = u32::try_from(nh_off).map_err(|_| DropError::from(DropReason::Invalid))?;
    Ok(Handoff::new(
        Continuation::SendIcmp6TimeExceeded,
        Icmp6Payload { hdr_off, direction },
    ))
}

/// Replace the payload of the IPv6 packet at `nh_off` with a hop limit exceeded error quoting
/// its header and the start of its transport header, and send it back from `router_ip`.
///
/// UDP, SCTP and ICMPv6 packets are quoted with 8 bytes of transport header, TCP with 20.
///
/// # Errors
///
/// [`DropReason::UnknownL4`] for any other transport, otherwise the [`DropError`] of the first
/// buffer access or checksum update that fails.
pub fn synthesize_time_exceeded<Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    nh_off: usize,
    router_ip: Ipv6Addr,
    iface_mac: Mac,
) -> Result<Verdict, DropError> {
    let buf = &mut ctx.buffer;
    let icmp_off = nh_off + ipv6::HLEN;
    let orig = buf.load::<{ ipv6::HLEN }>(nh_off)?;

    let quote_len = match NextHeader(orig[ipv6::NEXTHDR_OFF]) {
        NextHeader::ICMPV6 | NextHeader::SCTP | NextHeader::UDP => icmp6::TIME_EXCEED_SHORT_QUOTE,
        NextHeader::TCP => icmp6::TIME_EXCEED_TCP_QUOTE,
        other => {
            debug!("cannot quote {other} in a time exceeded error");
            return Err(DropReason::UnknownL4.into());
        }
    };
    let mut quote = [0u8; icmp6::TIME_EXCEED_TCP_QUOTE];
    buf.load_bytes(icmp_off, &mut quote[..quote_len])?;

    buf.store_u8(nh_off + ipv6::NEXTHDR_OFF, NextHeader::ICMPV6.as_u8())?;

    let mut msg: ArrayVec<u8, MAX_MESSAGE_LEN> = ArrayVec::new();
    msg.extend([icmp6::TIME_EXCEED, icmp6::EXC_HOPLIMIT, 0, 0, 0, 0, 0, 0]);
    msg.extend(orig);
    msg.extend(quote.into_iter().take(quote_len));

    // the reply keeps the original addresses until send_reply patches them
    let mut saddr = [0u8; 16];
    saddr.copy_from_slice(&orig[ipv6::SADDR_OFF..ipv6::DADDR_OFF]);
    let mut daddr = [0u8; 16];
    daddr.copy_from_slice(&orig[ipv6::DADDR_OFF..ipv6::HLEN]);
    let csum = l4_checksum_v6(
        &Ipv6Addr::from(saddr),
        &Ipv6Addr::from(daddr),
        NextHeader::ICMPV6.as_u8(),
        &msg,
    );
    msg[icmp6::CSUM_OFF..icmp6::CSUM_OFF + 2].copy_from_slice(&csum.to_be_bytes());

    buf.change_tail(icmp_off + msg.len())?;
    buf.store_bytes(icmp_off, &msg)?;
    let plen = u16::try_from(msg.len()).map_err(|_| DropError::from(DropReason::WriteError))?;
    ipv6::store_payload_len(buf, nh_off, plen)?;

    debug!("hop limit exceeded, answering with {} bytes", msg.len());
    send_reply(ctx, nh_off, router_ip, iface_mac)
}
