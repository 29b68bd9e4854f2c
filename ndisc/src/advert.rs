// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Neighbor advertisement synthesis and the in-place ICMPv6 reply.

use net::buffer::{BufferAccess, PacketBufferMut};
use net::checksum::{CsumFlags, Delta, apply_l4};
use net::eth::{self, mac::Mac};
use net::icmp6;
use net::ipv6;
use net::packet::{DropError, DropReason, PacketContext, Verdict};
use std::net::Ipv6Addr;
use tracing::{debug, trace};

fn icmp_off(nh_off: usize) -> usize {
    nh_off + ipv6::HLEN
}

fn csum_off(nh_off: usize) -> usize {
    icmp_off(nh_off) + icmp6::CSUM_OFF
}

/// Grow the frame by one (zeroed) neighbor discovery option and account for it in the IPv6
/// payload length.
///
/// # Errors
///
/// Any failure is reported as [`DropReason::Invalid`].
pub fn add_option<Buf: PacketBufferMut>(buf: &mut Buf, nh_off: usize) -> Result<(), DropError> {
    let invalid = |_| DropError::from(DropReason::Invalid);
    let len = buf.frame_len();
    buf.change_tail(len + icmp6::ND_OPT_LEN).map_err(invalid)?;
    let plen = ipv6::load_payload_len(buf, nh_off).map_err(invalid)?;
    #[allow(clippy::cast_possible_truncation)] // option length is a small constant
    let plen = plen.wrapping_add(icmp6::ND_OPT_LEN as u16);
    ipv6::store_payload_len(buf, nh_off, plen).map_err(invalid)?;
    buf.store_bytes(
        icmp_off(nh_off) + icmp6::ND_OPT_OFF,
        &[0u8; icmp6::ND_OPT_LEN],
    )
    .map_err(invalid)?;
    trace!("added room for a link-layer address option, payload now {plen} bytes");
    Ok(())
}

/// Turn the neighbor solicitation at `nh_off` into the matching advertisement and send it back.
///
/// The advertisement announces `mac` for the solicited target. Routers answer with
/// `R=1, O=0`, endpoints with `R=0, O=1`; both set `S=1`. The checksum is patched
/// differentially for every rewritten range.
///
/// # Errors
///
/// Fails with the [`DropError`] of the first load, store or checksum update that fails.
pub fn synthesize_advertisement<Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    nh_off: usize,
    mac: Mac,
    is_router: bool,
) -> Result<Verdict, DropError> {
    let buf = &mut ctx.buffer;
    let icmp_off = icmp_off(nh_off);
    let opt_off = icmp_off + icmp6::ND_OPT_OFF;

    if buf.load::<{ icmp6::ND_OPT_LEN }>(opt_off).is_err() {
        add_option(buf, nh_off)?;
    }

    let old_hdr = buf.load::<{ icmp6::HDR_LEN }>(icmp_off)?;
    let mut flags = icmp6::NA_FLAG_SOLICITED;
    flags |= if is_router {
        icmp6::NA_FLAG_ROUTER
    } else {
        icmp6::NA_FLAG_OVERRIDE
    };
    let mut new_hdr = [0u8; icmp6::HDR_LEN];
    new_hdr[icmp6::TYPE_OFF] = icmp6::NA;
    new_hdr[icmp6::CSUM_OFF..icmp6::CSUM_OFF + 2]
        .copy_from_slice(&old_hdr[icmp6::CSUM_OFF..icmp6::CSUM_OFF + 2]);
    new_hdr[icmp6::NA_FLAGS_OFF] = flags;

    let target = buf
        .load::<16>(icmp_off + icmp6::ND_TARGET_OFF)
        .map(Ipv6Addr::from)
        .map_err(|_| DropError::from(DropReason::WriteError))?;

    buf.store_bytes(icmp_off, &new_hdr)?;
    apply_l4(
        buf,
        csum_off(nh_off),
        Delta::between(&old_hdr, &new_hdr)?,
        CsumFlags::PSEUDO_HDR,
    )?;

    let old_opt = buf.load::<{ icmp6::ND_OPT_LEN }>(opt_off)?;
    let mut new_opt = [0u8; icmp6::ND_OPT_LEN];
    new_opt[0] = icmp6::ND_OPT_TARGET_LL_ADDR;
    new_opt[1] = 1;
    new_opt[2..].copy_from_slice(&mac.0);
    buf.store_bytes(opt_off, &new_opt)?;
    apply_l4(
        buf,
        csum_off(nh_off),
        Delta::between(&old_opt, &new_opt)?,
        CsumFlags::PSEUDO_HDR,
    )?;

    debug!(
        "advertising {target} at {mac} ({})",
        if is_router { "router" } else { "endpoint" }
    );
    send_reply(ctx, nh_off, target, mac)
}

/// Send the ICMPv6 message at `nh_off` back where it came from, sourced from `new_src`.
///
/// The old source becomes the destination, the checksum is patched for both address changes,
/// the frame is addressed to its old source MAC from `iface_mac`, and the packet is redirected
/// out of the device it arrived on.
///
/// # Errors
///
/// [`DropReason::Invalid`] if the headers cannot be read, [`DropReason::WriteError`] if they
/// cannot be written, [`DropReason::CsumL4`] if the checksum cannot be patched.
pub fn send_reply<Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    nh_off: usize,
    new_src: Ipv6Addr,
    iface_mac: Mac,
) -> Result<Verdict, DropError> {
    let buf = &mut ctx.buffer;
    let sip = ipv6::load_saddr(buf, nh_off)?;
    let dip = ipv6::load_daddr(buf, nh_off)?;

    ipv6::store_saddr(buf, nh_off, &new_src)?;
    ipv6::store_daddr(buf, nh_off, &sip)?;

    let csum_off = csum_off(nh_off);
    let delta = Delta::between(&sip.octets(), &new_src.octets())?;
    apply_l4(buf, csum_off, delta, CsumFlags::PSEUDO_HDR)?;
    let delta = Delta::between(&dip.octets(), &sip.octets())?;
    apply_l4(buf, csum_off, delta, CsumFlags::PSEUDO_HDR)?;

    let smac = eth::load_smac(buf)?;
    eth::store_dmac(buf, smac)?;
    eth::store_smac(buf, iface_mac)?;

    trace!("reply {new_src} -> {sip} out of {}", ctx.ifindex);
    Ok(Verdict::redirect(ctx.ifindex))
}
