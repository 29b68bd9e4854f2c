// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing of ICMPv6 packets to the responder, and the host ICMPv6 policy.

use config::{DatapathConfig, UnknownNsAction};
use lookup::EndpointLookup;
use net::buffer::{BufferAccess, PacketBufferMut};
use net::eth::ETH_HLEN;
use net::icmp6;
use net::ip::NextHeader;
use net::ipv6;
use net::packet::{Direction, DropError, DropReason, PacketContext, Verdict};
use pipeline::{Continuation, Handoff, Icmp6Payload, StageOutcome};
use std::net::Ipv6Addr;
use tracing::debug;

use crate::synthesize_advertisement;

/// Answer the neighbor solicitation whose IPv6 header sits at `nh_off`.
///
/// The virtual router address is answered as a router and local endpoints as non-routers.
/// Host endpoints are left to the stack so that the kernel answers with the node address.
/// Any other target follows [`DatapathConfig::unknown_ns_action`].
///
/// # Errors
///
/// [`DropReason::InvalidExthdr`] if the ICMPv6 header does not directly follow the IPv6
/// header, [`DropReason::UnknownTarget`] for unknown targets under the default action, or the
/// [`DropError`] of a failed advertisement.
pub fn handle_ns<Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    nh_off: usize,
    config: &DatapathConfig,
    endpoints: &dyn EndpointLookup,
) -> Result<Verdict, DropError> {
    if NextHeader(ctx.buffer.load_u8(nh_off + ipv6::NEXTHDR_OFF)?) != NextHeader::ICMPV6 {
        return Err(DropReason::InvalidExthdr.into());
    }
    let target = ctx
        .buffer
        .load::<16>(nh_off + ipv6::HLEN + icmp6::ND_TARGET_OFF)
        .map(Ipv6Addr::from)?;
    debug!("neighbor solicitation for {target} on {}", ctx.ifindex);

    if config.router_ipv6 == Some(target) {
        return synthesize_advertisement(ctx, nh_off, config.iface_mac, true);
    }
    match endpoints.lookup_endpoint(target.into()) {
        Some(ep) if ep.is_host() => {
            debug!("{target} is a host address, passing solicitation to the stack");
            Ok(Verdict::Pass)
        }
        Some(_) => synthesize_advertisement(ctx, nh_off, config.iface_mac, false),
        None => match config.unknown_ns_action {
            UnknownNsAction::Drop => Err(DropReason::UnknownTarget.into()),
            UnknownNsAction::Pass => Ok(Verdict::Pass),
        },
    }
}

fn handle_ns_handoff(nh_off: usize, direction: Direction) -> Result<Handoff, DropError> {
    let hdr_off = u32::try_from(nh_off).map_err(|_| DropError::from(DropReason::Invalid))?;
    Ok(Handoff::new(
        Continuation::HandleIcmp6Ns,
        Icmp6Payload { hdr_off, direction },
    ))
}

/// Hand neighbor solicitations off to the responder and let any other ICMPv6 message through.
///
/// # Errors
///
/// [`DropReason::Invalid`] if the ICMPv6 type cannot be read.
pub fn ndp_handle<Buf: PacketBufferMut>(
    buf: &Buf,
    nh_off: usize,
    direction: Direction,
) -> Result<StageOutcome, DropError> {
    let icmp_type = buf.load_u8(nh_off + ipv6::HLEN + icmp6::TYPE_OFF)?;
    if icmp_type == icmp6::NS {
        return Ok(handle_ns_handoff(nh_off, direction)?.into());
    }
    Ok(Verdict::Pass.into())
}

/// True if the IPv6 packet at `nh_off` is a neighbor solicitation or advertisement.
#[must_use]
pub fn is_icmp6_ndp<Buf: PacketBufferMut>(buf: &Buf, nh_off: usize) -> bool {
    buf.load_u8(nh_off + ipv6::NEXTHDR_OFF)
        .is_ok_and(|nexthdr| NextHeader(nexthdr) == NextHeader::ICMPV6)
        && buf
            .load_u8(nh_off + ipv6::HLEN + icmp6::TYPE_OFF)
            .is_ok_and(icmp6::is_ndp)
}

/// Outcome of the host ICMPv6 policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostIcmp6 {
    /// Continue, subject to the host firewall
    Pass,
    /// Continue, bypassing the host firewall
    SkipHostFirewall,
    /// Answer a neighbor solicitation
    HandleNs(Handoff),
}

impl From<HostIcmp6> for StageOutcome {
    fn from(value: HostIcmp6) -> Self {
        match value {
            HostIcmp6::Pass | HostIcmp6::SkipHostFirewall => Verdict::Pass.into(),
            HostIcmp6::HandleNs(handoff) => handoff.into(),
        }
    }
}

/// The host firewall decision for an ICMPv6 type (RFC 4890).
///
/// Echo messages are left to host policies; error and neighbor discovery messages bypass
/// them; everything else is refused.
///
/// # Errors
///
/// [`DropReason::ForbiddenIcmp6`] for refused types.
pub fn host_firewall_verdict(icmp_type: u8) -> Result<HostIcmp6, DropError> {
    match icmp_type {
        icmp6::NS | icmp6::ECHO_REQUEST | icmp6::ECHO_REPLY => Ok(HostIcmp6::Pass),
        // errors; MLD, router and neighbor discovery; inverse ND and MLDv2 reports;
        // SEND certification path; multicast router discovery
        icmp6::DEST_UNREACH..=icmp6::PARAMPROB
        | 130..=icmp6::NA
        | 141..=143
        | 148..=149
        | 151..=153 => Ok(HostIcmp6::SkipHostFirewall),
        _ => Err(DropReason::ForbiddenIcmp6.into()),
    }
}

/// ICMPv6 policy of the host device, for a message whose header sits at `l4_off`.
///
/// Solicitations behind extension headers are not answered here and fall through to the
/// policy.
///
/// # Errors
///
/// [`DropReason::Invalid`] if the type cannot be read, [`DropReason::ForbiddenIcmp6`] if the
/// host firewall refuses it.
pub fn host_handle<Buf: PacketBufferMut>(
    buf: &Buf,
    l4_off: usize,
    config: &DatapathConfig,
) -> Result<HostIcmp6, DropError> {
    let icmp_type = buf.load_u8(l4_off + icmp6::TYPE_OFF)?;
    if icmp_type == icmp6::NS && config.handle_ns && l4_off == ETH_HLEN + ipv6::HLEN {
        return Ok(HostIcmp6::HandleNs(handle_ns_handoff(
            ETH_HLEN,
            Direction::Ingress,
        )?));
    }
    if !config.host_firewall {
        return Ok(HostIcmp6::Pass);
    }
    let verdict = host_firewall_verdict(icmp_type);
    debug!("host firewall on icmpv6 type {icmp_type}: {verdict:?}");
    verdict
}
