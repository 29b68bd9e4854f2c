// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Redirection of load-balancer health-check probes.

use config::DatapathConfig;
use lookup::{EndpointLookup, HealthLookup};
use net::buffer::PacketBufferMut;
use net::eth::{self, ETH_P_IP, ETH_P_IPV6};
use net::eth::mac::Mac;
use net::family::{V4, V6};
use net::packet::{DropError, DropReason, PacketContext, RedirectFlags, TunnelKey, Verdict};
use tracing::{debug, trace, warn};

use crate::family::NatFamily;

/// Security label of the local node.
pub const HOST_ID: u32 = 1;
/// Label probes from the local node carry once encapsulated: the receiver sees them as coming
/// from a remote node.
pub const LOCAL_NODE_ID: u32 = 6;
/// TTL of the outer header of encapsulated probes.
pub const HEALTH_TUNNEL_TTL: u8 = 64;

/// Send a health-check probe to the encapsulation device of its family.
///
/// Probes are recognized by the cookie of their socket. A probe for a local endpoint is
/// delivered on the ingress path of the encapsulation device with a zeroed destination MAC.
/// Any other probe gets a tunnel key towards its peer and is marked so that it is not
/// encapsulated twice. Everything else passes.
///
/// # Errors
///
/// [`DropReason::Invalid`] if the family has no encapsulation device,
/// [`DropReason::WriteError`] if the frame cannot be written.
pub fn handle_health<Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    config: &DatapathConfig,
    health: &dyn HealthLookup,
    endpoints: &dyn EndpointLookup,
    src_label: u32,
) -> Result<Verdict, DropError> {
    if !config.health_check || ctx.health_encap_done {
        return Ok(Verdict::Pass);
    }
    match eth::load_proto(&ctx.buffer)? {
        ETH_P_IP if config.enable_ipv4 => {
            redirect_probe::<V4, _>(ctx, config, health, endpoints, src_label)
        }
        ETH_P_IPV6 if config.enable_ipv6 => {
            redirect_probe::<V6, _>(ctx, config, health, endpoints, src_label)
        }
        _ => Ok(Verdict::Pass),
    }
}

fn redirect_probe<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    config: &DatapathConfig,
    health: &dyn HealthLookup,
    endpoints: &dyn EndpointLookup,
    src_label: u32,
) -> Result<Verdict, DropError> {
    let Some(peer) = ctx
        .socket_cookie
        .and_then(|cookie| health.lookup_health(cookie))
    else {
        return Ok(Verdict::Pass);
    };
    let Some(encap) = F::encap_ifindex(config) else {
        warn!(
            "health check probe to {peer} but no encap device for ethertype {:#06x}",
            F::ETH_PROTO
        );
        return Err(DropReason::Invalid.into());
    };
    if endpoints.lookup_endpoint(peer).is_some() {
        eth::store_dmac(&mut ctx.buffer, Mac::ZERO)?;
        debug!("health check probe to local endpoint {peer} via {encap}");
        return Ok(Verdict::Redirect {
            ifindex: encap,
            flags: RedirectFlags::INGRESS,
        });
    }
    let tunnel_id = if src_label == HOST_ID {
        LOCAL_NODE_ID
    } else {
        src_label
    };
    ctx.tunnel_key = Some(TunnelKey {
        tunnel_id,
        remote: peer,
        ttl: HEALTH_TUNNEL_TTL,
    });
    ctx.health_encap_done = true;
    trace!("health check probe to {peer} encapsulated with id {tunnel_id}");
    Ok(Verdict::redirect(encap))
}
