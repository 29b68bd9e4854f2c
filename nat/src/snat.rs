// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Source translation of traffic leaving the node.

use config::DatapathConfig;
use lookup::{Fib, FibParams, MasqueradeDecision, MasqueradePolicy, NatTarget};
use net::buffer::PacketBufferMut;
use net::eth;
use net::family::{IpFamily, L3Header};
use net::packet::{DropError, DropReason, IfIndex, PacketContext, Verdict};
use net::tuple::L3Tuple;
use ahash::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use tracing::{debug, trace, warn};

use crate::family::NatFamily;
use crate::fib::fib_lookup_and_redirect;
use crate::l4::{End, rewrite};
use crate::tables::NatTables;
use crate::tuple::{revalidate, snat_tuple};

/// What the SNAT step did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnatOutcome<F: IpFamily> {
    pub verdict: Verdict,
    /// Source address before translation, if the packet was translated
    pub orig_saddr: Option<F::Addr>,
}

impl<F: IpFamily> SnatOutcome<F> {
    fn untouched(verdict: Verdict) -> Self {
        Self {
            verdict,
            orig_saddr: None,
        }
    }
}

/// A source the node must not translate away from, because it already is one of the node's
/// own addresses: the tunnel router address on the overlay program in tunnel mode, or the
/// direct-routing address on the direct-routing device.
///
/// The returned target keeps that address, uses the configured port range, and asks for the
/// translation to be tracked.
#[must_use]
pub fn has_nat_conflict<F: NatFamily>(
    config: &DatapathConfig,
    ifindex: IfIndex,
    saddr: &F::Addr,
) -> Option<NatTarget<F>> {
    let tunnel = F::tunnel_router(config).filter(|router| router == saddr);
    let direct = config
        .direct_routing_on(ifindex)
        .and_then(F::direct_routing_addr)
        .filter(|addr| addr == saddr);
    let addr = tunnel.or(direct)?;
    debug!("source {saddr} is a node address, keeping it");
    let mut target = NatTarget::new(addr, config.nat_port_min, config.nat_port_max);
    target.needs_ct = true;
    Some(target)
}

/// Ask the masquerade policy what to do with a flow leaving `ifindex`.
///
/// # Errors
///
/// Whatever the policy fails with.
pub fn choose_masquerade_target<F: IpFamily>(
    policy: &dyn MasqueradePolicy<F>,
    tuple: &L3Tuple<F>,
    ifindex: IfIndex,
) -> Result<MasqueradeDecision<F>, DropError> {
    let decision = policy.decide(tuple, ifindex)?;
    match &decision {
        MasqueradeDecision::Translate(target) => debug!("masquerade {tuple} to {target}"),
        MasqueradeDecision::Punt => debug!("no masquerade for {tuple}"),
    }
    Ok(decision)
}

/// Send the packet to the egress gateway device of `target` when it is not already on it.
///
/// [`Verdict::Pass`] means the packet stays on the current device and is translated here. Any
/// frame access after this call must revalidate the headers.
///
/// # Errors
///
/// The FIB's error when there is no route to the destination.
pub fn maybe_redirect_to_egress_gateway<F: IpFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    fib: &dyn Fib,
    tuple: &L3Tuple<F>,
    target: &NatTarget<F>,
) -> Result<Verdict, DropError> {
    if !target.egress_gateway || target.ifindex == Some(ctx.ifindex) {
        return Ok(Verdict::Pass);
    }
    let params = FibParams {
        ifindex: target.ifindex.unwrap_or(ctx.ifindex),
        src: target.addr.into(),
        dst: tuple.daddr.into(),
    };
    debug!("egress gateway {target}: looking up {params}");
    fib_lookup_and_redirect(ctx, fib, &params)
}

/// Fixed keys of the port hash: a flow maps to the same port in every process.
const PORT_HASH_SEEDS: [u64; 4] = [
    0x6e6f_6465_706f_7274,
    0x736e_6174_5f70_6f72,
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
];

fn port_hash<F: IpFamily>(tuple: &L3Tuple<F>) -> u64 {
    let [k0, k1, k2, k3] = PORT_HASH_SEEDS;
    let mut hasher = RandomState::with_seeds(k0, k1, k2, k3).build_hasher();
    tuple.hash(&mut hasher);
    hasher.finish()
}

/// Port (or echo identifier) a flow is translated to: the original one when it already lies
/// in the target's range, otherwise one picked by hashing the tuple into the range.
#[must_use]
pub fn choose_port<F: IpFamily>(tuple: &L3Tuple<F>, target: &NatTarget<F>) -> u16 {
    if target.port_in_range(tuple.sport) {
        return tuple.sport;
    }
    let span = u64::from(target.max_port.saturating_sub(target.min_port)) + 1;
    let offset = u16::try_from(port_hash(tuple) % span).unwrap_or_default();
    target.min_port + offset
}

/// Translate the source of the packet at `l3` to `target` and mark it done.
///
/// # Errors
///
/// See [`rewrite`](crate::l4::rewrite).
pub fn apply_snat<F: IpFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    l3: &L3Header<F>,
    tuple: &L3Tuple<F>,
    target: &NatTarget<F>,
) -> Result<(), DropError> {
    let port = choose_port(tuple, target);
    rewrite(&mut ctx.buffer, l3, End::Source, target.addr, Some(port))?;
    ctx.snat_done = true;
    debug!("snat {tuple} to {}:{port}", target.addr);
    Ok(())
}

/// Send replies of an endpoint sitting behind another device out of that device, sourced from
/// its MAC. The destination MAC is kept: both devices share the L2 segment.
fn redirect_reply_to_parent<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    l3: &L3Header<F>,
    tables: &NatTables<F>,
    config: &DatapathConfig,
) -> Result<Option<Verdict>, DropError> {
    if !F::redirects_to_parent(config) {
        return Ok(None);
    }
    let Some(parent) = tables
        .endpoints
        .lookup_endpoint(l3.saddr.into())
        .and_then(|ep| ep.parent_ifindex)
        .filter(|parent| *parent != ctx.ifindex)
    else {
        return Ok(None);
    };
    let tuple = match snat_tuple(&ctx.buffer, l3) {
        Ok(tuple) => tuple,
        Err(e) if matches!(e.reason, DropReason::NatNotNeeded | DropReason::NatUnsuppProto) => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if !tables
        .conntrack
        .classify(&tuple, net::packet::Direction::Egress)
        .is_reply()
    {
        return Ok(None);
    }
    let Some(mac) = tables.device_macs.device_mac(parent) else {
        warn!("no mac known for parent device {parent}");
        return Err(DropReason::WriteError.into());
    };
    eth::store_smac(&mut ctx.buffer, mac)?;
    debug!("reply {tuple} redirected to parent device {parent}");
    Ok(Some(Verdict::redirect(parent)))
}

fn translate<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    mut l3: L3Header<F>,
    tables: &NatTables<F>,
    config: &DatapathConfig,
    cluster_id: u32,
) -> Result<SnatOutcome<F>, DropError> {
    let tuple = snat_tuple(&ctx.buffer, &l3)?;
    let conflict = if tuple.nexthdr.has_ports() {
        has_nat_conflict::<F>(config, ctx.ifindex, &tuple.saddr)
    } else {
        None
    };
    let target = if let Some(target) = conflict {
        target
    } else {
        let mut target =
            match choose_masquerade_target(&*tables.masquerade, &tuple, ctx.ifindex)? {
                MasqueradeDecision::Translate(target) => target,
                MasqueradeDecision::Punt => return Err(DropReason::NatNotNeeded.into()),
            };
        target.cluster_id = F::target_cluster_id(config, cluster_id);
        if config.egress_gateway && config.is_host() {
            let verdict = maybe_redirect_to_egress_gateway(ctx, &*tables.fib, &tuple, &target)?;
            if verdict != Verdict::Pass {
                return Ok(SnatOutcome::untouched(verdict));
            }
            l3 = revalidate(&ctx.buffer)?;
        }
        target
    };
    apply_snat(ctx, &l3, &tuple, &target)?;
    Ok(SnatOutcome {
        verdict: Verdict::Pass,
        orig_saddr: Some(tuple.saddr),
    })
}

/// Source-translate a packet leaving the node, if it needs to be.
///
/// Flows the masquerade policy punts, and transports that are never translated, pass
/// unchanged.
///
/// # Errors
///
/// Any [`DropError`] other than the punt.
pub fn snat_fwd<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    tables: &NatTables<F>,
    config: &DatapathConfig,
    cluster_id: u32,
) -> Result<SnatOutcome<F>, DropError> {
    let l3 = revalidate::<F, _>(&ctx.buffer)?;
    if let Some(verdict) = redirect_reply_to_parent(ctx, &l3, tables, config)? {
        return Ok(SnatOutcome::untouched(verdict));
    }
    match translate(ctx, l3, tables, config, cluster_id) {
        Err(e) if e.reason == DropReason::NatNotNeeded => {
            trace!("punting to the stack");
            Ok(SnatOutcome::untouched(Verdict::Pass))
        }
        other => other,
    }
}
