// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-family NAT settings.

use config::{DatapathConfig, DirectRouting, ProgramKind};
use net::family::{IpFamily, V4, V6};
use net::packet::IfIndex;
use pipeline::Continuation;

/// Where the NAT logic of one IP family differs from the other.
pub trait NatFamily: IpFamily {
    /// Continuation running reverse translation, then the SNAT hand-off
    const NAT_FWD: Continuation;
    /// Continuation running source translation
    const SNAT_FWD: Continuation;

    /// Address of the node on the tunnel, which the overlay program must never translate away.
    fn tunnel_router(config: &DatapathConfig) -> Option<Self::Addr>;

    /// Address of the node on the direct-routing device.
    fn direct_routing_addr(dr: &DirectRouting) -> Option<Self::Addr>;

    /// The NAT-forward step runs as its own continuation.
    fn nat_fwd_tail_call(config: &DatapathConfig) -> bool;

    /// Traffic that was not reverse-translated goes on to SNAT.
    fn snat_after_revdnat(config: &DatapathConfig) -> bool;

    /// Device health-check probes are encapsulated on.
    fn encap_ifindex(config: &DatapathConfig) -> Option<IfIndex>;

    /// Replies of endpoints are sent back out of their parent device.
    fn redirects_to_parent(config: &DatapathConfig) -> bool;

    /// Cluster id carried into the SNAT target.
    fn target_cluster_id(config: &DatapathConfig, cluster_id: u32) -> u32;
}

fn in_tunnel_overlay(config: &DatapathConfig) -> bool {
    config.tunnel_mode && config.program == ProgramKind::Overlay
}

impl NatFamily for V4 {
    const NAT_FWD: Continuation = Continuation::Ipv4NodeportNatFwd;
    const SNAT_FWD: Continuation = Continuation::Ipv4NodeportSnatFwd;

    fn tunnel_router(config: &DatapathConfig) -> Option<Self::Addr> {
        config.ipv4_gateway.filter(|_| in_tunnel_overlay(config))
    }

    fn direct_routing_addr(dr: &DirectRouting) -> Option<Self::Addr> {
        dr.ipv4
    }

    fn nat_fwd_tail_call(config: &DatapathConfig) -> bool {
        config.nat_fwd_tail_call_v4()
    }

    fn snat_after_revdnat(config: &DatapathConfig) -> bool {
        config.snat_after_revdnat_v4()
    }

    fn encap_ifindex(config: &DatapathConfig) -> Option<IfIndex> {
        config.encap_ifindex_v4
    }

    fn redirects_to_parent(config: &DatapathConfig) -> bool {
        config.is_host() && config.masquerade_ipv4
    }

    fn target_cluster_id(config: &DatapathConfig, cluster_id: u32) -> u32 {
        if config.inter_cluster_snat {
            cluster_id
        } else {
            0
        }
    }
}

impl NatFamily for V6 {
    const NAT_FWD: Continuation = Continuation::Ipv6NodeportNatFwd;
    const SNAT_FWD: Continuation = Continuation::Ipv6NodeportSnatFwd;

    fn tunnel_router(config: &DatapathConfig) -> Option<Self::Addr> {
        config.router_ipv6.filter(|_| in_tunnel_overlay(config))
    }

    fn direct_routing_addr(dr: &DirectRouting) -> Option<Self::Addr> {
        dr.ipv6
    }

    fn nat_fwd_tail_call(config: &DatapathConfig) -> bool {
        config.nat_fwd_tail_call_v6()
    }

    fn snat_after_revdnat(config: &DatapathConfig) -> bool {
        config.snat_after_revdnat_v6()
    }

    fn encap_ifindex(config: &DatapathConfig) -> Option<IfIndex> {
        config.encap_ifindex_v6
    }

    fn redirects_to_parent(_config: &DatapathConfig) -> bool {
        false
    }

    fn target_cluster_id(_config: &DatapathConfig, _cluster_id: u32) -> u32 {
        0
    }
}
