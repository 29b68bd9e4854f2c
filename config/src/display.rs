// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display of the datapath configuration

use std::fmt::Display;

use crate::datapath::DatapathConfig;

const SEP: &str = "  ";

fn fmt_opt<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "--".to_string(), ToString::to_string)
}

fn fmt_switch(f: &mut std::fmt::Formatter<'_>, name: &str, on: bool) -> std::fmt::Result {
    if on { write!(f, " {name}") } else { Ok(()) }
}

impl Display for DatapathConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "program: {} on {} ({})",
            self.program, self.ifindex, self.iface_mac
        )?;
        writeln!(f, "{SEP}router ipv6: {}", fmt_opt(self.router_ipv6.as_ref()))?;
        writeln!(f, "{SEP}ipv4 gateway: {}", fmt_opt(self.ipv4_gateway.as_ref()))?;
        if let Some(dr) = &self.direct_routing {
            writeln!(
                f,
                "{SEP}direct routing: {} v4 {} v6 {}",
                dr.ifindex,
                fmt_opt(dr.ipv4.as_ref()),
                fmt_opt(dr.ipv6.as_ref())
            )?;
        }
        write!(f, "{SEP}features:")?;
        fmt_switch(f, "ipv4", self.enable_ipv4)?;
        fmt_switch(f, "ipv6", self.enable_ipv6)?;
        fmt_switch(f, "tunnel", self.tunnel_mode)?;
        fmt_switch(f, "host-firewall", self.host_firewall)?;
        fmt_switch(f, "egress-gateway", self.egress_gateway)?;
        fmt_switch(f, "masquerade-ipv4", self.masquerade_ipv4)?;
        fmt_switch(f, "masquerade-ipv6", self.masquerade_ipv6)?;
        fmt_switch(f, "health-check", self.health_check)?;
        fmt_switch(f, "skip-fib", self.skip_fib)?;
        fmt_switch(f, "inter-cluster-snat", self.inter_cluster_snat)?;
        writeln!(f)?;
        writeln!(f, "{SEP}dsr: {}", self.dsr)?;
        writeln!(f, "{SEP}cluster id: {}", self.cluster_id)?;
        writeln!(
            f,
            "{SEP}neighbor solicitations: {} (unknown target: {})",
            if self.handle_ns { "answered" } else { "ignored" },
            self.unknown_ns_action
        )?;
        writeln!(
            f,
            "{SEP}nat ports: [{}, {}]",
            self.nat_port_min, self.nat_port_max
        )?;
        write!(f, "{SEP}trace payload: {} bytes", self.trace_payload_len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use crate::DatapathConfigBuilder;
    use net::eth::mac::Mac;

    #[test]
    fn display_lists_switches() {
        let config = DatapathConfigBuilder::default()
            .iface_mac(Mac([0x02, 0, 0, 0, 0, 0x01]))
            .router_ipv6("fd00::1".parse().unwrap())
            .masquerade_ipv4(true)
            .build_validated()
            .unwrap();
        let shown = config.to_string();
        assert!(shown.contains("program: host"));
        assert!(shown.contains("router ipv6: fd00::1"));
        assert!(shown.contains("ipv4 gateway: --"));
        assert!(shown.contains(" masquerade-ipv4"));
        assert!(!shown.contains("masquerade-ipv6"));
        assert!(shown.contains("nat ports: [32768, 65535]"));
    }
}
