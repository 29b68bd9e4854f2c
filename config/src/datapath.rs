// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Datapath configuration: where the program is attached and which features are on.

use derive_builder::Builder;
use net::eth::mac::Mac;
use net::packet::IfIndex;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use tracectl::get_trace_ctl;
use tracing::debug;

use crate::{ConfigError, ConfigResult};

/// Highest port of the nodeport service range. NAT ports must stay above it.
pub const NODEPORT_PORT_MAX: u16 = 32767;
/// Default lower bound of the SNAT port range.
pub const NAT_PORT_MIN: u16 = 32768;
/// Default upper bound of the SNAT port range.
pub const NAT_PORT_MAX: u16 = 65535;
/// Default number of packet bytes attached to a trace notification.
pub const TRACE_PAYLOAD_LEN: u32 = 128;
/// Largest accepted trace payload length.
pub const MAX_TRACE_PAYLOAD_LEN: u32 = 1500;

/// The program a datapath instance implements. Selects the observation point of trace
/// notifications and the conflict rules of the NAT stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgramKind {
    /// Attached to a native (host) device
    #[default]
    Host,
    /// Attached to the tunnel device
    Overlay,
    /// Attached to the wireguard device
    Wireguard,
}

/// What to do with a neighbor solicitation whose target is neither the router nor an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnknownNsAction {
    /// Drop with `UnknownTarget`
    #[default]
    Drop,
    /// Let the stack handle it
    Pass,
}

/// Direct server return mode of the load-balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DsrMode {
    /// Replies always go back through SNAT
    #[default]
    Off,
    /// Backends reply directly to clients
    Dsr,
    /// DSR for TCP, SNAT for everything else
    Hybrid,
}

/// The device used for direct routing between nodes and its addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectRouting {
    pub ifindex: IfIndex,
    #[serde(default)]
    pub ipv4: Option<Ipv4Addr>,
    #[serde(default)]
    pub ipv6: Option<Ipv6Addr>,
}

/// Datapath configuration, resolved once and shared read-only by all stages.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(default)]
#[serde(default, deny_unknown_fields)]
pub struct DatapathConfig {
    pub program: ProgramKind, /* which program this instance is */
    pub ifindex: IfIndex,     /* device the program is attached to */
    pub iface_mac: Mac,       /* mac of that device */

    #[builder(setter(strip_option))]
    pub router_ipv6: Option<Ipv6Addr>, /* virtual router address, answers NS, sources ICMPv6 errors */
    #[builder(setter(strip_option))]
    pub ipv4_gateway: Option<Ipv4Addr>, /* tunnel router address of this node */
    #[builder(setter(strip_option))]
    pub direct_routing: Option<DirectRouting>,

    pub tunnel_mode: bool,
    pub enable_ipv4: bool,
    pub enable_ipv6: bool,
    pub host_firewall: bool,
    pub egress_gateway: bool,
    pub masquerade_ipv4: bool,
    pub masquerade_ipv6: bool,
    pub health_check: bool, /* redirect health-check probes to the encap devices */
    pub skip_fib: bool,     /* no FIB lookup after reverse translation */
    pub dsr: DsrMode,
    pub inter_cluster_snat: bool,
    pub cluster_id: u32,

    pub handle_ns: bool, /* answer neighbor solicitations on the host device */
    pub unknown_ns_action: UnknownNsAction,

    pub nat_port_min: u16,
    pub nat_port_max: u16,
    pub trace_payload_len: u32,

    #[builder(setter(strip_option))]
    pub encap_ifindex_v4: Option<IfIndex>,
    #[builder(setter(strip_option))]
    pub encap_ifindex_v6: Option<IfIndex>,

    #[builder(setter(into, strip_option))]
    pub tracing: Option<String>, /* e.g. "default=info,nat=debug" */
}

impl Default for DatapathConfig {
    fn default() -> Self {
        Self {
            program: ProgramKind::default(),
            ifindex: IfIndex::default(),
            iface_mac: Mac::ZERO,
            router_ipv6: None,
            ipv4_gateway: None,
            direct_routing: None,
            tunnel_mode: false,
            enable_ipv4: true,
            enable_ipv6: true,
            host_firewall: false,
            egress_gateway: false,
            masquerade_ipv4: false,
            masquerade_ipv6: false,
            health_check: false,
            skip_fib: false,
            dsr: DsrMode::default(),
            inter_cluster_snat: false,
            cluster_id: 0,
            handle_ns: true,
            unknown_ns_action: UnknownNsAction::default(),
            nat_port_min: NAT_PORT_MIN,
            nat_port_max: NAT_PORT_MAX,
            trace_payload_len: TRACE_PAYLOAD_LEN,
            encap_ifindex_v4: None,
            encap_ifindex_v6: None,
            tracing: None,
        }
    }
}

impl DatapathConfigBuilder {
    /// Build and validate.
    pub fn build_validated(&self) -> Result<DatapathConfig, ConfigError> {
        let config = self
            .build()
            .map_err(|e| ConfigError::Builder(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl DatapathConfig {
    /// Load a configuration from YAML. Fields not present keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: DatapathConfig =
            serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml_ng::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult {
        debug!("Validating datapath configuration..");
        if !self.enable_ipv4 && !self.enable_ipv6 {
            return Err(ConfigError::Forbidden("both IPv4 and IPv6 are disabled"));
        }
        if self.iface_mac.is_zero() {
            return Err(ConfigError::BadMacAddress(self.iface_mac, "zero"));
        }
        if self.iface_mac.is_multicast() {
            return Err(ConfigError::BadMacAddress(self.iface_mac, "multicast"));
        }
        if self.enable_ipv6 && self.router_ipv6.is_none() {
            return Err(ConfigError::MissingParameter("router_ipv6"));
        }
        if self.program == ProgramKind::Overlay
            && self.tunnel_mode
            && self.enable_ipv4
            && self.ipv4_gateway.is_none()
        {
            return Err(ConfigError::MissingParameter("ipv4_gateway"));
        }
        if self.nat_port_min > self.nat_port_max {
            return Err(ConfigError::BadNatPortRange(
                self.nat_port_min,
                self.nat_port_max,
                "lower bound above upper bound",
            ));
        }
        if self.nat_port_min <= NODEPORT_PORT_MAX {
            return Err(ConfigError::BadNatPortRange(
                self.nat_port_min,
                self.nat_port_max,
                "overlaps the nodeport range",
            ));
        }
        if self.health_check {
            if self.enable_ipv4 && self.encap_ifindex_v4.is_none() {
                return Err(ConfigError::MissingParameter("encap_ifindex_v4"));
            }
            if self.enable_ipv6 && self.encap_ifindex_v6.is_none() {
                return Err(ConfigError::MissingParameter("encap_ifindex_v6"));
            }
        }
        if self.trace_payload_len > MAX_TRACE_PAYLOAD_LEN {
            return Err(ConfigError::BadTracePayloadLen(self.trace_payload_len));
        }
        Ok(())
    }

    /// Apply the tracing configuration string, if any.
    pub fn apply_tracing(&self) -> ConfigResult {
        let Some(tracing) = &self.tracing else {
            return Ok(());
        };
        debug!("Applying tracing configuration '{tracing}'");
        get_trace_ctl()
            .setup_from_string(tracing)
            .map_err(|e| ConfigError::Tracing(e.to_string()))
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.program == ProgramKind::Host
    }

    /// The direct-routing settings, if the program runs on the direct-routing device.
    #[must_use]
    pub fn direct_routing_on(&self, ifindex: IfIndex) -> Option<&DirectRouting> {
        self.direct_routing
            .as_ref()
            .filter(|dr| self.is_host() && dr.ifindex == ifindex)
    }

    /// The IPv4 NAT-forward step runs as its own continuation.
    #[must_use]
    pub fn nat_fwd_tail_call_v4(&self) -> bool {
        (self.enable_ipv4 && self.enable_ipv6)
            || (self.host_firewall && self.is_host())
            || self.inter_cluster_snat
            || (self.egress_gateway && self.is_host())
    }

    /// The IPv6 NAT-forward step runs as its own continuation.
    #[must_use]
    pub fn nat_fwd_tail_call_v6(&self) -> bool {
        (self.enable_ipv4 && self.enable_ipv6)
            || (self.host_firewall && self.is_host())
            || (self.egress_gateway && self.is_host())
    }

    /// IPv4 traffic not reverse-translated goes on to SNAT.
    #[must_use]
    pub fn snat_after_revdnat_v4(&self) -> bool {
        self.dsr != DsrMode::Dsr || self.masquerade_ipv4 || self.inter_cluster_snat
    }

    /// IPv6 traffic not reverse-translated goes on to SNAT.
    #[must_use]
    pub fn snat_after_revdnat_v6(&self) -> bool {
        self.dsr != DsrMode::Dsr || self.masquerade_ipv6
    }

    /// Reverse-translated traffic is routed with a FIB lookup.
    #[must_use]
    pub fn fib_on_revdnat(&self) -> bool {
        self.is_host() && !self.skip_fib
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn mac() -> Mac {
        Mac([0x02, 0, 0, 0, 0, 0x01])
    }

    fn router() -> Ipv6Addr {
        "fd00::1".parse().unwrap()
    }

    #[test]
    fn builder_defaults() {
        let config = DatapathConfigBuilder::default()
            .iface_mac(mac())
            .router_ipv6(router())
            .build_validated()
            .unwrap();
        assert_eq!(config.program, ProgramKind::Host);
        assert_eq!(config.nat_port_min, NAT_PORT_MIN);
        assert_eq!(config.nat_port_max, NAT_PORT_MAX);
        assert_eq!(config.trace_payload_len, TRACE_PAYLOAD_LEN);
        assert_eq!(config.unknown_ns_action, UnknownNsAction::Drop);
        assert!(config.enable_ipv4 && config.enable_ipv6);
        assert!(config.handle_ns);
    }

    #[test]
    #[traced_test]
    fn load_from_yaml() {
        let yaml = r#"
program: overlay
ifindex: 3
iface_mac: "02:00:00:00:00:01"
router_ipv6: "fd00::1"
ipv4_gateway: "10.0.0.1"
tunnel_mode: true
masquerade_ipv4: true
nat_port_min: 40000
unknown_ns_action: pass
"#;
        let config = DatapathConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.program, ProgramKind::Overlay);
        assert_eq!(config.ifindex, IfIndex(3));
        assert_eq!(config.iface_mac, mac());
        assert_eq!(config.ipv4_gateway, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(config.nat_port_min, 40000);
        assert_eq!(config.nat_port_max, NAT_PORT_MAX);
        assert_eq!(config.unknown_ns_action, UnknownNsAction::Pass);
        assert!(logs_contain("Validating datapath configuration"));

        let again = DatapathConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn yaml_errors() {
        assert!(matches!(
            DatapathConfig::from_yaml("no_such_field: 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            DatapathConfig::from_yaml("iface_mac: \"zz:00:00:00:00:01\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation() {
        let base = || {
            let mut b = DatapathConfigBuilder::default();
            b.iface_mac(mac()).router_ipv6(router());
            b
        };
        assert_eq!(
            base().enable_ipv4(false).enable_ipv6(false).build_validated(),
            Err(ConfigError::Forbidden("both IPv4 and IPv6 are disabled"))
        );
        assert_eq!(
            DatapathConfigBuilder::default()
                .iface_mac(mac())
                .build_validated(),
            Err(ConfigError::MissingParameter("router_ipv6"))
        );
        assert_eq!(
            base().iface_mac(Mac::ZERO).build_validated(),
            Err(ConfigError::BadMacAddress(Mac::ZERO, "zero"))
        );
        assert_eq!(
            base()
                .program(ProgramKind::Overlay)
                .tunnel_mode(true)
                .build_validated(),
            Err(ConfigError::MissingParameter("ipv4_gateway"))
        );
        assert!(matches!(
            base().nat_port_min(30000).build_validated(),
            Err(ConfigError::BadNatPortRange(30000, NAT_PORT_MAX, _))
        ));
        assert!(matches!(
            base().nat_port_min(50000).nat_port_max(40000).build_validated(),
            Err(ConfigError::BadNatPortRange(50000, 40000, _))
        ));
        assert_eq!(
            base()
                .health_check(true)
                .encap_ifindex_v4(IfIndex(10))
                .build_validated(),
            Err(ConfigError::MissingParameter("encap_ifindex_v6"))
        );
        assert_eq!(
            base().trace_payload_len(4096).build_validated(),
            Err(ConfigError::BadTracePayloadLen(4096))
        );
        // IPv6 disabled: no router address needed
        assert!(
            DatapathConfigBuilder::default()
                .iface_mac(mac())
                .enable_ipv6(false)
                .build_validated()
                .is_ok()
        );
    }

    #[test]
    fn derived_predicates() {
        let mut config = DatapathConfigBuilder::default()
            .iface_mac(mac())
            .router_ipv6(router())
            .enable_ipv4(true)
            .enable_ipv6(false)
            .build_validated()
            .unwrap();
        assert!(!config.nat_fwd_tail_call_v4());
        assert!(!config.nat_fwd_tail_call_v6());
        assert!(config.snat_after_revdnat_v4());
        assert!(config.fib_on_revdnat());

        config.egress_gateway = true;
        assert!(config.nat_fwd_tail_call_v4());
        config.program = ProgramKind::Overlay;
        assert!(!config.nat_fwd_tail_call_v4());
        assert!(!config.fib_on_revdnat());

        config.inter_cluster_snat = true;
        assert!(config.nat_fwd_tail_call_v4());
        assert!(!config.nat_fwd_tail_call_v6());

        config.dsr = DsrMode::Dsr;
        config.inter_cluster_snat = false;
        assert!(!config.snat_after_revdnat_v4());
        assert!(!config.snat_after_revdnat_v6());
        config.masquerade_ipv6 = true;
        assert!(config.snat_after_revdnat_v6());
        config.dsr = DsrMode::Hybrid;
        assert!(config.snat_after_revdnat_v4());
    }

    #[test]
    fn direct_routing_device() {
        let dr = DirectRouting {
            ifindex: IfIndex(2),
            ipv4: Some(Ipv4Addr::new(192, 168, 1, 10)),
            ipv6: None,
        };
        let mut config = DatapathConfigBuilder::default()
            .iface_mac(mac())
            .router_ipv6(router())
            .direct_routing(dr)
            .build_validated()
            .unwrap();
        assert_eq!(config.direct_routing_on(IfIndex(2)), Some(&dr));
        assert_eq!(config.direct_routing_on(IfIndex(3)), None);
        config.program = ProgramKind::Wireguard;
        assert_eq!(config.direct_routing_on(IfIndex(2)), None);
    }
}
