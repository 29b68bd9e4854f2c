// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Masquerade policy and the NAT target it produces

use net::family::IpFamily;
use net::packet::{DropError, IfIndex};
use net::tuple::L3Tuple;
use std::fmt::Display;

/// Where and how to source-translate a packet. Lives for one invocation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatTarget<F: IpFamily> {
    pub addr: F::Addr,
    pub min_port: u16,
    pub max_port: u16,
    pub needs_ct: bool,          /* translation must be tracked even if not strictly needed */
    pub egress_gateway: bool,    /* the target is an egress gateway */
    pub ifindex: Option<IfIndex>, /* device the gateway traffic must leave from */
    pub cluster_id: u32,
}

impl<F: IpFamily> NatTarget<F> {
    #[must_use]
    pub fn new(addr: F::Addr, min_port: u16, max_port: u16) -> Self {
        Self {
            addr,
            min_port,
            max_port,
            needs_ct: false,
            egress_gateway: false,
            ifindex: None,
            cluster_id: 0,
        }
    }

    /// Mark the target as an egress gateway leaving from `ifindex`.
    #[must_use]
    pub fn via_egress_gateway(mut self, ifindex: IfIndex) -> Self {
        self.egress_gateway = true;
        self.ifindex = Some(ifindex);
        self
    }

    #[must_use]
    pub fn port_in_range(&self, port: u16) -> bool {
        (self.min_port..=self.max_port).contains(&port)
    }
}

impl<F: IpFamily> Display for NatTarget<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ports [{}, {}]", self.addr, self.min_port, self.max_port)?;
        if self.needs_ct {
            write!(f, " ct")?;
        }
        if let Some(ifindex) = self.ifindex {
            write!(f, " via {ifindex}")?;
        }
        Ok(())
    }
}

/// Outcome of the masquerade policy for a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasqueradeDecision<F: IpFamily> {
    /// Translate to the target
    Translate(NatTarget<F>),
    /// Leave the packet to the stack untranslated
    Punt,
}

/// Decides whether a flow leaving `ifindex` must be masqueraded, and to what.
pub trait MasqueradePolicy<F: IpFamily>: Send + Sync {
    fn decide(
        &self,
        tuple: &L3Tuple<F>,
        ifindex: IfIndex,
    ) -> Result<MasqueradeDecision<F>, DropError>;
}
