// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory tables implementing the lookup contracts, for tests.

use net::eth::mac::Mac;
use net::family::IpFamily;
use net::packet::{Direction, DropError, DropReason, IfIndex};
use net::tuple::L3Tuple;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use tracing::trace;

use crate::{
    ConnTrack, CtClass, CtLookup, DeviceMacs, EndpointInfo, EndpointLookup, Fib, FibParams,
    FibRoute, HealthLookup, MasqueradeDecision, MasqueradePolicy, NatTarget, ReverseNatLookup,
    ReverseNatRecord,
};

#[derive(Debug, Default)]
pub struct EndpointTable {
    endpoints: HashMap<IpAddr, EndpointInfo>,
}

impl EndpointTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with(mut self, addr: impl Into<IpAddr>, info: EndpointInfo) -> Self {
        self.endpoints.insert(addr.into(), info);
        self
    }
}

impl EndpointLookup for EndpointTable {
    fn lookup_endpoint(&self, addr: IpAddr) -> Option<EndpointInfo> {
        let found = self.endpoints.get(&addr).copied();
        trace!("endpoint lookup {addr}: {found:?}");
        found
    }
}

#[derive(Debug, Default)]
pub struct RevNatTable<F: IpFamily> {
    records: HashMap<L3Tuple<F>, ReverseNatRecord<F>>,
}

impl<F: IpFamily> RevNatTable<F> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
    #[must_use]
    pub fn with(mut self, tuple: L3Tuple<F>, record: ReverseNatRecord<F>) -> Self {
        self.records.insert(tuple, record);
        self
    }
}

impl<F: IpFamily> ReverseNatLookup<F> for RevNatTable<F> {
    fn lookup_rev_nat(&self, tuple: &L3Tuple<F>) -> Option<ReverseNatRecord<F>> {
        self.records.get(tuple).copied()
    }
}

/// Classifies known tuples as configured and everything else as new.
#[derive(Debug, Default)]
pub struct CtTable<F: IpFamily> {
    entries: HashMap<L3Tuple<F>, CtLookup>,
}

impl<F: IpFamily> CtTable<F> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
    #[must_use]
    pub fn with(mut self, tuple: L3Tuple<F>, class: CtClass) -> Self {
        self.entries.insert(tuple, CtLookup::new(class));
        self
    }
}

impl<F: IpFamily> ConnTrack<F> for CtTable<F> {
    fn classify(&self, tuple: &L3Tuple<F>, direction: Direction) -> CtLookup {
        let found = self
            .entries
            .get(tuple)
            .copied()
            .unwrap_or(CtLookup::new(CtClass::New));
        trace!("ct {direction} {tuple}: {}", found.class);
        found
    }
}

/// Routes keyed by destination. Remembers every lookup it served.
#[derive(Debug, Default)]
pub struct StaticFib {
    routes: HashMap<IpAddr, FibRoute>,
    seen: Mutex<Vec<FibParams>>,
}

impl StaticFib {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with(mut self, dst: impl Into<IpAddr>, route: FibRoute) -> Self {
        self.routes.insert(dst.into(), route);
        self
    }
    /// Parameters of the lookups served so far.
    #[must_use]
    pub fn lookups(&self) -> Vec<FibParams> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

impl Fib for StaticFib {
    fn lookup(&self, params: &FibParams) -> Result<FibRoute, DropError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(*params);
        }
        self.routes
            .get(&params.dst)
            .copied()
            .ok_or(DropReason::NoFib.into())
    }
}

/// Masquerades flows by source address.
#[derive(Debug, Default)]
pub struct StaticMasquerade<F: IpFamily> {
    rules: HashMap<F::Addr, NatTarget<F>>,
}

impl<F: IpFamily> StaticMasquerade<F> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }
    #[must_use]
    pub fn with(mut self, source: F::Addr, target: NatTarget<F>) -> Self {
        self.rules.insert(source, target);
        self
    }
}

impl<F: IpFamily> MasqueradePolicy<F> for StaticMasquerade<F> {
    fn decide(
        &self,
        tuple: &L3Tuple<F>,
        _ifindex: IfIndex,
    ) -> Result<MasqueradeDecision<F>, DropError> {
        Ok(self
            .rules
            .get(&tuple.saddr)
            .map_or(MasqueradeDecision::Punt, |t| MasqueradeDecision::Translate(*t)))
    }
}

#[derive(Debug, Default)]
pub struct HealthTable {
    peers: HashMap<u64, IpAddr>,
}

impl HealthTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with(mut self, cookie: u64, peer: impl Into<IpAddr>) -> Self {
        self.peers.insert(cookie, peer.into());
        self
    }
}

impl HealthLookup for HealthTable {
    fn lookup_health(&self, socket_cookie: u64) -> Option<IpAddr> {
        self.peers.get(&socket_cookie).copied()
    }
}

#[derive(Debug, Default)]
pub struct DeviceMacTable {
    macs: HashMap<IfIndex, Mac>,
}

impl DeviceMacTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with(mut self, ifindex: IfIndex, mac: Mac) -> Self {
        self.macs.insert(ifindex, mac);
        self
    }
}

impl DeviceMacs for DeviceMacTable {
    fn device_mac(&self, ifindex: IfIndex) -> Option<Mac> {
        self.macs.get(&ifindex).copied()
    }
}
