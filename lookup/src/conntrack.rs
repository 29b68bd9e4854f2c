// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Connection tracking classification

use net::family::IpFamily;
use net::packet::Direction;
use net::tuple::L3Tuple;

/// How a packet relates to a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CtClass {
    New,
    Established,
    Reply,
    Related,
}

/// Result of a conntrack classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtLookup {
    pub class: CtClass,
    pub monitor: u32, /* trace aggregation hint of the entry */
}

impl CtLookup {
    #[must_use]
    pub fn new(class: CtClass) -> Self {
        Self { class, monitor: 0 }
    }

    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.class == CtClass::Reply
    }
}

/// Read-only classification against the conntrack table.
pub trait ConnTrack<F: IpFamily>: Send + Sync {
    fn classify(&self, tuple: &L3Tuple<F>, direction: Direction) -> CtLookup;
}
