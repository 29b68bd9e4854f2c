// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Health-check socket map

use std::net::IpAddr;

/// Maps the cookie of a health-check socket to the probed peer.
pub trait HealthLookup: Send + Sync {
    fn lookup_health(&self, socket_cookie: u64) -> Option<IpAddr>;
}
