// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Device MAC addresses

use net::eth::mac::Mac;
use net::packet::IfIndex;

pub trait DeviceMacs: Send + Sync {
    fn device_mac(&self, ifindex: IfIndex) -> Option<Mac>;
}
