// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ancillary packet metadata.

#![allow(missing_docs)]

use std::fmt::Display;
use std::net::IpAddr;

/// Device identifier, as used by redirects and FIB results.
#[repr(transparent)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct IfIndex(pub u32);

impl IfIndex {
    #[must_use]
    pub const fn new(val: u32) -> Self {
        Self(val)
    }
    #[must_use]
    pub const fn get_id(&self) -> u32 {
        self.0
    }
}

impl Display for IfIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// Direction of a packet relative to the node.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    Egress = 0,
    Ingress = 1,
}

impl Direction {
    /// Wire value as carried in the scratch slots.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Decode a scratch slot value; anything but the ingress value is egress.
    #[must_use]
    pub const fn from_u32(value: u32) -> Direction {
        if value == Direction::Ingress as u32 {
            Direction::Ingress
        } else {
            Direction::Egress
        }
    }
}

/// Tunnel metadata attached to a packet before it is handed to an encapsulating device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelKey {
    pub tunnel_id: u32,
    pub remote: IpAddr,
    pub ttl: u8,
}
