// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

/// Stages reachable by a hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Continuation {
    /// Answer a neighbor solicitation
    HandleIcmp6Ns,
    /// Reply with an ICMPv6 hop limit exceeded error
    SendIcmp6TimeExceeded,
    /// Reverse translation, then SNAT hand-off (IPv4)
    Ipv4NodeportNatFwd,
    /// Source translation (IPv4)
    Ipv4NodeportSnatFwd,
    /// Reverse translation, then SNAT hand-off (IPv6)
    Ipv6NodeportNatFwd,
    /// Source translation (IPv6)
    Ipv6NodeportSnatFwd,
}
