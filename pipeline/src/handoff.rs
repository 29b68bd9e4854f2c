// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed hand-off payloads and their encoding into the scratch slots.

use net::packet::{Direction, ScratchSlots, Slot};

use crate::Continuation;

/// NAT flag bit: only reverse translation is wanted.
pub const NAT_FLAG_REVDNAT_ONLY: u32 = 1 << 0;

/// A value carried across a hand-off in the scratch slots.
///
/// `load` consumes the slots it reads: a payload can be read once.
pub trait SlotPayload: Sized {
    /// Encode into the slots.
    fn store(&self, slots: &mut ScratchSlots);
    /// Decode from the slots, clearing them.
    fn load(slots: &mut ScratchSlots) -> Self;
}

/// State of the ICMPv6 continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Icmp6Payload {
    /// Offset of the IPv6 header
    pub hdr_off: u32,
    /// Direction of the packet
    pub direction: Direction,
}

impl SlotPayload for Icmp6Payload {
    fn store(&self, slots: &mut ScratchSlots) {
        slots.store(Slot::HdrOff, self.hdr_off);
        slots.store(Slot::Direction, self.direction.as_u32());
    }
    fn load(slots: &mut ScratchSlots) -> Self {
        Icmp6Payload {
            hdr_off: slots.load_and_clear(Slot::HdrOff),
            direction: Direction::from_u32(slots.load_and_clear(Slot::Direction)),
        }
    }
}

/// State of the NAT-forward continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NatFwdPayload {
    /// Skip SNAT and the FIB lookup, only reverse-translate
    pub revdnat_only: bool,
    /// Security label of the source
    pub src_label: u32,
    /// Cluster of the source
    pub cluster_id: u32,
}

impl SlotPayload for NatFwdPayload {
    fn store(&self, slots: &mut ScratchSlots) {
        let flags = if self.revdnat_only {
            NAT_FLAG_REVDNAT_ONLY
        } else {
            0
        };
        slots.store(Slot::NatFlags, flags);
        slots.store(Slot::SrcLabel, self.src_label);
        slots.store(Slot::ClusterId, self.cluster_id);
    }
    fn load(slots: &mut ScratchSlots) -> Self {
        NatFwdPayload {
            revdnat_only: (slots.load_and_clear(Slot::NatFlags) & NAT_FLAG_REVDNAT_ONLY) != 0,
            src_label: slots.load_and_clear(Slot::SrcLabel),
            cluster_id: slots.load_and_clear(Slot::ClusterId),
        }
    }
}

/// State of the SNAT continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnatPayload {
    /// Security label of the source
    pub src_label: u32,
    /// Cluster of the source
    pub cluster_id: u32,
}

impl SlotPayload for SnatPayload {
    fn store(&self, slots: &mut ScratchSlots) {
        slots.store(Slot::SrcLabel, self.src_label);
        slots.store(Slot::ClusterId, self.cluster_id);
    }
    fn load(slots: &mut ScratchSlots) -> Self {
        SnatPayload {
            src_label: slots.load_and_clear(Slot::SrcLabel),
            cluster_id: slots.load_and_clear(Slot::ClusterId),
        }
    }
}

/// Any hand-off payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// For the ICMPv6 continuations
    Icmp6(Icmp6Payload),
    /// For the NAT-forward continuations
    NatFwd(NatFwdPayload),
    /// For the SNAT continuations
    Snat(SnatPayload),
}

impl Payload {
    /// Encode into the slots.
    pub fn store(&self, slots: &mut ScratchSlots) {
        match self {
            Payload::Icmp6(p) => p.store(slots),
            Payload::NatFwd(p) => p.store(slots),
            Payload::Snat(p) => p.store(slots),
        }
    }

    /// Direction of the packet being handed off.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Payload::Icmp6(p) => p.direction,
            Payload::NatFwd(_) | Payload::Snat(_) => Direction::Egress,
        }
    }

    /// Security label of the source, where known.
    #[must_use]
    pub fn src_label(&self) -> u32 {
        match self {
            Payload::Icmp6(_) => 0,
            Payload::NatFwd(p) => p.src_label,
            Payload::Snat(p) => p.src_label,
        }
    }
}

impl From<Icmp6Payload> for Payload {
    fn from(value: Icmp6Payload) -> Self {
        Payload::Icmp6(value)
    }
}

impl From<NatFwdPayload> for Payload {
    fn from(value: NatFwdPayload) -> Self {
        Payload::NatFwd(value)
    }
}

impl From<SnatPayload> for Payload {
    fn from(value: SnatPayload) -> Self {
        Payload::Snat(value)
    }
}

/// A one-way transfer of a packet to another stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Receiving stage
    pub to: Continuation,
    /// State carried along
    pub payload: Payload,
}

impl Handoff {
    /// Hand off to `to` with `payload`.
    #[must_use]
    pub fn new(to: Continuation, payload: impl Into<Payload>) -> Self {
        Handoff {
            to,
            payload: payload.into(),
        }
    }
}
