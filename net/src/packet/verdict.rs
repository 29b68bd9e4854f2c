// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Stage verdicts and drop reasons.

use crate::buffer::AccessError;
use crate::checksum::ChecksumError;
use crate::packet::meta::IfIndex;
use bitflags::bitflags;
use std::fmt::Display;

/// Code returned to callers for a redirect.
pub const REDIRECT_CODE: i32 = 7;

/// Why a packet was dropped.
///
/// Discriminants are the (negative) codes carried by drop notifications.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    Invalid = -134,            /* malformed or truncated packet */
    CtUnknownProto = -137,     /* conntrack cannot key the protocol */
    UnknownL3 = -139,          /* neither IPv4 nor IPv6 */
    MissedTailCall = -140,     /* continuation missing or hand-off budget exhausted */
    WriteError = -141,         /* a store or resize did not complete */
    UnknownL4 = -142,          /* transport we cannot parse */
    UnknownTarget = -150,      /* neighbor solicitation for an address we do not own */
    CsumL3 = -153,             /* IPv4 header checksum update failed */
    CsumL4 = -154,             /* transport checksum update failed */
    InvalidExthdr = -156,      /* IPv6 extension header chain too long or truncated */
    FragNoSupport = -157,      /* non-first fragment where ports are needed */
    UnsuppServiceProto = -159, /* ICMP where a service tuple is expected */
    NatNoMapping = -167,       /* no port left in the NAT range */
    NatUnsuppProto = -168,     /* protocol cannot be translated */
    NoFib = -169,              /* no route */
    NatNotNeeded = -173,       /* punt to the stack, not an error */
    ForbiddenIcmp6 = -176,     /* host firewall refused the ICMPv6 type */
}

impl DropReason {
    /// The numeric code of this reason.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// A drop reason together with an extended diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("drop: {reason} (ext {ext_err})")]
pub struct DropError {
    /// The reason
    pub reason: DropReason,
    /// Extended diagnostic, zero when unused
    pub ext_err: i32,
}

impl DropError {
    /// Build a drop with an extended diagnostic code.
    #[must_use]
    pub const fn with_ext(reason: DropReason, ext_err: i32) -> DropError {
        DropError { reason, ext_err }
    }

    /// True for the errors tuple-extraction callers treat as pass-through.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self.reason,
            DropReason::UnsuppServiceProto | DropReason::UnknownL4
        )
    }
}

impl From<DropReason> for DropError {
    fn from(reason: DropReason) -> Self {
        DropError { reason, ext_err: 0 }
    }
}

impl From<AccessError> for DropError {
    fn from(value: AccessError) -> Self {
        match value {
            AccessError::Load { .. } => DropReason::Invalid.into(),
            AccessError::Store { .. } | AccessError::Resize { .. } => DropReason::WriteError.into(),
        }
    }
}

impl From<ChecksumError> for DropError {
    fn from(_: ChecksumError) -> Self {
        DropReason::CsumL4.into()
    }
}

bitflags! {
    /// Modifiers of a redirect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RedirectFlags: u32 {
        /// Deliver on the ingress path of the target device.
        const INGRESS = 1 << 0;
    }
}

/// Outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Continue normal processing.
    Pass,
    /// Send the packet to another device.
    Redirect {
        /// Target device
        ifindex: IfIndex,
        /// Redirect modifiers
        flags: RedirectFlags,
    },
    /// Discard the packet.
    Drop(DropError),
}

impl Verdict {
    /// Redirect out of `ifindex`.
    #[must_use]
    pub const fn redirect(ifindex: IfIndex) -> Verdict {
        Verdict::Redirect {
            ifindex,
            flags: RedirectFlags::empty(),
        }
    }

    /// Code returned to callers: zero for pass, positive for redirect, negative for drop.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Redirect { .. } => REDIRECT_CODE,
            Verdict::Drop(err) => err.reason.code(),
        }
    }

    /// True for a drop verdict.
    #[must_use]
    pub const fn is_drop(&self) -> bool {
        matches!(self, Verdict::Drop(_))
    }
}

impl From<DropError> for Verdict {
    fn from(value: DropError) -> Self {
        Verdict::Drop(value)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "pass"),
            Verdict::Redirect { ifindex, flags } => {
                write!(f, "redirect to {ifindex}")?;
                if flags.contains(RedirectFlags::INGRESS) {
                    write!(f, " (ingress)")?;
                }
                Ok(())
            }
            Verdict::Drop(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verdict_codes() {
        assert_eq!(Verdict::Pass.code(), 0);
        assert_eq!(Verdict::redirect(IfIndex(3)).code(), 7);
        let drop: Verdict = DropError::from(DropReason::UnknownTarget).into();
        assert_eq!(drop.code(), -150);
        assert!(drop.is_drop());
        assert_eq!(DropReason::NatNotNeeded.to_string(), "nat_not_needed");
    }

    #[test]
    fn access_errors_map_to_drop_reasons() {
        let load = AccessError::Load {
            offset: 10,
            len: 2,
            buf_len: 4,
        };
        let resize = AccessError::Resize { from: 4, to: 9000 };
        assert_eq!(DropError::from(load).reason, DropReason::Invalid);
        assert_eq!(DropError::from(resize).reason, DropReason::WriteError);
        assert_eq!(
            DropError::from(ChecksumError::OddLength(3)).reason,
            DropReason::CsumL4
        );
    }
}
