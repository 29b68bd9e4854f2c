// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `ICMPv6` message layout, including the neighbor discovery messages of RFC 4861.
//!
//! Offsets are relative to the start of the `ICMPv6` header.

/// Offset of the message type
pub const TYPE_OFF: usize = 0;
/// Offset of the message code
pub const CODE_OFF: usize = 1;
/// Offset of the checksum
pub const CSUM_OFF: usize = 2;
/// Length of the `ICMPv6` header (type, code, checksum and the 4 byte message body prefix)
pub const HDR_LEN: usize = 8;

/// Destination unreachable
pub const DEST_UNREACH: u8 = 1;
/// Packet too big
pub const PKT_TOOBIG: u8 = 2;
/// Time exceeded
pub const TIME_EXCEED: u8 = 3;
/// Parameter problem
pub const PARAMPROB: u8 = 4;
/// Echo request
pub const ECHO_REQUEST: u8 = 128;
/// Echo reply
pub const ECHO_REPLY: u8 = 129;
/// Router solicitation
pub const ROUTER_SOLICIT: u8 = 133;
/// Neighbor solicitation
pub const NS: u8 = 135;
/// Neighbor advertisement
pub const NA: u8 = 136;

/// Time exceeded code: hop limit exceeded in transit
pub const EXC_HOPLIMIT: u8 = 0;

/// Offset of the flags byte of a neighbor advertisement
pub const NA_FLAGS_OFF: usize = 4;
/// Router flag of a neighbor advertisement
pub const NA_FLAG_ROUTER: u8 = 0x80;
/// Solicited flag of a neighbor advertisement
pub const NA_FLAG_SOLICITED: u8 = 0x40;
/// Override flag of a neighbor advertisement
pub const NA_FLAG_OVERRIDE: u8 = 0x20;

/// Offset of the target address of a neighbor solicitation or advertisement
pub const ND_TARGET_OFF: usize = HDR_LEN;
/// Offset of the first option of a neighbor solicitation or advertisement
pub const ND_OPT_OFF: usize = ND_TARGET_OFF + 16;
/// Length of a link-layer address option for ethernet
pub const ND_OPT_LEN: usize = 8;
/// Option type: source link-layer address
pub const ND_OPT_SOURCE_LL_ADDR: u8 = 1;
/// Option type: target link-layer address
pub const ND_OPT_TARGET_LL_ADDR: u8 = 2;

/// Bytes of the offending packet quoted in a time exceeded message for transports with an
/// 8 byte header.
pub const TIME_EXCEED_SHORT_QUOTE: usize = 8;
/// Bytes of the offending packet quoted in a time exceeded message for TCP.
pub const TIME_EXCEED_TCP_QUOTE: usize = 20;

/// True for the neighbor discovery messages this datapath deals with.
#[must_use]
pub const fn is_ndp(icmp_type: u8) -> bool {
    matches!(icmp_type, NS | NA)
}
