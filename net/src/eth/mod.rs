// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet header layout

pub mod mac;

use crate::buffer::{AccessError, BufferAccess, PacketBufferMut};
use crate::eth::mac::Mac;
use etherparse::EtherType;

/// The length (in bytes) of an ethernet header
pub const ETH_HLEN: usize = 14;
/// Offset of the destination MAC
pub const DMAC_OFF: usize = 0;
/// Offset of the source MAC
pub const SMAC_OFF: usize = 6;
/// Offset of the ethertype
pub const PROTO_OFF: usize = 12;

/// IPv4 ethertype
pub const ETH_P_IP: u16 = EtherType::IPV4.0;
/// IPv6 ethertype
pub const ETH_P_IPV6: u16 = EtherType::IPV6.0;

/// Read the destination MAC of the frame.
///
/// # Errors
///
/// Fails if the frame is shorter than an ethernet header.
pub fn load_dmac<Buf: PacketBufferMut>(buf: &Buf) -> Result<Mac, AccessError> {
    buf.load::<6>(DMAC_OFF).map(Mac)
}

/// Read the source MAC of the frame.
///
/// # Errors
///
/// Fails if the frame is shorter than an ethernet header.
pub fn load_smac<Buf: PacketBufferMut>(buf: &Buf) -> Result<Mac, AccessError> {
    buf.load::<6>(SMAC_OFF).map(Mac)
}

/// Overwrite the destination MAC of the frame.
///
/// # Errors
///
/// Fails if the frame is shorter than an ethernet header.
pub fn store_dmac<Buf: PacketBufferMut>(buf: &mut Buf, mac: Mac) -> Result<(), AccessError> {
    buf.store_bytes(DMAC_OFF, &mac.0)
}

/// Overwrite the source MAC of the frame.
///
/// # Errors
///
/// Fails if the frame is shorter than an ethernet header.
pub fn store_smac<Buf: PacketBufferMut>(buf: &mut Buf, mac: Mac) -> Result<(), AccessError> {
    buf.store_bytes(SMAC_OFF, &mac.0)
}

/// Read the ethertype of the frame.
///
/// # Errors
///
/// Fails if the frame is shorter than an ethernet header.
pub fn load_proto<Buf: PacketBufferMut>(buf: &Buf) -> Result<u16, AccessError> {
    buf.load_be16(PROTO_OFF)
}
