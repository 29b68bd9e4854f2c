// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Internet checksum arithmetic.
//!
//! Two families of operations live here:
//!
//! * full computation over a byte range (RFC 1071), including the IPv4 and IPv6 (RFC 8200)
//!   pseudo-headers, and
//! * differential updates (RFC 1624, eqn. 3) which patch a checksum field in place given the
//!   literal bytes before and after a mutation.
//!
//! Applying a [`Delta`] built from the old and new bytes of a mutated range always yields the
//! checksum a full recomputation over the final bytes would produce.

use crate::buffer::{AccessError, BufferAccess, PacketBufferMut};
use bitflags::bitflags;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::trace;

/// Errors which may occur while computing or applying a checksum update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChecksumError {
    /// The before and after byte ranges of a delta differ in length.
    #[error("delta ranges differ in length: {old} != {new}")]
    LengthMismatch {
        /// Length of the old range
        old: usize,
        /// Length of the new range
        new: usize,
    },
    /// Differential updates work on whole 16-bit words.
    #[error("delta range of {0} bytes is not a whole number of 16-bit words")]
    OddLength(usize),
    /// The checksum field could not be read or written.
    #[error(transparent)]
    Access(#[from] AccessError),
}

bitflags! {
    /// Modifiers for [`apply_l4`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CsumFlags: u8 {
        /// The delta covers fields of the pseudo-header (addresses, length).
        const PSEUDO_HDR = 1 << 0;
        /// A zero checksum means "no checksum" (UDP over IPv4) and must stay zero; a computed
        /// zero is written as `0xffff`.
        const MANGLED_0 = 1 << 1;
    }
}

/// Fold a wide one's-complement accumulator down to 16 bits.
#[must_use]
pub fn fold(mut acc: u64) -> u16 {
    while acc > 0xffff {
        acc = (acc & 0xffff) + (acc >> 16);
    }
    #[allow(clippy::cast_possible_truncation)] // bounded by the loop above
    {
        acc as u16
    }
}

/// One's-complement sum of `bytes` seeded with `seed`.
///
/// A trailing odd byte is padded with zero, as in RFC 1071.
#[must_use]
pub fn partial_sum(bytes: &[u8], seed: u16) -> u16 {
    let mut acc = u64::from(seed);
    let mut words = bytes.chunks_exact(2);
    for word in &mut words {
        acc += u64::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        acc += u64::from(u16::from_be_bytes([*last, 0]));
    }
    fold(acc)
}

/// Turn a one's-complement sum into the value stored in a checksum field.
#[must_use]
pub const fn finish(sum: u16) -> u16 {
    !sum
}

/// A 16-bit one's-complement differential between two byte ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta(u16);

impl Delta {
    /// The delta of an unchanged range.
    pub const ZERO: Delta = Delta(0);

    /// Compute the delta which turns a checksum over `old` into one over `new`.
    ///
    /// # Errors
    ///
    /// Both ranges must have the same, even, length.
    pub fn between(old: &[u8], new: &[u8]) -> Result<Delta, ChecksumError> {
        if old.len() != new.len() {
            return Err(ChecksumError::LengthMismatch {
                old: old.len(),
                new: new.len(),
            });
        }
        if old.len() % 2 != 0 {
            return Err(ChecksumError::OddLength(old.len()));
        }
        let mut acc = 0u64;
        for (o, n) in old.chunks_exact(2).zip(new.chunks_exact(2)) {
            acc += u64::from(!u16::from_be_bytes([o[0], o[1]]));
            acc += u64::from(u16::from_be_bytes([n[0], n[1]]));
        }
        Ok(Delta(fold(acc)))
    }

    /// Delta of a single 16-bit word.
    #[must_use]
    pub fn of_word(old: u16, new: u16) -> Delta {
        Delta(fold(u64::from(!old) + u64::from(new)))
    }

    /// Accumulate two deltas.
    #[must_use]
    pub fn combine(self, other: Delta) -> Delta {
        Delta(fold(u64::from(self.0) + u64::from(other.0)))
    }

    /// Patch a stored checksum: `HC' = ~(~HC + delta)`.
    #[must_use]
    pub fn apply_to(self, checksum: u16) -> u16 {
        !fold(u64::from(!checksum) + u64::from(self.0))
    }
}

/// Patch the L4 checksum stored at `csum_off` with `delta`.
///
/// # Errors
///
/// Fails if the checksum field lies outside the buffer.
pub fn apply_l4<Buf: PacketBufferMut>(
    buf: &mut Buf,
    csum_off: usize,
    delta: Delta,
    flags: CsumFlags,
) -> Result<(), ChecksumError> {
    let old = buf.load_be16(csum_off)?;
    if flags.contains(CsumFlags::MANGLED_0) && old == 0 {
        trace!("l4 checksum disabled at offset {csum_off}, leaving it alone");
        return Ok(());
    }
    let mut new = delta.apply_to(old);
    if flags.contains(CsumFlags::MANGLED_0) && new == 0 {
        new = 0xffff;
    }
    trace!("l4 checksum at {csum_off}: {old:#06x} -> {new:#06x} ({flags:?})");
    buf.store_be16(csum_off, new)?;
    Ok(())
}

/// Patch the IPv4 header checksum stored at `csum_off` with `delta`.
///
/// # Errors
///
/// Fails if the checksum field lies outside the buffer.
pub fn apply_l3<Buf: PacketBufferMut>(
    buf: &mut Buf,
    csum_off: usize,
    delta: Delta,
) -> Result<(), ChecksumError> {
    let old = buf.load_be16(csum_off)?;
    let new = delta.apply_to(old);
    trace!("l3 checksum at {csum_off}: {old:#06x} -> {new:#06x}");
    buf.store_be16(csum_off, new)?;
    Ok(())
}

/// Sum of the IPv6 pseudo-header (RFC 8200 section 8.1).
#[must_use]
pub fn ipv6_pseudo_header_sum(
    saddr: &Ipv6Addr,
    daddr: &Ipv6Addr,
    upper_len: u32,
    next_header: u8,
) -> u16 {
    let sum = partial_sum(&saddr.octets(), 0);
    let sum = partial_sum(&daddr.octets(), sum);
    let sum = partial_sum(&upper_len.to_be_bytes(), sum);
    partial_sum(&[0, 0, 0, next_header], sum)
}

/// Sum of the IPv4 pseudo-header (RFC 768).
#[must_use]
pub fn ipv4_pseudo_header_sum(saddr: &Ipv4Addr, daddr: &Ipv4Addr, proto: u8, len: u16) -> u16 {
    let sum = partial_sum(&saddr.octets(), 0);
    let sum = partial_sum(&daddr.octets(), sum);
    let sum = partial_sum(&[0, proto], sum);
    partial_sum(&len.to_be_bytes(), sum)
}

/// Full checksum of an upper-layer segment carried over IPv6.
///
/// The checksum field inside `segment` must be zero.
#[must_use]
pub fn l4_checksum_v6(saddr: &Ipv6Addr, daddr: &Ipv6Addr, next_header: u8, segment: &[u8]) -> u16 {
    #[allow(clippy::cast_possible_truncation)] // IPv6 jumbograms are not supported
    let len = segment.len() as u32;
    let pseudo = ipv6_pseudo_header_sum(saddr, daddr, len, next_header);
    finish(partial_sum(segment, pseudo))
}

/// Full checksum of an upper-layer segment carried over IPv4.
///
/// The checksum field inside `segment` must be zero.
#[must_use]
pub fn l4_checksum_v4(saddr: &Ipv4Addr, daddr: &Ipv4Addr, proto: u8, segment: &[u8]) -> u16 {
    #[allow(clippy::cast_possible_truncation)] // bounded by the IPv4 total length
    let len = segment.len() as u16;
    let pseudo = ipv4_pseudo_header_sum(saddr, daddr, proto, len);
    finish(partial_sum(segment, pseudo))
}

/// Checksum of an IPv4 header whose checksum field is zero.
#[must_use]
pub fn ipv4_header_checksum(header: &[u8]) -> u16 {
    finish(partial_sum(header, 0))
}

/// Checksum of an ICMPv4 message whose checksum field is zero (no pseudo-header).
#[must_use]
pub fn icmp4_checksum(message: &[u8]) -> u16 {
    finish(partial_sum(message, 0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test {
    use super::*;
    use crate::buffer::TestBuffer;
    use pretty_assertions::assert_eq;

    #[test]
    fn rfc1071_example() {
        // RFC 1071 section 3: 0001 f203 f4f5 f6f7 sums to ddf2
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(partial_sum(&data, 0), 0xddf2);
        assert_eq!(finish(partial_sum(&data, 0)), 0x220d);
    }

    #[test]
    fn delta_rejects_mismatched_ranges() {
        assert_eq!(
            Delta::between(&[1, 2], &[1, 2, 3, 4]),
            Err(ChecksumError::LengthMismatch { old: 2, new: 4 })
        );
        assert_eq!(
            Delta::between(&[1, 2, 3], &[4, 5, 6]),
            Err(ChecksumError::OddLength(3))
        );
        assert_eq!(Delta::between(&[], &[]), Ok(Delta::ZERO));
    }

    #[test]
    fn differential_update_matches_full_recomputation() {
        bolero::check!()
            .with_type()
            .for_each(|(payload, index, new): &(Vec<u8>, u16, [u8; 4])| {
                // a fixed non-zero leading word keeps the sum away from the all-zero corner
                // where one's-complement has two representations of zero
                let mut data = vec![0x00, 0x11];
                data.extend_from_slice(payload);
                if data.len() % 2 != 0 {
                    data.push(0);
                }
                data.extend_from_slice(&[0; 4]);
                let words = (data.len() - 2) / 2;
                let pos = 2 + 2 * (usize::from(*index) % (words - 1));

                let before = finish(partial_sum(&data, 0));
                let delta = Delta::between(&data[pos..pos + 4], new).unwrap();
                data[pos..pos + 4].copy_from_slice(new);
                let after = finish(partial_sum(&data, 0));
                assert_eq!(delta.apply_to(before), after);
            });
    }

    #[test]
    fn word_deltas_combine() {
        let mut data = [0x45, 0x00, 0x12, 0x34, 0xab, 0xcd, 0x00, 0x01];
        let before = finish(partial_sum(&data, 0));
        let d1 = Delta::of_word(0x1234, 0x4321);
        let d2 = Delta::of_word(0xabcd, 0x0000);
        data[2..4].copy_from_slice(&0x4321u16.to_be_bytes());
        data[4..6].copy_from_slice(&0x0000u16.to_be_bytes());
        assert_eq!(
            d1.combine(d2).apply_to(before),
            finish(partial_sum(&data, 0))
        );
    }

    #[test]
    fn apply_l4_keeps_disabled_udp_checksum() {
        let mut buf = TestBuffer::from_raw_data(&[0, 0, 0, 0]);
        let delta = Delta::of_word(0x0102, 0x0304);
        apply_l4(&mut buf, 2, delta, CsumFlags::MANGLED_0).unwrap();
        assert_eq!(buf.as_ref(), &[0, 0, 0, 0]);
        // without the flag the zero is treated as a real checksum
        apply_l4(&mut buf, 2, delta, CsumFlags::PSEUDO_HDR).unwrap();
        assert_ne!(buf.as_ref(), &[0, 0, 0, 0]);
        assert!(apply_l4(&mut buf, 3, delta, CsumFlags::empty()).is_err());
    }

    #[test]
    fn pseudo_header_address_rewrite() {
        // UDP segment with a correct checksum, then rewrite the source address
        let saddr = "fd00::1".parse::<Ipv6Addr>().unwrap();
        let new_saddr = "fd00::ffff:2".parse::<Ipv6Addr>().unwrap();
        let daddr = "2001:db8::7".parse::<Ipv6Addr>().unwrap();
        let mut segment = vec![0x30, 0x39, 0x00, 0x35, 0x00, 0x0c, 0x00, 0x00, 1, 2, 3, 4];
        let csum = l4_checksum_v6(&saddr, &daddr, 17, &segment);
        segment[6..8].copy_from_slice(&csum.to_be_bytes());
        let mut buf = TestBuffer::from_raw_data(&segment);

        let delta = Delta::between(&saddr.octets(), &new_saddr.octets()).unwrap();
        apply_l4(&mut buf, 6, delta, CsumFlags::PSEUDO_HDR).unwrap();

        segment[6..8].copy_from_slice(&[0, 0]);
        let expected = l4_checksum_v6(&new_saddr, &daddr, 17, &segment);
        assert_eq!(buf.load_be16(6).unwrap(), expected);
    }

    #[test]
    fn ipv4_header_checksum_matches_etherparse() {
        let builder = etherparse::PacketBuilder::ipv4([10, 0, 0, 1], [192, 168, 1, 1], 64)
            .udp(4000, 53);
        let mut frame = Vec::with_capacity(builder.size(4));
        builder.write(&mut frame, &[9, 9, 9, 9]).unwrap();
        let stored = u16::from_be_bytes([frame[10], frame[11]]);
        frame[10..12].copy_from_slice(&[0, 0]);
        assert_eq!(ipv4_header_checksum(&frame[..20]), stored);

        let udp_stored = u16::from_be_bytes([frame[26], frame[27]]);
        frame[26..28].copy_from_slice(&[0, 0]);
        let computed = l4_checksum_v4(
            &Ipv4Addr::new(10, 0, 0, 1),
            &Ipv4Addr::new(192, 168, 1, 1),
            17,
            &frame[20..],
        );
        assert_eq!(computed, udp_stored);
    }
}
