// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bounds-checked loads, stores and tail resizing over a [`PacketBufferMut`].

use crate::buffer::PacketBufferMut;
use tracing::trace;

/// Failure of a checked buffer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// A load reached past the end of the buffer.
    #[error("load of {len} bytes at offset {offset} exceeds buffer of {buf_len} bytes")]
    Load {
        /// Offset of the first byte requested
        offset: usize,
        /// Number of bytes requested
        len: usize,
        /// Current length of the buffer
        buf_len: usize,
    },
    /// A store reached past the end of the buffer.
    #[error("store of {len} bytes at offset {offset} exceeds buffer of {buf_len} bytes")]
    Store {
        /// Offset of the first byte written
        offset: usize,
        /// Number of bytes written
        len: usize,
        /// Current length of the buffer
        buf_len: usize,
    },
    /// The buffer could not be grown or shrunk to the requested length.
    #[error("cannot resize buffer from {from} to {to} bytes")]
    Resize {
        /// Length before the request
        from: usize,
        /// Requested length
        to: usize,
    },
}

/// Checked cursor operations over a packet buffer.
///
/// Offsets are relative to the start of the frame. Any operation that cannot be completed in
/// full leaves the buffer untouched and returns an [`AccessError`].
pub trait BufferAccess: PacketBufferMut {
    /// Current length of the frame.
    fn frame_len(&self) -> usize {
        self.as_ref().len()
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Errors
    ///
    /// [`AccessError::Load`] if the range is not inside the buffer.
    fn load_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), AccessError> {
        let bytes = self.as_ref();
        let src = offset
            .checked_add(dst.len())
            .and_then(|end| bytes.get(offset..end))
            .ok_or(AccessError::Load {
                offset,
                len: dst.len(),
                buf_len: bytes.len(),
            })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Load a fixed-size array starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`AccessError::Load`] if the range is not inside the buffer.
    fn load<const N: usize>(&self, offset: usize) -> Result<[u8; N], AccessError> {
        let mut out = [0u8; N];
        self.load_bytes(offset, &mut out)?;
        Ok(out)
    }

    /// Load one byte.
    ///
    /// # Errors
    ///
    /// [`AccessError::Load`] if `offset` is past the end of the buffer.
    fn load_u8(&self, offset: usize) -> Result<u8, AccessError> {
        let [b] = self.load::<1>(offset)?;
        Ok(b)
    }

    /// Load a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// [`AccessError::Load`] if the range is not inside the buffer.
    fn load_be16(&self, offset: usize) -> Result<u16, AccessError> {
        Ok(u16::from_be_bytes(self.load::<2>(offset)?))
    }

    /// Copy `src` into the buffer starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`AccessError::Store`] if the range is not inside the buffer.
    fn store_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), AccessError> {
        let bytes = self.as_mut();
        let buf_len = bytes.len();
        let dst = offset
            .checked_add(src.len())
            .and_then(|end| bytes.get_mut(offset..end))
            .ok_or(AccessError::Store {
                offset,
                len: src.len(),
                buf_len,
            })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Store one byte.
    ///
    /// # Errors
    ///
    /// [`AccessError::Store`] if `offset` is past the end of the buffer.
    fn store_u8(&mut self, offset: usize, value: u8) -> Result<(), AccessError> {
        self.store_bytes(offset, &[value])
    }

    /// Store a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// [`AccessError::Store`] if the range is not inside the buffer.
    fn store_be16(&mut self, offset: usize, value: u16) -> Result<(), AccessError> {
        self.store_bytes(offset, &value.to_be_bytes())
    }

    /// Grow or shrink the frame at its tail to exactly `new_len` bytes.
    ///
    /// Bytes added at the tail are zero-filled.
    ///
    /// # Errors
    ///
    /// [`AccessError::Resize`] if the buffer lacks tailroom or `new_len` does not fit the
    /// buffer's length type.
    fn change_tail(&mut self, new_len: usize) -> Result<(), AccessError> {
        let from = self.frame_len();
        let err = AccessError::Resize { from, to: new_len };
        trace!("resizing frame tail from {from} to {new_len} bytes");
        if new_len >= from {
            let grow = u16::try_from(new_len - from).map_err(|_| err)?;
            if grow == 0 {
                return Ok(());
            }
            let bytes = self.append(grow).map_err(|_| err)?;
            if let Some(added) = bytes.get_mut(from..) {
                added.fill(0);
            }
        } else {
            let shrink = u16::try_from(from - new_len).map_err(|_| err)?;
            self.trim_from_end(shrink).map_err(|_| err)?;
        }
        Ok(())
    }
}

impl<T: PacketBufferMut> BufferAccess for T {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::{AccessError, BufferAccess};
    use crate::buffer::TestBuffer;

    #[test]
    fn loads_and_stores_are_bounds_checked() {
        let mut buf = TestBuffer::from_raw_data(&[1, 2, 3, 4]);
        assert_eq!(buf.load::<2>(2).unwrap(), [3, 4]);
        assert_eq!(
            buf.load::<2>(3),
            Err(AccessError::Load {
                offset: 3,
                len: 2,
                buf_len: 4
            })
        );
        assert!(buf.store_bytes(3, &[9, 9]).is_err());
        // a failed store leaves the buffer untouched
        assert_eq!(buf.as_ref(), &[1, 2, 3, 4]);
        buf.store_be16(0, 0xabcd).unwrap();
        assert_eq!(buf.load_be16(0).unwrap(), 0xabcd);
        assert!(buf.load_u8(usize::MAX).is_err());
    }

    #[test]
    fn change_tail_zero_fills_growth() {
        let mut buf = TestBuffer::from_raw_data(&[0xff; 6]);
        buf.change_tail(10).unwrap();
        assert_eq!(buf.as_ref(), &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
        buf.change_tail(3).unwrap();
        assert_eq!(buf.as_ref(), &[0xff, 0xff, 0xff]);
        assert_eq!(
            buf.change_tail(3 + usize::from(TestBuffer::TAILROOM) + 100),
            Err(AccessError::Resize {
                from: 3,
                to: 3 + usize::from(TestBuffer::TAILROOM) + 100
            })
        );
    }
}
