// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Packet context and stage verdicts

mod meta;
mod scratch;
mod verdict;

use crate::buffer::PacketBufferMut;

#[allow(unused_imports)] // re-export
pub use meta::*;
#[allow(unused_imports)] // re-export
pub use scratch::*;
#[allow(unused_imports)] // re-export
pub use verdict::*;

/// A packet owned by one traversal of the datapath.
///
/// The buffer holds the full frame starting at the ethernet header. The remaining fields stand
/// in for state the kernel keeps next to the frame.
#[derive(Debug)]
pub struct PacketContext<Buf: PacketBufferMut> {
    /// The frame
    pub buffer: Buf,
    /// Device the program runs on
    pub ifindex: IfIndex,
    /// The packet has already been source- or reverse-translated
    pub snat_done: bool,
    /// Health-check encapsulation has already been applied
    pub health_encap_done: bool,
    /// Cookie of the originating socket, if any
    pub socket_cookie: Option<u64>,
    /// Tunnel metadata set for an encapsulating device
    pub tunnel_key: Option<TunnelKey>,
    /// Words carried across a hand-off
    pub scratch: ScratchSlots,
}

impl<Buf: PacketBufferMut> PacketContext<Buf> {
    /// Wrap a frame received on `ifindex`.
    #[must_use]
    pub fn new(buffer: Buf, ifindex: IfIndex) -> Self {
        PacketContext {
            buffer,
            ifindex,
            snat_done: false,
            health_encap_done: false,
            socket_cookie: None,
            tunnel_key: None,
            scratch: ScratchSlots::default(),
        }
    }

    /// Attach a socket cookie.
    #[must_use]
    pub fn with_socket_cookie(mut self, cookie: u64) -> Self {
        self.socket_cookie = Some(cookie);
        self
    }

    /// Release the frame.
    #[must_use]
    pub fn into_buffer(self) -> Buf {
        self.buffer
    }
}
