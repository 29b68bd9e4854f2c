// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! FIB lookup followed by a redirect to the resolved device.

use lookup::{Fib, FibParams};
use net::buffer::PacketBufferMut;
use net::eth;
use net::packet::{DropError, PacketContext, Verdict};
use tracing::debug;

/// Resolve `params`, address the frame to the route's next hop, and send it out of the
/// route's device.
///
/// Returns [`Verdict::Pass`] when the route leaves from the device the packet is already on,
/// so that the caller carries on with it.
///
/// # Errors
///
/// The FIB's error when there is no route, [`DropReason::WriteError`] if the MAC addresses
/// cannot be written.
///
/// [`DropReason::WriteError`]: net::packet::DropReason::WriteError
pub fn fib_lookup_and_redirect<Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    fib: &dyn Fib,
    params: &FibParams,
) -> Result<Verdict, DropError> {
    let route = fib.lookup(params).inspect_err(|e| {
        debug!("no route for {params}: {e}");
    })?;
    eth::store_smac(&mut ctx.buffer, route.smac)?;
    eth::store_dmac(&mut ctx.buffer, route.dmac)?;
    if route.ifindex == ctx.ifindex {
        debug!("route for {params} stays on {}", ctx.ifindex);
        return Ok(Verdict::Pass);
    }
    debug!("route for {params}: redirect to {}", route.ifindex);
    Ok(Verdict::redirect(route.ifindex))
}
