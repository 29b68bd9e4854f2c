// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Reverse translation of replies to translated flows.

use config::DatapathConfig;
use lookup::FibParams;
use net::buffer::PacketBufferMut;
use net::family::IpFamily;
use net::packet::{Direction, DropError, PacketContext, Verdict};
use pipeline::{TraceContext, TraceReason};
use tracing::{debug, trace};

use crate::fib::fib_lookup_and_redirect;
use crate::l4::{End, rewrite};
use crate::tables::NatTables;
use crate::tuple::{extract_tuple, revalidate};

/// What the reverse translation step did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevDnatOutcome {
    pub verdict: Verdict,
    /// The destination was restored to the original endpoint
    pub restored: bool,
}

impl RevDnatOutcome {
    fn pass() -> Self {
        Self {
            verdict: Verdict::Pass,
            restored: false,
        }
    }
}

/// Restore the original destination of a reply to a translated flow.
///
/// Packets without a reverse translation record pass untouched, and so does anything that is
/// not service traffic. A record is only applied to packets connection tracking classifies as
/// replies. When a record exists and the program does FIB lookups, the packet is routed on
/// its restored addresses, unless `revdnat_only` is set.
///
/// A restored packet no longer matches its record, so running this twice changes nothing.
///
/// # Errors
///
/// Parse, rewrite and FIB errors.
pub fn rev_dnat_fwd<F: IpFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    tables: &NatTables<F>,
    config: &DatapathConfig,
    revdnat_only: bool,
    trace: &mut TraceContext,
) -> Result<RevDnatOutcome, DropError> {
    let l3 = revalidate::<F, _>(&ctx.buffer)?;
    let tuple = match extract_tuple(&ctx.buffer, &l3, Direction::Egress) {
        Ok(tuple) => tuple,
        Err(e) if e.is_recoverable() => {
            trace!("not service traffic: {e}");
            return Ok(RevDnatOutcome::pass());
        }
        Err(e) => return Err(e),
    };
    let Some(record) = tables.rev_nat.lookup_rev_nat(&tuple) else {
        return Ok(RevDnatOutcome::pass());
    };

    let ct = tables.conntrack.classify(&tuple, Direction::Ingress);
    let restored = ct.is_reply();
    if restored {
        trace.reason = TraceReason::CtReply;
        trace.monitor = ct.monitor;
        rewrite(
            &mut ctx.buffer,
            &l3,
            End::Destination,
            record.address,
            Some(record.port),
        )?;
        ctx.snat_done = true;
        debug!("rev-dnat {tuple} to {record}");
    } else {
        trace!("{tuple} is {}, not reverse-translated", ct.class);
    }

    if revdnat_only || !config.fib_on_revdnat() {
        return Ok(RevDnatOutcome {
            verdict: Verdict::Pass,
            restored,
        });
    }
    // keyed on the reply as restored: its source and the original client
    let params = FibParams {
        ifindex: ctx.ifindex,
        src: tuple.saddr.into(),
        dst: record.address.into(),
    };
    let verdict = fib_lookup_and_redirect(ctx, &*tables.fib, &params)?;
    if verdict == Verdict::Pass {
        revalidate::<F, _>(&ctx.buffer)?;
    }
    Ok(RevDnatOutcome { verdict, restored })
}
