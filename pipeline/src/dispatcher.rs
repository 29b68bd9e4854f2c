// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![allow(clippy::missing_errors_doc)]

use net::buffer::PacketBufferMut;
use net::packet::{DropError, DropReason, IfIndex, PacketContext, RedirectFlags, Verdict};
use ordermap::OrderMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::{Continuation, DropNotify, Monitor, Stage, StageOutcome};

/// Largest number of hand-offs a single packet may take.
pub const MAX_TAIL_CALLS: usize = 33;

/// Errors raised while setting up a [`Dispatcher`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    /// A stage is already registered for the continuation
    #[error("Duplicate continuation: {0}")]
    DuplicateContinuation(Continuation),
}

/// End of a packet's traversal.
#[derive(Debug)]
pub enum Outcome<Buf: PacketBufferMut> {
    /// Continue normal processing
    Pass(PacketContext<Buf>),
    /// Send to another device
    Redirect {
        /// Target device
        ifindex: IfIndex,
        /// Redirect modifiers
        flags: RedirectFlags,
        /// The packet
        packet: PacketContext<Buf>,
    },
    /// The packet was consumed
    Dropped(DropError),
}

impl<Buf: PacketBufferMut> Outcome<Buf> {
    fn from_verdict(verdict: Verdict, packet: PacketContext<Buf>) -> Self {
        match verdict {
            Verdict::Pass => Outcome::Pass(packet),
            Verdict::Redirect { ifindex, flags } => Outcome::Redirect {
                ifindex,
                flags,
                packet,
            },
            Verdict::Drop(err) => Outcome::Dropped(err),
        }
    }

    /// The verdict this outcome corresponds to.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self {
            Outcome::Pass(_) => Verdict::Pass,
            Outcome::Redirect { ifindex, flags, .. } => Verdict::Redirect {
                ifindex: *ifindex,
                flags: *flags,
            },
            Outcome::Dropped(err) => Verdict::Drop(*err),
        }
    }

    /// Code returned to callers.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.verdict().code()
    }

    /// The packet, unless it was dropped.
    #[must_use]
    pub fn into_packet(self) -> Option<PacketContext<Buf>> {
        match self {
            Outcome::Pass(packet) | Outcome::Redirect { packet, .. } => Some(packet),
            Outcome::Dropped(_) => None,
        }
    }
}

/// Registry of the stages reachable by hand-off, and the loop following hand-offs.
pub struct Dispatcher<Buf: PacketBufferMut> {
    stages: OrderMap<Continuation, Box<dyn Stage<Buf>>>,
    monitor: Arc<dyn Monitor>,
}

impl<Buf: PacketBufferMut> Dispatcher<Buf> {
    /// Create a [`Dispatcher`] reporting to `monitor`.
    #[must_use]
    pub fn new(monitor: Arc<dyn Monitor>) -> Self {
        Self {
            stages: OrderMap::new(),
            monitor,
        }
    }

    /// Register the stage that runs when a packet is handed off to `continuation`.
    pub fn register<S: Stage<Buf> + 'static>(
        &mut self,
        continuation: Continuation,
        stage: S,
    ) -> Result<&mut Self, DispatchError> {
        if self.stages.contains_key(&continuation) {
            return Err(DispatchError::DuplicateContinuation(continuation));
        }
        debug!("Registering stage {} for {continuation}", stage.name());
        self.stages.insert(continuation, Box::new(stage));
        Ok(self)
    }

    /// True if a stage is registered for `continuation`.
    #[must_use]
    pub fn has(&self, continuation: Continuation) -> bool {
        self.stages.contains_key(&continuation)
    }

    /// The monitor notifications go to.
    #[must_use]
    pub fn monitor(&self) -> &dyn Monitor {
        &*self.monitor
    }

    /// Run `entry` on a packet and follow its hand-offs until a verdict is reached.
    ///
    /// A hand-off to a continuation with no stage, or one past [`MAX_TAIL_CALLS`], drops the
    /// packet with `MissedTailCall`.
    pub fn process(&self, entry: &dyn Stage<Buf>, mut ctx: PacketContext<Buf>) -> Outcome<Buf> {
        trace!("{}: processing packet on {}", entry.name(), ctx.ifindex);
        let mut outcome = entry.run(&mut ctx, self.monitor());
        let mut tail_calls = 0;
        loop {
            let handoff = match outcome {
                StageOutcome::Verdict(verdict) => {
                    debug!("Verdict after {tail_calls} hand-offs: {verdict}");
                    return Outcome::from_verdict(verdict, ctx);
                }
                StageOutcome::TailCall(handoff) => handoff,
            };
            tail_calls += 1;
            let stage = self
                .stages
                .get(&handoff.to)
                .filter(|_| tail_calls <= MAX_TAIL_CALLS);
            let Some(stage) = stage else {
                warn!("Missed hand-off to {} (hop {tail_calls})", handoff.to);
                let err = DropError::from(DropReason::MissedTailCall);
                self.monitor.drop_notify(
                    &DropNotify::new(err, handoff.payload.direction())
                        .with_src_label(handoff.payload.src_label()),
                );
                return Outcome::Dropped(err);
            };
            trace!("Hand-off to {}", handoff.to);
            handoff.payload.store(&mut ctx.scratch);
            outcome = stage.run(&mut ctx, self.monitor());
        }
    }
}
