// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use net::buffer::PacketBufferMut;
use net::packet::{DropError, PacketContext, Verdict};

use crate::{Handoff, Monitor};

/// What a stage did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The traversal ends with this verdict
    Verdict(Verdict),
    /// The packet moves on to another stage
    TailCall(Handoff),
}

impl From<Verdict> for StageOutcome {
    fn from(value: Verdict) -> Self {
        StageOutcome::Verdict(value)
    }
}

impl From<DropError> for StageOutcome {
    fn from(value: DropError) -> Self {
        StageOutcome::Verdict(Verdict::Drop(value))
    }
}

impl From<Handoff> for StageOutcome {
    fn from(value: Handoff) -> Self {
        StageOutcome::TailCall(value)
    }
}

/// A processing step of the datapath.
///
/// A stage runs to completion on one packet. It reads any hand-off payload it expects from the
/// packet's scratch slots, and emits its own drop or trace notification on `monitor` when it
/// ends the traversal.
pub trait Stage<Buf: PacketBufferMut>: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Process one packet.
    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome;
}
