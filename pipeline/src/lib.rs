// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(
    unsafe_code,
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

//! # Stage chaining
//!
//! A packet enters the datapath through one [`Stage`]. The stage either finishes with a
//! [`Verdict`](net::packet::Verdict) or hands the packet off to another stage by naming a
//! [`Continuation`]. A hand-off is one-way: nothing of the sending stage survives it except the
//! typed [`Payload`] it attached, which travels in the packet's fixed scratch slots and is read
//! back (and cleared) by the receiving stage.
//!
//! The [`Dispatcher`] owns the registered continuations and follows hand-offs for a packet until
//! a verdict is reached, bounding the number of hops by [`MAX_TAIL_CALLS`].
//!
//! ```rust
//! use nodeport_pipeline::{Dispatcher, Stage, StageOutcome, TracingMonitor};
//! use nodeport_pipeline::Monitor;
//! use net::buffer::TestBuffer;
//! use net::packet::{IfIndex, PacketContext, Verdict};
//! use std::sync::Arc;
//!
//! struct Accept;
//!
//! impl Stage<TestBuffer> for Accept {
//!     fn name(&self) -> &'static str {
//!         "accept"
//!     }
//!     fn run(&self, _ctx: &mut PacketContext<TestBuffer>, _monitor: &dyn Monitor) -> StageOutcome {
//!         Verdict::Pass.into()
//!     }
//! }
//!
//! let dispatcher = Dispatcher::<TestBuffer>::new(Arc::new(TracingMonitor));
//! let ctx = PacketContext::new(TestBuffer::from_raw_data(&[0u8; 64]), IfIndex(2));
//! assert_eq!(dispatcher.process(&Accept, ctx).code(), 0);
//! ```

mod continuation;
mod dispatcher;
mod handoff;
mod monitor;
mod stage;

pub use continuation::Continuation;
pub use dispatcher::{DispatchError, Dispatcher, MAX_TAIL_CALLS, Outcome};
pub use handoff::{
    Handoff, Icmp6Payload, NAT_FLAG_REVDNAT_ONLY, NatFwdPayload, Payload, SlotPayload, SnatPayload,
};
#[cfg(any(test, feature = "testing"))]
pub use monitor::RecordingMonitor;
pub use monitor::{
    DropNotify, Monitor, ObsPoint, TraceContext, TraceNotify, TraceReason, TracingMonitor,
};
pub use stage::{Stage, StageOutcome};

use tracectl::trace_target;
trace_target!("pipeline", LevelFilter::INFO, &["datapath"]);
