// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Drop and trace notifications.

use net::ip::NextHeader;
use net::packet::{Direction, DropError, DropReason, IfIndex};
use std::fmt::Display;
use std::net::IpAddr;
use tracing::{debug, info};

/// Where in the datapath a trace notification was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ObsPoint {
    /// Leaving through the tunnel device
    ToOverlay,
    /// Leaving through a native device
    ToNetwork,
    /// Leaving through the encryption device
    ToCrypto,
    /// Handed to the stack
    ToStack,
}

/// Why a packet is being traced.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TraceReason {
    /// Nothing specific
    #[default]
    Unknown = 0,
    /// First packet of a connection
    CtNew = 1,
    /// Packet of an established connection
    CtEstablished = 2,
    /// Reply of an established connection
    CtReply = 3,
    /// Related to an established connection
    CtRelated = 4,
}

/// Trace state accumulated during a traversal and emitted once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraceContext {
    /// Why the packet is traced
    pub reason: TraceReason,
    /// Number of payload bytes to capture, zero for none
    pub monitor: u32,
}

/// A packet was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropNotify {
    /// Drop reason
    pub reason: DropReason,
    /// Extended diagnostic
    pub ext_err: i32,
    /// Direction of the packet
    pub direction: Direction,
    /// Security label of the source
    pub src_label: u32,
}

impl DropNotify {
    /// Notification for `err` in `direction`, with an unknown source.
    #[must_use]
    pub fn new(err: DropError, direction: Direction) -> Self {
        DropNotify {
            reason: err.reason,
            ext_err: err.ext_err,
            direction,
            src_label: 0,
        }
    }

    /// Attach the source label.
    #[must_use]
    pub fn with_src_label(mut self, src_label: u32) -> Self {
        self.src_label = src_label;
        self
    }
}

impl Display for DropNotify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "drop {} ({}) ext {} {} from label {}",
            self.reason,
            self.reason.code(),
            self.ext_err,
            self.direction,
            self.src_label
        )
    }
}

/// A packet passed an observation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceNotify {
    /// Observation point
    pub obs_point: ObsPoint,
    /// Security label of the source
    pub src_label: u32,
    /// Security label of the destination
    pub dst_id: u32,
    /// Endpoint id
    pub endpoint: u16,
    /// Original address, when it was translated
    pub addr: Option<IpAddr>,
    /// Device
    pub ifindex: IfIndex,
    /// Accumulated trace state
    pub trace: TraceContext,
    /// Transport protocol, when known
    pub proto: Option<NextHeader>,
}

impl TraceNotify {
    /// Notification at `obs_point` on `ifindex` with nothing else known.
    #[must_use]
    pub fn new(obs_point: ObsPoint, ifindex: IfIndex) -> Self {
        TraceNotify {
            obs_point,
            src_label: 0,
            dst_id: 0,
            endpoint: 0,
            addr: None,
            ifindex,
            trace: TraceContext::default(),
            proto: None,
        }
    }
}

impl Display for TraceNotify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "trace {} on {} label {} reason {} monitor {}",
            self.obs_point, self.ifindex, self.src_label, self.trace.reason, self.trace.monitor
        )?;
        if let Some(addr) = self.addr {
            write!(f, " orig {addr}")?;
        }
        if let Some(proto) = self.proto {
            write!(f, " {proto}")?;
        }
        Ok(())
    }
}

/// Sink of the notifications emitted by the stages.
pub trait Monitor: Send + Sync {
    /// A packet was dropped.
    fn drop_notify(&self, notify: &DropNotify);
    /// A packet passed an observation point.
    fn trace_notify(&self, notify: &TraceNotify);
}

/// Emits notifications as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn drop_notify(&self, notify: &DropNotify) {
        info!(
            reason = %notify.reason,
            code = notify.reason.code(),
            ext_err = notify.ext_err,
            direction = %notify.direction,
            src_label = notify.src_label,
            "packet dropped"
        );
    }

    fn trace_notify(&self, notify: &TraceNotify) {
        debug!("{notify}");
    }
}

#[cfg(any(test, feature = "testing"))]
mod recording {
    use super::{DropNotify, Monitor, TraceNotify};
    use std::sync::Mutex;

    /// Keeps every notification, for tests.
    #[derive(Debug, Default)]
    pub struct RecordingMonitor {
        drops: Mutex<Vec<DropNotify>>,
        traces: Mutex<Vec<TraceNotify>>,
    }

    impl RecordingMonitor {
        /// Drop notifications received so far.
        #[must_use]
        pub fn drops(&self) -> Vec<DropNotify> {
            self.drops.lock().map(|d| d.clone()).unwrap_or_default()
        }

        /// Trace notifications received so far.
        #[must_use]
        pub fn traces(&self) -> Vec<TraceNotify> {
            self.traces.lock().map(|t| t.clone()).unwrap_or_default()
        }
    }

    impl Monitor for RecordingMonitor {
        fn drop_notify(&self, notify: &DropNotify) {
            if let Ok(mut drops) = self.drops.lock() {
                drops.push(*notify);
            }
        }

        fn trace_notify(&self, notify: &TraceNotify) {
            if let Ok(mut traces) = self.traces.lock() {
                traces.push(*notify);
            }
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub use recording::RecordingMonitor;

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn tracing_monitor_logs_drops() {
        let notify = DropNotify::new(DropReason::UnknownTarget.into(), Direction::Ingress)
            .with_src_label(2);
        TracingMonitor.drop_notify(&notify);
        assert!(logs_contain("packet dropped"));
        assert!(logs_contain("unknown_target"));
        assert_eq!(
            notify.to_string(),
            "drop unknown_target (-150) ext 0 ingress from label 2"
        );
    }

    #[test]
    fn trace_display() {
        let mut notify = TraceNotify::new(ObsPoint::ToNetwork, IfIndex(2));
        notify.trace.reason = TraceReason::CtReply;
        notify.proto = Some(NextHeader::UDP);
        assert_eq!(
            notify.to_string(),
            "trace to-network on if2 label 0 reason ct_reply monitor 0 udp"
        );
    }
}
