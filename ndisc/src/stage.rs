// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Datapath stages of the responder.

use config::DatapathConfig;
use lookup::EndpointLookup;
use net::buffer::{BufferAccess, PacketBufferMut};
use net::eth::{self, ETH_HLEN, ETH_P_IPV6};
use net::ip::NextHeader;
use net::ipv6;
use net::packet::{Direction, DropError, DropReason, PacketContext, Verdict};
use pipeline::{
    Continuation, DispatchError, Dispatcher, DropNotify, Icmp6Payload, Monitor, SlotPayload,
    Stage, StageOutcome,
};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::{
    handle_ns, host_handle, is_icmp6_ndp, ndp_handle, send_time_exceeded, synthesize_time_exceeded,
};

fn finish(
    result: Result<StageOutcome, DropError>,
    direction: Direction,
    monitor: &dyn Monitor,
) -> StageOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            monitor.drop_notify(&DropNotify::new(err, direction));
            err.into()
        }
    }
}

fn hdr_off(payload: &Icmp6Payload) -> Result<usize, DropError> {
    usize::try_from(payload.hdr_off).map_err(|_| DropReason::Invalid.into())
}

/// The [`Continuation::HandleIcmp6Ns`] stage.
pub struct HandleNsStage {
    config: Arc<DatapathConfig>,
    endpoints: Arc<dyn EndpointLookup>,
}

impl HandleNsStage {
    #[must_use]
    pub fn new(config: Arc<DatapathConfig>, endpoints: Arc<dyn EndpointLookup>) -> Self {
        Self { config, endpoints }
    }
}

impl<Buf: PacketBufferMut> Stage<Buf> for HandleNsStage {
    fn name(&self) -> &'static str {
        "handle-icmp6-ns"
    }

    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome {
        let payload = Icmp6Payload::load(&mut ctx.scratch);
        let result = hdr_off(&payload)
            .and_then(|nh_off| handle_ns(ctx, nh_off, &self.config, &*self.endpoints))
            .map(StageOutcome::from);
        finish(result, payload.direction, monitor)
    }
}

/// The [`Continuation::SendIcmp6TimeExceeded`] stage.
pub struct TimeExceededStage {
    config: Arc<DatapathConfig>,
}

impl TimeExceededStage {
    #[must_use]
    pub fn new(config: Arc<DatapathConfig>) -> Self {
        Self { config }
    }
}

impl<Buf: PacketBufferMut> Stage<Buf> for TimeExceededStage {
    fn name(&self) -> &'static str {
        "send-icmp6-time-exceeded"
    }

    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome {
        let payload = Icmp6Payload::load(&mut ctx.scratch);
        let result = hdr_off(&payload).and_then(|nh_off| {
            let Some(router_ip) = self.config.router_ipv6 else {
                warn!("No router address to source time exceeded errors from");
                return Err(DropReason::Invalid.into());
            };
            synthesize_time_exceeded(ctx, nh_off, router_ip, self.config.iface_mac)
                .map(StageOutcome::from)
        });
        finish(result, payload.direction, monitor)
    }
}

/// Entry stage for frames on a device with IPv6 enabled.
///
/// On the host device ICMPv6 goes through the host policy. Elsewhere, neighbor solicitations
/// are handed to the responder, other neighbor discovery messages pass untouched, and
/// forwarded packets have their hop limit decremented or are answered with a time exceeded
/// error once it runs out.
pub struct NdiscEntry {
    config: Arc<DatapathConfig>,
    direction: Direction,
}

impl NdiscEntry {
    #[must_use]
    pub fn new(config: Arc<DatapathConfig>, direction: Direction) -> Self {
        Self { config, direction }
    }

    fn process<Buf: PacketBufferMut>(
        &self,
        ctx: &mut PacketContext<Buf>,
    ) -> Result<StageOutcome, DropError> {
        if eth::load_proto(&ctx.buffer)? != ETH_P_IPV6 {
            return Ok(Verdict::Pass.into());
        }
        let l3 = ipv6::parse(&ctx.buffer, ETH_HLEN)?;
        if self.config.is_host() {
            if l3.nexthdr == NextHeader::ICMPV6 {
                return Ok(host_handle(&ctx.buffer, l3.l4_off, &self.config)?.into());
            }
            return Ok(Verdict::Pass.into());
        }
        if is_icmp6_ndp(&ctx.buffer, ETH_HLEN) {
            return ndp_handle(&ctx.buffer, ETH_HLEN, self.direction);
        }
        let hop_off = ETH_HLEN + ipv6::HOP_LIMIT_OFF;
        let hop_limit = ctx.buffer.load_u8(hop_off)?;
        if hop_limit <= 1 {
            return Ok(send_time_exceeded(ETH_HLEN, self.direction)?.into());
        }
        ctx.buffer.store_u8(hop_off, hop_limit - 1)?;
        trace!("hop limit {hop_limit} -> {}", hop_limit - 1);
        Ok(Verdict::Pass.into())
    }
}

impl<Buf: PacketBufferMut> Stage<Buf> for NdiscEntry {
    fn name(&self) -> &'static str {
        "ndisc-entry"
    }

    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome {
        let result = self.process(ctx);
        finish(result, self.direction, monitor)
    }
}

/// Register the responder's continuations.
pub fn register_continuations<Buf: PacketBufferMut>(
    dispatcher: &mut Dispatcher<Buf>,
    config: &Arc<DatapathConfig>,
    endpoints: Arc<dyn EndpointLookup>,
) -> Result<(), DispatchError> {
    dispatcher
        .register(
            Continuation::HandleIcmp6Ns,
            HandleNsStage::new(config.clone(), endpoints),
        )?
        .register(
            Continuation::SendIcmp6TimeExceeded,
            TimeExceededStage::new(config.clone()),
        )?;
    Ok(())
}
