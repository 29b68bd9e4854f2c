// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Datapath stages of the nodeport egress path.

use config::{DatapathConfig, ProgramKind};
use lookup::HealthLookup;
use net::buffer::PacketBufferMut;
use net::eth::{self, ETH_P_IP, ETH_P_IPV6};
use net::family::{V4, V6};
use net::packet::{Direction, DropError, PacketContext, Verdict};
use pipeline::{
    Continuation, DispatchError, Dispatcher, DropNotify, Handoff, Monitor, NatFwdPayload,
    ObsPoint, SlotPayload, SnatPayload, Stage, StageOutcome, TraceContext, TraceNotify,
    TraceReason,
};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::trace;

use crate::family::NatFamily;
use crate::health::handle_health;
use crate::revdnat::rev_dnat_fwd;
use crate::snat::snat_fwd;
use crate::tables::NatTables;
use crate::tuple::revalidate;

fn finish(
    result: Result<StageOutcome, DropError>,
    src_label: u32,
    monitor: &dyn Monitor,
) -> StageOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            monitor.drop_notify(&DropNotify::new(err, Direction::Egress).with_src_label(src_label));
            err.into()
        }
    }
}

fn obs_point(program: ProgramKind) -> ObsPoint {
    match program {
        ProgramKind::Host => ObsPoint::ToNetwork,
        ProgramKind::Overlay => ObsPoint::ToOverlay,
        ProgramKind::Wireguard => ObsPoint::ToCrypto,
    }
}

fn notify_pass<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &PacketContext<Buf>,
    config: &DatapathConfig,
    src_label: u32,
    trace: TraceContext,
    addr: Option<IpAddr>,
    monitor: &dyn Monitor,
) {
    let mut notify = TraceNotify::new(obs_point(config.program), ctx.ifindex);
    notify.src_label = src_label;
    notify.addr = addr;
    notify.trace = trace;
    notify.proto = revalidate::<F, _>(&ctx.buffer).ok().map(|l3| l3.nexthdr);
    monitor.trace_notify(&notify);
}

/// Reverse translation, then the hand-off to SNAT for traffic that was not reverse-translated.
///
/// # Errors
///
/// See [`rev_dnat_fwd`].
pub fn handle_nat_fwd<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    tables: &NatTables<F>,
    config: &DatapathConfig,
    payload: &NatFwdPayload,
    trace: &mut TraceContext,
) -> Result<StageOutcome, DropError> {
    let revdnat = rev_dnat_fwd(ctx, tables, config, payload.revdnat_only, trace)?;
    if revdnat.verdict != Verdict::Pass || payload.revdnat_only {
        return Ok(revdnat.verdict.into());
    }
    if !revdnat.restored && F::snat_after_revdnat(config) {
        trace!("handing off to {}", F::SNAT_FWD);
        let snat = SnatPayload {
            src_label: payload.src_label,
            cluster_id: payload.cluster_id,
        };
        return Ok(Handoff::new(F::SNAT_FWD, snat).into());
    }
    Ok(Verdict::Pass.into())
}

fn run_nat_fwd<F: NatFamily, Buf: PacketBufferMut>(
    ctx: &mut PacketContext<Buf>,
    tables: &NatTables<F>,
    config: &DatapathConfig,
    payload: &NatFwdPayload,
    monitor: &dyn Monitor,
) -> StageOutcome {
    let mut trace = TraceContext {
        reason: TraceReason::Unknown,
        monitor: config.trace_payload_len,
    };
    let result = handle_nat_fwd(ctx, tables, config, payload, &mut trace);
    if matches!(result, Ok(StageOutcome::Verdict(Verdict::Pass))) {
        notify_pass::<F, _>(ctx, config, payload.src_label, trace, None, monitor);
    }
    finish(result, payload.src_label, monitor)
}

/// The NAT-forward continuation of family `F`.
pub struct NatFwdStage<F: NatFamily> {
    config: Arc<DatapathConfig>,
    tables: NatTables<F>,
}

impl<F: NatFamily> NatFwdStage<F> {
    #[must_use]
    pub fn new(config: Arc<DatapathConfig>, tables: NatTables<F>) -> Self {
        Self { config, tables }
    }
}

impl<F: NatFamily, Buf: PacketBufferMut> Stage<Buf> for NatFwdStage<F> {
    fn name(&self) -> &'static str {
        "nodeport-nat-fwd"
    }

    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome {
        let payload = NatFwdPayload::load(&mut ctx.scratch);
        run_nat_fwd(ctx, &self.tables, &self.config, &payload, monitor)
    }
}

/// The SNAT continuation of family `F`.
pub struct SnatStage<F: NatFamily> {
    config: Arc<DatapathConfig>,
    tables: NatTables<F>,
}

impl<F: NatFamily> SnatStage<F> {
    #[must_use]
    pub fn new(config: Arc<DatapathConfig>, tables: NatTables<F>) -> Self {
        Self { config, tables }
    }
}

impl<F: NatFamily, Buf: PacketBufferMut> Stage<Buf> for SnatStage<F> {
    fn name(&self) -> &'static str {
        "nodeport-snat-fwd"
    }

    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome {
        let payload = SnatPayload::load(&mut ctx.scratch);
        let result = snat_fwd(ctx, &self.tables, &self.config, payload.cluster_id);
        if let Some(outcome) = result.as_ref().ok().filter(|o| o.verdict == Verdict::Pass) {
            notify_pass::<F, _>(
                ctx,
                &self.config,
                payload.src_label,
                TraceContext::default(),
                outcome.orig_saddr.map(Into::into),
                monitor,
            );
        }
        finish(
            result.map(|outcome| outcome.verdict.into()),
            payload.src_label,
            monitor,
        )
    }
}

/// Entry of packets leaving the node through the program's device.
///
/// Health-check probes are redirected first. Packets already translated on another device
/// pass. Everything else goes through the NAT-forward step of its family, run in place or
/// handed off to its continuation depending on the configuration.
pub struct NodeportEgress {
    config: Arc<DatapathConfig>,
    v4: NatTables<V4>,
    v6: NatTables<V6>,
    health: Arc<dyn HealthLookup>,
    src_label: u32,
    cluster_id: u32,
    revdnat_only: bool,
}

impl NodeportEgress {
    #[must_use]
    pub fn new(
        config: Arc<DatapathConfig>,
        v4: NatTables<V4>,
        v6: NatTables<V6>,
        health: Arc<dyn HealthLookup>,
    ) -> Self {
        let cluster_id = config.cluster_id;
        Self {
            config,
            v4,
            v6,
            health,
            src_label: 0,
            cluster_id,
            revdnat_only: false,
        }
    }

    /// Attribute the traffic to a source security label and cluster.
    #[must_use]
    pub fn with_source(mut self, src_label: u32, cluster_id: u32) -> Self {
        self.src_label = src_label;
        self.cluster_id = cluster_id;
        self
    }

    /// Only reverse-translate, skipping the FIB and SNAT. Used before encryption.
    #[must_use]
    pub fn revdnat_only(mut self, revdnat_only: bool) -> Self {
        self.revdnat_only = revdnat_only;
        self
    }

    fn payload(&self) -> NatFwdPayload {
        NatFwdPayload {
            revdnat_only: self.revdnat_only,
            src_label: self.src_label,
            cluster_id: self.cluster_id,
        }
    }

    fn nat_fwd<F: NatFamily, Buf: PacketBufferMut>(
        &self,
        ctx: &mut PacketContext<Buf>,
        tables: &NatTables<F>,
        monitor: &dyn Monitor,
    ) -> StageOutcome {
        let payload = self.payload();
        if F::nat_fwd_tail_call(&self.config) {
            trace!("handing off to {}", F::NAT_FWD);
            return Handoff::new(F::NAT_FWD, payload).into();
        }
        run_nat_fwd(ctx, tables, &self.config, &payload, monitor)
    }
}

impl<Buf: PacketBufferMut> Stage<Buf> for NodeportEgress {
    fn name(&self) -> &'static str {
        "nodeport-egress"
    }

    fn run(&self, ctx: &mut PacketContext<Buf>, monitor: &dyn Monitor) -> StageOutcome {
        let health = handle_health(
            ctx,
            &self.config,
            &*self.health,
            &*self.v4.endpoints,
            self.src_label,
        );
        match health {
            Ok(Verdict::Pass) => {}
            other => return finish(other.map(Into::into), self.src_label, monitor),
        }
        if ctx.snat_done {
            trace!("already translated");
            return Verdict::Pass.into();
        }
        let proto = match eth::load_proto(&ctx.buffer) {
            Ok(proto) => proto,
            Err(e) => return finish(Err(e.into()), self.src_label, monitor),
        };
        match proto {
            ETH_P_IP if self.config.enable_ipv4 => self.nat_fwd(ctx, &self.v4, monitor),
            ETH_P_IPV6 if self.config.enable_ipv6 => self.nat_fwd(ctx, &self.v6, monitor),
            _ => Verdict::Pass.into(),
        }
    }
}

/// Register the NAT-forward and SNAT continuations of both families.
pub fn register_continuations<Buf: PacketBufferMut>(
    dispatcher: &mut Dispatcher<Buf>,
    config: &Arc<DatapathConfig>,
    v4: &NatTables<V4>,
    v6: &NatTables<V6>,
) -> Result<(), DispatchError> {
    dispatcher
        .register(
            Continuation::Ipv4NodeportNatFwd,
            NatFwdStage::new(config.clone(), v4.clone()),
        )?
        .register(
            Continuation::Ipv4NodeportSnatFwd,
            SnatStage::new(config.clone(), v4.clone()),
        )?
        .register(
            Continuation::Ipv6NodeportNatFwd,
            NatFwdStage::new(config.clone(), v6.clone()),
        )?
        .register(
            Continuation::Ipv6NodeportSnatFwd,
            SnatStage::new(config.clone(), v6.clone()),
        )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test {
    use super::*;
    use crate::fixtures::{
        GW_DMAC, GW_SMAC, NODE, NODE6, POD, POD6, SERVER, SERVER6, base_config, tables, v4, v6,
    };
    use config::DsrMode;
    use lookup::testing::{CtTable, HealthTable, RevNatTable, StaticFib, StaticMasquerade};
    use lookup::{CtClass, FibRoute, NatTarget, ReverseNatRecord};
    use net::buffer::TestBuffer;
    use net::ip::NextHeader;
    use net::packet::{DropReason, IfIndex, TunnelKey};
    use net::tuple::L3Tuple;
    use pipeline::RecordingMonitor;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    const LABEL: u32 = 42;

    fn setup(
        config: DatapathConfig,
        v4: NatTables<V4>,
        v6: NatTables<V6>,
    ) -> (Dispatcher<TestBuffer>, Arc<RecordingMonitor>, NodeportEgress) {
        let config = Arc::new(config);
        let monitor = Arc::new(RecordingMonitor::default());
        let mut dispatcher = Dispatcher::new(monitor.clone());
        register_continuations(&mut dispatcher, &config, &v4, &v6).unwrap();
        let entry =
            NodeportEgress::new(config, v4, v6, Arc::new(HealthTable::new())).with_source(LABEL, 0);
        (dispatcher, monitor, entry)
    }

    fn overlay() -> DatapathConfig {
        base_config()
            .program(ProgramKind::Overlay)
            .build_validated()
            .unwrap()
    }

    fn masquerade_v4(target: NatTarget<V4>) -> NatTables<V4> {
        NatTables {
            masquerade: Arc::new(StaticMasquerade::new().with(POD, target)),
            ..tables()
        }
    }

    fn packet(frame: &[u8]) -> PacketContext<TestBuffer> {
        PacketContext::new(TestBuffer::from_raw_data(frame), IfIndex(2))
    }

    #[test]
    #[traced_test]
    fn masquerade_through_both_continuations() {
        let v4 = masquerade_v4(NatTarget::new(NODE, 32768, 65535));
        let (dispatcher, monitor, entry) = setup(overlay(), v4, tables());
        let outcome = dispatcher.process(&entry, packet(&v4::udp(POD, SERVER, 5000, 53)));
        assert_eq!(outcome.verdict(), Verdict::Pass);

        let ctx = outcome.into_packet().unwrap();
        assert!(ctx.snat_done);
        assert!(ctx.scratch.is_clear());
        let decoded = v4::Decoded::new(&ctx.buffer.to_vec());
        assert_eq!(decoded.source(), NODE);
        assert!(decoded.ports().0 >= 32768);
        assert!(decoded.checksums_are_valid());

        let traces = monitor.traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].obs_point, ObsPoint::ToOverlay);
        assert_eq!(traces[0].src_label, LABEL);
        assert_eq!(traces[0].addr, Some(IpAddr::from(POD)));
        assert_eq!(traces[0].trace.monitor, 0);
        assert_eq!(traces[0].proto, Some(NextHeader::UDP));
        assert!(monitor.drops().is_empty());
        assert!(logs_contain("handing off to"));
    }

    #[test]
    fn dsr_without_masquerade_ends_after_nat_fwd() {
        let config = base_config()
            .program(ProgramKind::Overlay)
            .enable_ipv6(false)
            .dsr(DsrMode::Dsr)
            .build_validated()
            .unwrap();
        let v4 = masquerade_v4(NatTarget::new(NODE, 32768, 65535));
        let (dispatcher, monitor, entry) = setup(config, v4, tables());
        let frame = v4::udp(POD, SERVER, 5000, 53);
        let outcome = dispatcher.process(&entry, packet(&frame));
        assert_eq!(outcome.verdict(), Verdict::Pass);
        assert_eq!(outcome.into_packet().unwrap().buffer.to_vec(), frame);

        let traces = monitor.traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].trace.reason, TraceReason::Unknown);
        assert_eq!(traces[0].trace.monitor, 128);
        assert_eq!(traces[0].addr, None);
    }

    #[test]
    fn reply_is_restored_and_not_translated_again() {
        let tuple = L3Tuple::<V4> {
            nexthdr: NextHeader::UDP,
            saddr: SERVER,
            daddr: NODE,
            sport: 53,
            dport: 40000,
        };
        let v4 = NatTables {
            rev_nat: Arc::new(RevNatTable::new().with(
                tuple,
                ReverseNatRecord {
                    address: POD,
                    port: 5000,
                },
            )),
            conntrack: Arc::new(CtTable::new().with(tuple, CtClass::Reply)),
            masquerade: Arc::new(
                StaticMasquerade::new().with(SERVER, NatTarget::new(NODE, 32768, 65535)),
            ),
            ..tables()
        };
        let (dispatcher, monitor, entry) = setup(overlay(), v4, tables());
        let outcome = dispatcher.process(&entry, packet(&v4::udp(SERVER, NODE, 53, 40000)));
        assert_eq!(outcome.verdict(), Verdict::Pass);

        let ctx = outcome.into_packet().unwrap();
        assert!(ctx.snat_done);
        let decoded = v4::Decoded::new(&ctx.buffer.to_vec());
        assert_eq!(decoded.source(), SERVER);
        assert_eq!(decoded.destination(), POD);
        assert_eq!(decoded.ports(), (53, 5000));

        let traces = monitor.traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].trace.reason, TraceReason::CtReply);
    }

    #[test]
    fn translation_failure_is_notified_once() {
        let v4 = masquerade_v4(NatTarget::new(NODE, 32768, 65535));
        let (dispatcher, monitor, entry) = setup(overlay(), v4, tables());
        let outcome = dispatcher.process(&entry, packet(&v4::icmp_echo(POD, SERVER, 3, 0)));
        assert_eq!(outcome.code(), DropReason::NatUnsuppProto.code());
        assert!(outcome.into_packet().is_none());

        let drops = monitor.drops();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].reason, DropReason::NatUnsuppProto);
        assert_eq!(drops[0].direction, Direction::Egress);
        assert_eq!(drops[0].src_label, LABEL);
        assert!(monitor.traces().is_empty());
    }

    #[test]
    fn egress_gateway_redirect_is_not_traced() {
        let config = base_config()
            .program(ProgramKind::Host)
            .egress_gateway(true)
            .build_validated()
            .unwrap();
        let route = FibRoute {
            ifindex: IfIndex(4),
            smac: GW_SMAC,
            dmac: GW_DMAC,
        };
        let v4 = NatTables {
            fib: Arc::new(StaticFib::new().with(SERVER, route)),
            ..masquerade_v4(NatTarget::new(NODE, 32768, 65535).via_egress_gateway(IfIndex(4)))
        };
        let (dispatcher, monitor, entry) = setup(config, v4, tables());
        let outcome = dispatcher.process(&entry, packet(&v4::udp(POD, SERVER, 5000, 53)));
        assert_eq!(outcome.verdict(), Verdict::redirect(IfIndex(4)));
        assert!(monitor.traces().is_empty());
        assert!(monitor.drops().is_empty());
    }

    #[test]
    fn translated_packets_pass() {
        let v4 = masquerade_v4(NatTarget::new(NODE, 32768, 65535));
        let (dispatcher, monitor, entry) = setup(overlay(), v4, tables());
        let frame = v4::udp(POD, SERVER, 5000, 53);
        let mut ctx = packet(&frame);
        ctx.snat_done = true;
        let outcome = dispatcher.process(&entry, ctx);
        assert_eq!(outcome.verdict(), Verdict::Pass);
        assert_eq!(outcome.into_packet().unwrap().buffer.to_vec(), frame);
        assert!(monitor.traces().is_empty());
    }

    #[test]
    fn health_probe_skips_nat() {
        let config = Arc::new(
            base_config()
                .program(ProgramKind::Host)
                .health_check(true)
                .encap_ifindex_v4(IfIndex(10))
                .encap_ifindex_v6(IfIndex(11))
                .build_validated()
                .unwrap(),
        );
        let v4 = masquerade_v4(NatTarget::new(NODE, 32768, 65535));
        let monitor = Arc::new(RecordingMonitor::default());
        let mut dispatcher = Dispatcher::new(monitor.clone());
        register_continuations(&mut dispatcher, &config, &v4, &tables()).unwrap();
        let health = Arc::new(HealthTable::new().with(7, SERVER));
        let entry = NodeportEgress::new(config, v4, tables(), health).with_source(LABEL, 0);

        let frame = v4::udp(POD, SERVER, 5000, 4240);
        let mut ctx = packet(&frame);
        ctx.socket_cookie = Some(7);
        let outcome = dispatcher.process(&entry, ctx);
        assert_eq!(outcome.verdict(), Verdict::redirect(IfIndex(10)));
        let ctx = outcome.into_packet().unwrap();
        assert_eq!(
            ctx.tunnel_key,
            Some(TunnelKey {
                tunnel_id: LABEL,
                remote: IpAddr::from(SERVER),
                ttl: 64,
            })
        );
        assert_eq!(ctx.buffer.to_vec(), frame);
        assert!(monitor.traces().is_empty());
    }

    #[test]
    fn ipv6_masquerade() {
        let v6 = NatTables {
            masquerade: Arc::new(
                StaticMasquerade::new().with(POD6, NatTarget::new(NODE6, 32768, 65535)),
            ),
            ..tables()
        };
        let (dispatcher, monitor, entry) = setup(overlay(), tables(), v6);
        let outcome = dispatcher.process(&entry, packet(&v6::tcp(POD6, SERVER6, 40000, 443)));
        assert_eq!(outcome.verdict(), Verdict::Pass);
        let decoded = v6::Decoded::new(&outcome.into_packet().unwrap().buffer.to_vec());
        assert_eq!(decoded.source(), NODE6);
        assert_eq!(decoded.ports(), (40000, 443));
        assert!(decoded.checksum_is_valid());
        assert_eq!(monitor.traces()[0].addr, Some(IpAddr::from(POD6)));
    }

    #[test]
    fn continuations_register_once() {
        let config = Arc::new(overlay());
        let mut dispatcher = Dispatcher::<TestBuffer>::new(Arc::new(RecordingMonitor::default()));
        register_continuations(&mut dispatcher, &config, &tables(), &tables()).unwrap();
        assert!(dispatcher.has(Continuation::Ipv6NodeportSnatFwd));
        assert_eq!(
            register_continuations(&mut dispatcher, &config, &tables(), &tables()),
            Err(DispatchError::DuplicateContinuation(
                Continuation::Ipv4NodeportNatFwd
            ))
        );
    }

    #[test]
    fn missing_continuation_drops() {
        let monitor = Arc::new(RecordingMonitor::default());
        let dispatcher = Dispatcher::<TestBuffer>::new(monitor.clone());
        let entry = NodeportEgress::new(
            Arc::new(overlay()),
            tables(),
            tables(),
            Arc::new(HealthTable::new()),
        )
        .with_source(LABEL, 3);
        let outcome = dispatcher.process(&entry, packet(&v4::udp(POD, SERVER, 5000, 53)));
        assert_eq!(outcome.code(), DropReason::MissedTailCall.code());
        let drops = monitor.drops();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].src_label, LABEL);
    }
}
