//! Integration tests for the update pipeline with a mock hardware layer.
//!
//! These tests drive managers, observers and the remediator through a real
//! pipeline and check what the hardware layer was asked to program.

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use swstate::apply_config::apply_config;
use swstate::config::AgentConfig;
use swstate::convergence::{remediate, ForcedDown, RemediatorPhase};
use swstate::delta::StateDelta;
use swstate::fib::LabelForwardingManager;
use swstate::node::modify;
use swstate::observers::MirrorResolver;
use swstate::persist::{dump, reload};
use swstate::pipeline::{HwError, HwSwitch, PipelineHandle, StateObserver};
use swstate::state::{
    Interface, InterfaceKind, Mirror, MirrorDestination, NeighborEntry, NextHop, NextHopSet, Port,
    PortDescriptor, SwitchInfo, SwitchType,
};
use swstate::{
    AgentContext, Frozen, NullHwSwitch, PipelineConfig, ScopeResolver, StateError, SwitchState,
    UpdatePipeline, UpdateResult,
};
use swstate_types::{
    AdminDistance, AdminState, ClientId, IdRange, InterfaceId, Label, MacAddress, OperState,
    PortId, SwitchId,
};

/// Mock hardware layer
///
/// Records a summary of every delta it is asked to program and fails on
/// demand.
#[derive(Default)]
struct MockHw {
    applied: Mutex<Vec<serde_json::Value>>,
    fail: AtomicBool,
}

impl MockHw {
    fn applied(&self) -> Vec<serde_json::Value> {
        self.applied.lock().unwrap().clone()
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl HwSwitch for MockHw {
    fn state_changed(&self, delta: &StateDelta) -> Result<(), HwError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HwError::new("state_changed", "ASIC programming failed"));
        }
        self.applied.lock().unwrap().push(delta.summary());
        Ok(())
    }
}

/// Appends its name to a shared log on every delta.
struct RecordingObserver {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl StateObserver for RecordingObserver {
    fn name(&self) -> &str {
        self.name
    }

    fn state_updated(&self, delta: &StateDelta) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}@{}", self.name, delta.new_state().generation()));
    }
}

fn switch_infos() -> BTreeMap<SwitchId, SwitchInfo> {
    BTreeMap::from([(
        SwitchId(0),
        SwitchInfo {
            switch_type: SwitchType::Npu,
            switch_index: 0,
            port_id_range: IdRange::new(0, 1023).unwrap(),
            system_port_range: None,
            mac: None,
        },
    )])
}

fn start(initial: SwitchState, hw: Arc<MockHw>) -> (Arc<ScopeResolver>, PipelineHandle) {
    let resolver = Arc::new(ScopeResolver::new(switch_infos()).unwrap());
    let pipeline = UpdatePipeline::start(Frozen::new(initial), hw, PipelineConfig::default()).unwrap();
    (resolver, pipeline)
}

fn nhs(addrs: &[&str]) -> NextHopSet {
    addrs.iter().map(|a| NextHop::new(a.parse().unwrap())).collect()
}

/// Waits until every update queued so far, including observer follow-ups,
/// has been handled.
async fn settle(pipeline: &PipelineHandle) {
    pipeline
        .submit_non_coalescing("barrier", |_| -> UpdateResult { Ok(None) })
        .wait()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_label_program_unprogram_end_to_end() {
    let hw = Arc::new(MockHw::default());
    let (resolver, pipeline) = start(SwitchState::default(), Arc::clone(&hw));
    let manager = LabelForwardingManager::new(AgentContext::new(resolver, pipeline.clone()));
    let label = Label::new(100).unwrap();

    manager
        .program(100, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"]))
        .await
        .unwrap();
    manager
        .program(100, ClientId(2), AdminDistance(5), nhs(&["10.0.0.2"]))
        .await
        .unwrap();
    assert_eq!(manager.resolved(label).unwrap().client, ClientId(2));

    manager.unprogram(label, ClientId(2)).await.unwrap();
    assert_eq!(manager.resolved(label).unwrap().client, ClientId(1));

    manager.unprogram(label, ClientId(1)).await.unwrap();
    assert!(pipeline.snapshot().label_entry(label).is_none());

    let err = manager.unprogram(label, ClientId(1)).await.unwrap_err();
    assert_eq!(err, StateError::LabelNotFound(label));

    assert_eq!(hw.applied().len(), 4);
    assert_eq!(pipeline.stats().rejected, 1);
}

#[tokio::test]
async fn test_hardware_failure_keeps_snapshot() {
    let hw = Arc::new(MockHw::default());
    let (resolver, pipeline) = start(SwitchState::default(), Arc::clone(&hw));
    let manager = LabelForwardingManager::new(AgentContext::new(resolver, pipeline.clone()));
    let before = pipeline.snapshot();

    hw.set_failing(true);
    let err = manager
        .program(200, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::HwApply(_)));
    assert!(Frozen::ptr_eq(&before, &pipeline.snapshot()));
    assert_eq!(pipeline.stats().hw_failed, 1);
    assert_eq!(pipeline.stats().batches_published, 0);

    hw.set_failing(false);
    manager
        .program(200, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"]))
        .await
        .unwrap();
    assert_eq!(hw.applied().len(), 1);
}

#[tokio::test]
async fn test_queued_updates_coalesce_into_one_snapshot() {
    let hw = Arc::new(MockHw::default());
    let (_resolver, pipeline) = start(SwitchState::default(), Arc::clone(&hw));
    let scope = swstate::SwitchMatcher::single(SwitchId(0));

    // Nothing runs on this single-threaded runtime until the first await, so
    // all three are queued together.
    let tickets: Vec<_> = (1..=3u32)
        .map(|id| {
            let scope = scope.clone();
            pipeline.submit(format!("add port {}", id), move |state| -> UpdateResult {
                let mut draft = state.modify();
                modify(&mut draft.ports, |ports| {
                    ports.add(PortId(id), Frozen::new(Port::new(PortId(id), format!("eth{}", id))), scope)
                })?;
                Ok(Some(draft))
            })
        })
        .collect();

    let mut published = Vec::new();
    for ticket in tickets {
        published.push(ticket.wait().await.unwrap());
    }

    assert!(published.windows(2).all(|w| Frozen::ptr_eq(&w[0], &w[1])));
    assert_eq!(published[0].ports.len(), 3);
    assert_eq!(pipeline.stats().batches_published, 1);
    assert_eq!(pipeline.stats().applied, 3);
    assert_eq!(hw.applied().len(), 1);
}

#[tokio::test]
async fn test_non_coalescing_update_is_published_alone() {
    let hw = Arc::new(MockHw::default());
    let (_resolver, pipeline) = start(SwitchState::default(), Arc::clone(&hw));
    let scope = swstate::SwitchMatcher::single(SwitchId(0));
    let add_port = |id: u32| {
        let scope = scope.clone();
        move |state: &Frozen<SwitchState>| -> UpdateResult {
            let mut draft = state.modify();
            modify(&mut draft.ports, |ports| {
                ports.add(PortId(id), Frozen::new(Port::new(PortId(id), format!("eth{}", id))), scope)
            })?;
            Ok(Some(draft))
        }
    };

    // Queued in one burst before the pipeline task gets to run.
    let a = pipeline.submit("add port 1", add_port(1));
    let b = pipeline.submit_non_coalescing("add port 2", add_port(2));
    let c = pipeline.submit("add port 3", add_port(3));
    let d = pipeline.submit("add port 4", add_port(4));

    let a = a.wait().await.unwrap();
    let b = b.wait().await.unwrap();
    let c = c.wait().await.unwrap();
    let d = d.wait().await.unwrap();

    assert_eq!(pipeline.stats().batches_published, 3);
    assert_eq!(hw.applied().len(), 3);
    assert_eq!(a.ports.keys().copied().collect::<Vec<_>>(), vec![PortId(1)]);
    assert_eq!(b.ports.keys().copied().collect::<Vec<_>>(), vec![PortId(1), PortId(2)]);
    assert!(b.generation() > a.generation());
    assert!(Frozen::ptr_eq(&c, &d));
    assert_eq!(c.ports.len(), 4);
    assert!(!Frozen::ptr_eq(&b, &c));
}

#[tokio::test]
async fn test_observers_run_in_registration_order() {
    let (resolver, pipeline) = start(SwitchState::default(), Arc::new(MockHw::default()));
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second"] {
        pipeline.register_observer(Arc::new(RecordingObserver {
            name,
            log: Arc::clone(&log),
        }));
    }
    let manager = LabelForwardingManager::new(AgentContext::new(resolver, pipeline.clone()));

    manager
        .program(300, ClientId(1), AdminDistance(1), nhs(&["10.0.0.1"]))
        .await
        .unwrap();
    manager
        .program(301, ClientId(1), AdminDistance(1), nhs(&["10.0.0.1"]))
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["first@1", "second@1", "first@2", "second@2"]
    );

    assert!(pipeline.unregister_observer("first"));
    manager
        .program(302, ClientId(1), AdminDistance(1), nhs(&["10.0.0.1"]))
        .await
        .unwrap();
    assert_eq!(log.lock().unwrap().last().unwrap(), "second@3");
}

#[tokio::test]
async fn test_remediation_toggles_down_port() {
    let mut initial = SwitchState::default();
    modify(&mut initial.ports, |ports| {
        let mut port = Port::new(PortId(1), "eth1");
        port.admin_state = AdminState::Enabled;
        port.oper_state = OperState::Down;
        ports
            .add(PortId(1), Frozen::new(port), swstate::SwitchMatcher::single(SwitchId(0)))
            .unwrap();
    });
    let hw = Arc::new(MockHw::default());
    let (_resolver, pipeline) = start(initial, Arc::clone(&hw));
    let phase = parking_lot::Mutex::new(RemediatorPhase::Idle);
    let forced = ForcedDown::default();

    let cycle = remediate(&pipeline, &phase, &forced).await.unwrap();

    assert_eq!(cycle.toggled, vec![PortId(1)]);
    assert_eq!(hw.applied().len(), 2);
    assert_eq!(pipeline.stats().batches_published, 2);
    assert_eq!(pipeline.snapshot().port(PortId(1)).unwrap().admin_state, AdminState::Enabled);
}

#[tokio::test]
async fn test_config_mirror_resolution_and_dump_reload() {
    let mut config = AgentConfig::default();
    let mut eth1 = Port::new(PortId(1), "eth1");
    eth1.admin_state = AdminState::Enabled;
    config.ports = vec![eth1];
    let mut intf = Interface::new(InterfaceId(1), InterfaceKind::Port(PortId(1)));
    intf.addresses.insert("10.0.1.1".parse().unwrap(), 24);
    config.interfaces = vec![intf];
    config.mirrors = vec![Mirror::new("span", MirrorDestination::Port(PortId(1)))];

    let resolver = Arc::new(ScopeResolver::new(config.switch_infos()).unwrap());
    let pipeline = UpdatePipeline::start(
        Frozen::new(SwitchState::default()),
        Arc::new(NullHwSwitch),
        PipelineConfig::default(),
    )
    .unwrap();
    pipeline.register_observer(Arc::new(MirrorResolver::new(pipeline.submitter())));
    let ctx = AgentContext::with_config(resolver, pipeline.clone(), Arc::new(config));

    apply_config(&ctx).await.unwrap();
    settle(&pipeline).await;

    let state = pipeline.snapshot();
    let mirror = state.mirrors.get(&"span".to_string()).unwrap();
    assert_eq!(mirror.egress_port, Some(PortId(1)));

    // Learned neighbors survive a dump and reload.
    let learned = pipeline
        .submit("learn neighbor", |state| -> UpdateResult {
            let mut draft = state.modify();
            modify(&mut draft.interfaces, |intfs| {
                intfs.modify_entry(&InterfaceId(1), |intf| {
                    let ip = "10.0.1.2".parse().unwrap();
                    intf.neighbors.insert(
                        ip,
                        NeighborEntry::reachable(
                            ip,
                            MacAddress::new([2, 0, 0, 0, 1, 2]),
                            PortDescriptor::Physical(PortId(1)),
                        ),
                    );
                    Ok(())
                })
            })?;
            Ok(Some(draft))
        })
        .wait()
        .await
        .unwrap();

    let reloaded = reload(&dump(&learned).unwrap()).unwrap();
    assert_eq!(*reloaded, *learned);
    assert_eq!(reloaded.interface(InterfaceId(1)).unwrap().neighbors.len(), 1);
}
