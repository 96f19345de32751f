use jesd204_fsm::{Error, HandlerTable, Jesd204, Reason, State, TopologyEntry};
use jesd204_tests::Recorder;

const FLAGGED: [State; 4] = [
    State::OptSetupStage1,
    State::OptSetupStage2,
    State::LinkSetup,
    State::LinkEnable,
];

#[test]
fn one_pulse_per_flagged_state() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device("top", recorder.device("top").all_states_per_link().build());
    let peer = reg.register_device("peer", recorder.device("peer").all_states_per_link().build());
    let clk = reg.register_device("clk", recorder.device("clk").sysref_provider().build());
    let topology = reg
        .init_topology([
            TopologyEntry::new(top).top().links([0, 1]),
            TopologyEntry::new(peer).links([1]),
            TopologyEntry::new(clk).sysref_provider(),
        ])
        .unwrap();

    let report = reg.run(topology, Reason::Init).unwrap();
    assert_eq!(recorder.pulses(), FLAGGED.map(Some).to_vec());
    assert_eq!(report.sysref_pulses(), 4);
    for state in State::ALL {
        let expected = FLAGGED.contains(&state).then_some(clk);
        assert_eq!(report.state(state).sysref_pulse, expected);
    }
}

#[test]
fn pulse_only_where_handlers_ran() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device(
        "top",
        recorder
            .device("top")
            .per_device([State::OptSetupStage2, State::LinkRunning])
            .build(),
    );
    let clk = reg.register_device("clk", recorder.device("clk").sysref_provider().build());
    let topology = reg
        .init_topology([
            TopologyEntry::new(top).top().links([0]),
            TopologyEntry::new(clk).sysref_provider(),
        ])
        .unwrap();

    reg.run(topology, Reason::Init).unwrap();
    assert_eq!(recorder.pulses(), vec![Some(State::OptSetupStage2)]);
}

#[test]
fn missing_provider_is_not_an_error() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device("top", recorder.device("top").all_states_per_link().build());
    let topology = reg
        .init_topology([TopologyEntry::new(top).top().links([0])])
        .unwrap();

    let report = reg.run(topology, Reason::Init).unwrap();
    assert!(recorder.pulses().is_empty());
    assert_eq!(report.sysref_pulses(), 0);
    assert!(report.state(State::LinkSetup).sysref_requested);
}

#[test]
fn force_prefers_primary() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device("top", HandlerTable::default());
    let primary = reg.register_device("primary", recorder.device("primary").sysref_provider().build());
    let secondary = reg.register_device(
        "secondary",
        recorder.device("secondary").sysref_provider().build(),
    );

    // With both providers, force still uses the primary.
    let topology = reg
        .init_topology([
            TopologyEntry::new(top).top().links([0]),
            TopologyEntry::new(primary).sysref_provider(),
            TopologyEntry::new(secondary).sysref_provider(),
        ])
        .unwrap();
    reg.sysref_async(top).unwrap();
    reg.sysref_async_force(top).unwrap();
    let devices: Vec<_> = recorder
        .events()
        .into_iter()
        .map(|event| match event {
            jesd204_tests::Event::Sysref { device, .. } => device,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(devices, vec!["primary", "primary"]);
    reg.teardown(topology).unwrap();
}

#[test]
fn single_provider_is_primary() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let only = reg.register_device("only", recorder.device("only").sysref_provider().build());
    let topology = reg
        .init_topology([TopologyEntry::new(only).top().links([0]).sysref_provider()])
        .unwrap();

    // A single provider is the primary one, so both requests reach it.
    reg.sysref_async(only).unwrap();
    reg.sysref_async_force(only).unwrap();
    assert_eq!(recorder.pulses().len(), 2);
    assert_eq!(
        reg.topology(topology).unwrap().top().sysref_primary(),
        Some(only)
    );
    assert_eq!(reg.topology(topology).unwrap().top().sysref_secondary(), None);
}

#[test]
fn failing_provider_aborts_run() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device("top", recorder.device("top").all_states_per_link().build());
    let clk = reg.register_device("clk", recorder.device("clk").failing_sysref_provider().build());
    let topology = reg
        .init_topology([
            TopologyEntry::new(top).top().links([0]),
            TopologyEntry::new(clk).sysref_provider(),
        ])
        .unwrap();

    match reg.run(topology, Reason::Init) {
        Err(Error::HandlerFailure(failure)) => {
            assert_eq!(failure.state, State::OptSetupStage1);
            assert_eq!(failure.device, clk);
            assert_eq!(failure.link_id, None);
        }
        other => panic!("expected HandlerFailure, got {:?}", other),
    }
    let last = recorder.calls().last().cloned();
    assert_eq!(last, Some((State::OptSetupStage1, "top".to_string(), Some(0))));
}

#[test]
fn provider_rules() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device("top", HandlerTable::default());
    let mute = reg.register_device("mute", HandlerTable::default());
    assert!(matches!(
        reg.init_topology([
            TopologyEntry::new(top).top().links([0]),
            TopologyEntry::new(mute).sysref_provider(),
        ]),
        Err(Error::MissingSysrefCallback(dev)) if dev == mute
    ));

    let clocks: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| reg.register_device(*name, recorder.device(name).sysref_provider().build()))
        .collect();
    let mut entries = vec![TopologyEntry::new(top).top().links([0])];
    entries.extend(clocks.iter().map(|&c| TopologyEntry::new(c).sysref_provider()));
    assert!(matches!(
        reg.init_topology(entries),
        Err(Error::TooManySysrefProviders)
    ));
}
