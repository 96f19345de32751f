use jesd204_fsm::{Jesd204, Reason, State, TopologyEntry};
use jesd204_link::{Encoder, Version, rate};
use jesd204_tests::Recorder;

#[test]
fn jesd204c_64b66b_board() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device(
        "transceiver",
        recorder
            .device("transceiver")
            .all_states_per_link()
            .link_params(|link| {
                link.num_lanes = if link.link_id == 0 { 4 } else { 2 };
                link.num_converters = 4;
                link.bits_per_sample = 16;
                link.sample_rate = 245_760_000;
                link.jesd_version = Version::C;
                link.jesd_encoder = Encoder::Enc64b66b;
            })
            .build(),
    );
    let clk = reg.register_device(
        "clock",
        recorder
            .device("clock")
            .per_device([State::LinkPreSetup])
            .sysref_provider()
            .build(),
    );
    let topology = reg
        .init_topology([
            TopologyEntry::new(top).top().links([0, 1]),
            TopologyEntry::new(clk).sysref_provider(),
        ])
        .unwrap();

    let report = reg.run(topology, Reason::Init).unwrap();

    let top_device = reg.topology(topology).unwrap().top();
    let link0 = top_device.link(0).unwrap();
    let link1 = top_device.link(1).unwrap();
    assert_eq!(rate::lane_rate_hz(link0).unwrap(), 4_055_040_000);
    assert_eq!(rate::lane_rate_hz(link1).unwrap(), 8_110_080_000);
    assert_eq!(rate::lane_rate_khz(link1).unwrap(), 8_110_080);
    assert_eq!(rate::device_clock_hz(link0).unwrap(), 61_440_000);

    let flagged: Vec<_> = State::ALL
        .into_iter()
        .filter(|state| state.post_state_sysref())
        .map(Some)
        .collect();
    assert_eq!(recorder.pulses(), flagged);
    assert_eq!(report.sysref_pulses(), 4);
    assert_eq!(report.invocations(), 9 * 2 + 1);
}

#[test]
fn teardown_after_bring_up() {
    let recorder = Recorder::new();
    let mut reg = Jesd204::new();
    let top = reg.register_device("top", recorder.device("top").all_states_per_link().build());
    let clk = reg.register_device("clk", recorder.device("clk").sysref_provider().build());
    let topology = reg
        .init_topology([
            TopologyEntry::new(top).top().links([0]),
            TopologyEntry::new(clk).sysref_provider(),
        ])
        .unwrap();

    reg.run(topology, Reason::Init).unwrap();
    recorder.clear();
    let report = reg.run(topology, Reason::Uninit).unwrap();
    assert_eq!(report.sysref_pulses(), 4);
    assert_eq!(recorder.pulses().len(), 4);

    reg.teardown(topology).unwrap();
    reg.unregister_device(clk).unwrap();
    reg.unregister_device(top).unwrap();
}
