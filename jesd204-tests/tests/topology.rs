use jesd204_fsm::{Error, HandlerTable, Jesd204, TopologyEntry};

fn devices(reg: &mut Jesd204, count: usize) -> Vec<jesd204_fsm::DeviceId> {
    (0..count)
        .map(|i| reg.register_device(format!("dev{}", i), HandlerTable::default()))
        .collect()
}

#[test]
fn exactly_one_top_device() {
    let mut reg = Jesd204::new();
    let dev = devices(&mut reg, 2);

    assert!(matches!(
        reg.init_topology([TopologyEntry::new(dev[0]), TopologyEntry::new(dev[1])]),
        Err(Error::NoTopDevice)
    ));
    assert!(matches!(
        reg.init_topology([
            TopologyEntry::new(dev[0]).top().links([0]),
            TopologyEntry::new(dev[1]).top().links([1]),
        ]),
        Err(Error::MultipleTopDevices)
    ));
    // Rejected topologies leave the devices free.
    assert!(reg.device(dev[0]).unwrap().topology().is_none());
}

#[test]
fn link_ids_are_validated() {
    let mut reg = Jesd204::new();
    let dev = devices(&mut reg, 2);

    assert!(matches!(
        reg.init_topology([TopologyEntry::new(dev[0]).top().links([0, 3, 0])]),
        Err(Error::DuplicateLinkId(0))
    ));
    assert!(matches!(
        reg.init_topology([
            TopologyEntry::new(dev[0]).top().links([0, 1]),
            TopologyEntry::new(dev[1]).links([1, 2]),
        ]),
        Err(Error::UnknownLinkId(2))
    ));
}

#[test]
fn links_start_zeroed() {
    let mut reg = Jesd204::new();
    let dev = devices(&mut reg, 1);
    let topology = reg
        .init_topology([TopologyEntry::new(dev[0]).top().links([4, 2])])
        .unwrap();

    let top = reg.topology(topology).unwrap().top();
    assert_eq!(top.device(), dev[0]);
    let ids: Vec<_> = top.links().iter().map(|l| l.link_id).collect();
    assert_eq!(ids, vec![4, 2]);
    assert!(top.links().iter().all(|l| l.num_lanes == 0 && l.sample_rate == 0));
}

#[test]
fn membership_lifecycle() {
    let mut reg = Jesd204::new();
    let dev = devices(&mut reg, 2);
    let topology = reg
        .init_topology([
            TopologyEntry::new(dev[0]).top().links([0]),
            TopologyEntry::new(dev[1]).links([0]),
        ])
        .unwrap();

    assert_eq!(reg.get_topology_top(dev[1]).unwrap().device(), dev[0]);
    assert!(matches!(
        reg.init_topology([TopologyEntry::new(dev[1]).top().links([0])]),
        Err(Error::DeviceInUse(d)) if d == dev[1]
    ));
    assert!(matches!(
        reg.unregister_device(dev[1]),
        Err(Error::DeviceInUse(_))
    ));

    reg.teardown(topology).unwrap();
    assert!(matches!(
        reg.get_topology_top(dev[1]),
        Err(Error::NotInTopology(_))
    ));
    let removed = reg.unregister_device(dev[1]).unwrap();
    assert_eq!(removed.name(), "dev1");
    assert!(matches!(
        reg.device(dev[1]),
        Err(Error::UnknownDevice(_))
    ));
    assert!(matches!(
        reg.teardown(topology),
        Err(Error::UnknownTopology(_))
    ));
}
