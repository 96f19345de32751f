//! # Topology Model
//!
//! A [`Jesd204`] registry owns every registered device and every topology built from them.
//! Devices and topologies refer to each other through [`DeviceId`] and [`TopologyId`]
//! handles, so tearing a topology down can never leave a device pointing at freed links.
use std::{collections::HashSet, fmt::Display};

use jesd204_link::Link;

use crate::{Device, DeviceId, Error, HandlerTable};

/// Handle of a topology within a [`Jesd204`] registry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TopologyId(pub(crate) usize);

impl Display for TopologyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "topology{}", self.0)
    }
}

/// Describes how a device takes part in a topology.
///
/// ```
/// use jesd204_fsm::{HandlerTable, Jesd204, TopologyEntry};
///
/// let mut jesd = Jesd204::new();
/// let clock = jesd.register_device("hmc7044", HandlerTable::builder().sysref(|| Ok(())).build());
/// let xcvr = jesd.register_device("adrv9025", HandlerTable::default());
/// let topology = jesd
///     .init_topology([
///         TopologyEntry::new(xcvr).top().links([0, 1]),
///         TopologyEntry::new(clock).sysref_provider(),
///     ])
///     .unwrap();
/// assert_eq!(jesd.topology(topology).unwrap().top().links().len(), 2);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TopologyEntry {
    pub device: DeviceId,
    pub is_top: bool,
    /// For the top device: the links of the topology, in declaration order.
    /// For any other device: the links it takes part in.
    pub link_ids: Vec<u32>,
    pub is_sysref_provider: bool,
}

impl TopologyEntry {
    pub fn new(device: DeviceId) -> TopologyEntry {
        TopologyEntry {
            device,
            is_top: false,
            link_ids: Vec::new(),
            is_sysref_provider: false,
        }
    }

    /// Marks the device as top device of the topology.
    pub fn top(mut self) -> Self {
        self.is_top = true;
        self
    }

    pub fn links(mut self, link_ids: impl IntoIterator<Item = u32>) -> Self {
        self.link_ids = link_ids.into_iter().collect();
        self
    }

    pub fn sysref_provider(mut self) -> Self {
        self.is_sysref_provider = true;
        self
    }
}

/// The device that owns the links of a topology.
#[derive(Debug)]
pub struct TopLevelDevice {
    device: DeviceId,
    links: Vec<Link>,
    sysref_primary: Option<DeviceId>,
    sysref_secondary: Option<DeviceId>,
}

impl TopLevelDevice {
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// The links of the topology, in declaration order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, link_id: u32) -> Option<&Link> {
        self.links.iter().find(|link| link.link_id == link_id)
    }

    pub(crate) fn link_mut(&mut self, link_id: u32) -> Option<&mut Link> {
        self.links.iter_mut().find(|link| link.link_id == link_id)
    }

    pub fn sysref_primary(&self) -> Option<DeviceId> {
        self.sysref_primary
    }

    pub fn sysref_secondary(&self) -> Option<DeviceId> {
        self.sysref_secondary
    }
}

/// A device taking part in a topology, with the links it owns in ascending order.
#[derive(Debug)]
pub(crate) struct Member {
    pub(crate) device: DeviceId,
    pub(crate) link_ids: Vec<u32>,
}

#[derive(Debug)]
pub struct Topology {
    pub(crate) top: TopLevelDevice,
    /// Sorted by device registration order.
    pub(crate) members: Vec<Member>,
}

impl Topology {
    pub fn top(&self) -> &TopLevelDevice {
        &self.top
    }

    /// Member devices in registration order.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.members.iter().map(|member| member.device)
    }

    /// The links `device` takes part in, in ascending order.
    pub fn links_of(&self, device: DeviceId) -> Option<&[u32]> {
        self.members
            .iter()
            .find(|member| member.device == device)
            .map(|member| member.link_ids.as_slice())
    }
}

/// Registry of devices and the topologies built from them.
///
/// There is no global instance: each board (or each independent set of links) owns its own
/// registry and passes it around explicitly.
#[derive(Debug, Default)]
pub struct Jesd204 {
    pub(crate) devices: Vec<Option<Device>>,
    pub(crate) topologies: Vec<Option<Topology>>,
}

impl Jesd204 {
    pub fn new() -> Jesd204 {
        Jesd204::default()
    }

    /// Registers a device. The handler table cannot be changed afterwards.
    pub fn register_device(&mut self, name: impl Into<String>, handlers: HandlerTable) -> DeviceId {
        let id = DeviceId(self.devices.len());
        let name = name.into();
        log::debug!("Registered {} as {} ({:?})", name, id, handlers);
        self.devices.push(Some(Device::new(name, handlers)));
        id
    }

    /// Removes a device from the registry. Fails while the device is part of a topology.
    pub fn unregister_device(&mut self, id: DeviceId) -> Result<Device, Error> {
        let slot = self
            .devices
            .get_mut(id.0)
            .ok_or(Error::UnknownDevice(id))?;
        match slot.as_ref().map(|device| device.topology.is_some()) {
            None => Err(Error::UnknownDevice(id)),
            Some(true) => Err(Error::DeviceInUse(id)),
            Some(false) => slot.take().ok_or(Error::UnknownDevice(id)),
        }
    }

    pub fn device(&self, id: DeviceId) -> Result<&Device, Error> {
        self.devices
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownDevice(id))
    }

    pub fn topology(&self, id: TopologyId) -> Result<&Topology, Error> {
        self.topologies
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownTopology(id))
    }

    /// Builds a topology from an explicit list of entries.
    ///
    /// Exactly one entry must be the top device; it declares the links, which are allocated
    /// zeroed. The first SYSREF provider becomes the primary provider, the second one the
    /// secondary. On error the registry is left unchanged.
    pub fn init_topology(
        &mut self,
        entries: impl IntoIterator<Item = TopologyEntry>,
    ) -> Result<TopologyId, Error> {
        let entries: Vec<TopologyEntry> = entries.into_iter().collect();

        let mut tops = entries.iter().filter(|entry| entry.is_top);
        let top = match (tops.next(), tops.next()) {
            (None, _) => return Err(Error::NoTopDevice),
            (Some(top), None) => top,
            (Some(_), Some(_)) => return Err(Error::MultipleTopDevices),
        };

        let mut seen_devices = HashSet::new();
        for entry in &entries {
            let device = self.device(entry.device)?;
            if device.topology.is_some() || !seen_devices.insert(entry.device) {
                return Err(Error::DeviceInUse(entry.device));
            }
        }

        let mut declared = HashSet::new();
        for &link_id in &top.link_ids {
            if !declared.insert(link_id) {
                return Err(Error::DuplicateLinkId(link_id));
            }
        }

        let mut members = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut link_ids = entry.link_ids.clone();
            link_ids.sort_unstable();
            if let Some(pair) = link_ids.windows(2).find(|pair| pair[0] == pair[1]) {
                return Err(Error::DuplicateLinkId(pair[0]));
            }
            if let Some(&unknown) = link_ids.iter().find(|id| !declared.contains(*id)) {
                return Err(Error::UnknownLinkId(unknown));
            }
            members.push(Member {
                device: entry.device,
                link_ids,
            });
        }
        members.sort_by_key(|member| member.device);

        let mut providers = entries.iter().filter(|entry| entry.is_sysref_provider);
        let sysref_primary = providers.next().map(|entry| entry.device);
        let sysref_secondary = providers.next().map(|entry| entry.device);
        if providers.next().is_some() {
            return Err(Error::TooManySysrefProviders);
        }
        for provider in sysref_primary.iter().chain(sysref_secondary.iter()) {
            if !self.device(*provider)?.handlers().has_sysref() {
                return Err(Error::MissingSysrefCallback(*provider));
            }
        }

        let id = TopologyId(self.topologies.len());
        for member in &members {
            if let Some(device) = self.devices[member.device.0].as_mut() {
                device.topology = Some(id);
            }
        }
        let top = TopLevelDevice {
            device: top.device,
            links: top.link_ids.iter().copied().map(Link::new).collect(),
            sysref_primary,
            sysref_secondary,
        };
        log::info!(
            "Created {} with top device {}, {} link(s), {} member(s)",
            id,
            top.device,
            top.links.len(),
            members.len()
        );
        self.topologies.push(Some(Topology { top, members }));
        Ok(id)
    }

    /// Returns the top device of the topology `device` belongs to.
    pub fn get_topology_top(&self, device: DeviceId) -> Result<&TopLevelDevice, Error> {
        let topology = self
            .device(device)?
            .topology
            .ok_or(Error::NotInTopology(device))?;
        Ok(self.topology(topology)?.top())
    }

    /// Releases a topology and its links. Member devices stay registered and may join another
    /// topology.
    pub fn teardown(&mut self, id: TopologyId) -> Result<(), Error> {
        let topology = self
            .topologies
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(Error::UnknownTopology(id))?;
        for member in &topology.members {
            if let Some(device) = self.devices.get_mut(member.device.0).and_then(Option::as_mut) {
                device.topology = None;
            }
        }
        log::info!("Released {}", id);
        Ok(())
    }
}
