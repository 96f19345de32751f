//! # State-Machine Orchestrator
//!
//! [`Jesd204::run`] walks every [`State`] in order and invokes the handlers registered by the
//! member devices of a topology:
//!
//! 1. devices are visited in registration order, links in ascending `link_id` order;
//! 2. states without a handler for a device are skipped;
//! 3. the first failing handler stops the walk, later devices, links and states are not visited;
//! 4. once every handler of a SYSREF state succeeded, exactly one SYSREF pulse is issued.
//!
//! The orchestrator never retries and never rolls back. After a failed [`Reason::Init`] the
//! caller walks the state machine again with [`Reason::Uninit`] to release partial state.
use std::fmt::Display;

use crate::{
    Device, DeviceId, Error, HandlerError, HandlerFailure, Jesd204, OpContext, Reason, State,
    StateOp, TopologyId, sysref::Dispatcher,
};

/// What happened in one state during a run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StateReport {
    pub invocations: usize,
    /// The provider that received the post-state SYSREF pulse, if one was issued.
    pub sysref_pulse: Option<DeviceId>,
    /// Whether a post-state pulse was requested (it may have been a no-op without provider).
    pub sysref_requested: bool,
}

/// Summary of a successful run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    pub reason: Reason,
    pub states: [StateReport; State::COUNT],
}

impl RunReport {
    fn new(reason: Reason) -> RunReport {
        RunReport {
            reason,
            states: Default::default(),
        }
    }

    pub fn state(&self, state: State) -> &StateReport {
        &self.states[state.index()]
    }

    /// Total handler invocations over all states.
    pub fn invocations(&self) -> usize {
        self.states.iter().map(|s| s.invocations).sum()
    }

    /// Number of post-state SYSREF pulses that reached a provider.
    pub fn sysref_pulses(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.sysref_pulse.is_some())
            .count()
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<24} {:>8}  sysref", self.reason, "handlers")?;
        for state in State::ALL {
            let report = self.state(state);
            let sysref = match (report.sysref_pulse, report.sysref_requested) {
                (Some(provider), _) => provider.to_string(),
                (None, true) => "none".to_string(),
                (None, false) => "-".to_string(),
            };
            writeln!(f, "{:<24} {:>8}  {}", state, report.invocations, sysref)?;
        }
        Ok(())
    }
}

fn failure(
    state: State,
    device: DeviceId,
    name: &str,
    link_id: Option<u32>,
    cause: HandlerError,
) -> Error {
    let failure = HandlerFailure {
        state,
        device,
        device_name: name.to_string(),
        link_id,
        cause,
    };
    log::error!("{}", failure);
    Error::HandlerFailure(failure)
}

impl Jesd204 {
    /// Walks all states of the topology for `reason`.
    ///
    /// Blocks until every handler returned or the first one failed. The failing handler is
    /// reported with its state, device and link.
    pub fn run(&mut self, topology: TopologyId, reason: Reason) -> Result<RunReport, Error> {
        let Jesd204 {
            devices,
            topologies,
        } = self;
        let devices: &[Option<Device>] = devices;
        let topology_ref = topologies
            .get_mut(topology.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownTopology(topology))?;
        let dispatcher = Dispatcher::new(
            devices,
            topology_ref.top.sysref_primary(),
            topology_ref.top.sysref_secondary(),
        );

        log::info!("Running {} on {}", reason, topology);
        let mut report = RunReport::new(reason);

        for state in State::ALL {
            log::info!("{}: entering {}", topology, state);
            let state_report = &mut report.states[state.index()];

            for member in &topology_ref.members {
                let device = devices
                    .get(member.device.index())
                    .and_then(Option::as_ref)
                    .ok_or(Error::UnknownDevice(member.device))?;
                let Some(op) = device.handlers().op(state) else {
                    continue;
                };
                let ctx = OpContext::new(member.device, device.name(), state, dispatcher);

                match op {
                    StateOp::PerDevice(handler) => {
                        log::debug!("{}: {} {} ({})", state, device.name(), reason, member.device);
                        state_report.invocations += 1;
                        handler(&ctx, reason).map_err(|cause| {
                            failure(state, member.device, device.name(), None, cause)
                        })?;
                    }
                    StateOp::PerLink(handler) => {
                        for &link_id in &member.link_ids {
                            let link = topology_ref
                                .top
                                .link_mut(link_id)
                                .ok_or(Error::UnknownLinkId(link_id))?;
                            log::debug!(
                                "{}: {} Link{} {} ({})",
                                state,
                                device.name(),
                                link_id,
                                reason,
                                member.device
                            );
                            state_report.invocations += 1;
                            let fail = |cause: HandlerError| {
                                failure(state, member.device, device.name(), Some(link_id), cause)
                            };

                            if state == State::LinkInit {
                                handler(&ctx, reason, link).map_err(fail)?;
                                if link.link_id != link_id {
                                    link.link_id = link_id;
                                    return Err(fail(
                                        format!("link id changed to {}", link.link_id).into(),
                                    ));
                                }
                            } else {
                                let mut scratch = link.clone();
                                handler(&ctx, reason, &mut scratch).map_err(fail)?;
                                if scratch != *link {
                                    log::warn!(
                                        "{}: {} modified Link{} after {}, changes discarded",
                                        state,
                                        device.name(),
                                        link_id,
                                        State::LinkInit
                                    );
                                }
                            }
                        }
                    }
                }
            }

            if state.post_state_sysref() && state_report.invocations > 0 {
                state_report.sysref_requested = true;
                state_report.sysref_pulse = dispatcher.pulse(false).map_err(|(provider, cause)| {
                    let name = devices
                        .get(provider.index())
                        .and_then(Option::as_ref)
                        .map_or("<unregistered>", Device::name);
                    failure(state, provider, name, None, cause)
                })?;
            }
        }

        log::info!(
            "{} of {} complete: {} handler call(s), {} SYSREF pulse(s)",
            reason,
            topology,
            report.invocations(),
            report.sysref_pulses()
        );
        Ok(report)
    }
}
