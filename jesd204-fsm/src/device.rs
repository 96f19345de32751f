//! # Device Adapter Contract
//!
//! Per-chip drivers take part in bring-up by registering a [`HandlerTable`]: at most one
//! handler per [`State`], each either called once per device ([`StateOp::PerDevice`]) or once
//! per link the device owns ([`StateOp::PerLink`]). A device that generates SYSREF additionally
//! registers a SYSREF callback.
//!
//! Handlers capture whatever private state the driver needs. They receive an [`OpContext`]
//! through which they may request SYSREF pulses; there is no global controller.
//!
//! ```
//! use jesd204_fsm::{HandlerTable, Reason, State};
//!
//! let table = HandlerTable::builder()
//!     .per_link(State::LinkInit, |_ctx, reason, link| {
//!         if reason == Reason::Init {
//!             link.num_lanes = 4;
//!         }
//!         Ok(())
//!     })
//!     .per_device(State::LinkSetup, |_ctx, _reason| Ok(()))
//!     .build();
//! assert!(table.op(State::LinkInit).is_some());
//! assert!(table.op(State::LinkRunning).is_none());
//! ```
use std::fmt::{Debug, Display};

use jesd204_link::Link;

use crate::{HandlerError, Reason, State, TopologyId, sysref::Dispatcher};

pub type HandlerResult = Result<(), HandlerError>;

/// A handler called once per device.
pub type DeviceOp = Box<dyn Fn(&OpContext<'_>, Reason) -> HandlerResult>;

/// A handler called once per link of a device.
pub type LinkOp = Box<dyn Fn(&OpContext<'_>, Reason, &mut Link) -> HandlerResult>;

/// Emits one SYSREF pulse (or burst).
pub type SysrefOp = Box<dyn Fn() -> HandlerResult>;

/// How often the handler of a state is invoked.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    PerDevice,
    PerLink,
}

pub enum StateOp {
    PerDevice(DeviceOp),
    PerLink(LinkOp),
}

impl StateOp {
    pub fn mode(&self) -> Mode {
        match self {
            StateOp::PerDevice(_) => Mode::PerDevice,
            StateOp::PerLink(_) => Mode::PerLink,
        }
    }
}

impl Debug for StateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.mode())
    }
}

/// The immutable set of handlers of a device.
///
/// Once built the table cannot be modified; registering it with
/// [`Jesd204::register_device`](crate::Jesd204::register_device) moves it into the registry.
#[derive(Default)]
pub struct HandlerTable {
    ops: [Option<StateOp>; State::COUNT],
    sysref: Option<SysrefOp>,
}

impl HandlerTable {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The handler registered for `state`, if any.
    pub fn op(&self, state: State) -> Option<&StateOp> {
        self.ops[state.index()].as_ref()
    }

    pub fn has_sysref(&self) -> bool {
        self.sysref.is_some()
    }

    pub(crate) fn sysref(&self) -> Option<&SysrefOp> {
        self.sysref.as_ref()
    }
}

impl Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for state in State::ALL {
            if let Some(op) = self.op(state) {
                map.entry(&state, op);
            }
        }
        if self.has_sysref() {
            map.entry(&"sysref", &true);
        }
        map.finish()
    }
}

/// Builder to create a [HandlerTable].
///
/// Registering a second handler for the same state replaces the first one.
#[derive(Default)]
pub struct Builder {
    table: HandlerTable,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Registers a handler that is called once per device in `state`.
    pub fn per_device(
        mut self,
        state: State,
        op: impl Fn(&OpContext<'_>, Reason) -> HandlerResult + 'static,
    ) -> Self {
        self.table.ops[state.index()] = Some(StateOp::PerDevice(Box::new(op)));
        self
    }

    /// Registers a handler that is called once per link owned by the device in `state`.
    pub fn per_link(
        mut self,
        state: State,
        op: impl Fn(&OpContext<'_>, Reason, &mut Link) -> HandlerResult + 'static,
    ) -> Self {
        self.table.ops[state.index()] = Some(StateOp::PerLink(Box::new(op)));
        self
    }

    /// Registers the callback used when this device acts as SYSREF provider.
    pub fn sysref(mut self, op: impl Fn() -> HandlerResult + 'static) -> Self {
        self.table.sysref = Some(Box::new(op));
        self
    }

    pub fn build(self) -> HandlerTable {
        self.table
    }
}

/// Handle of a registered device. Handles are never reused within a registry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DeviceId(pub(crate) usize);

impl DeviceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// A registered device.
#[derive(Debug)]
pub struct Device {
    name: String,
    handlers: HandlerTable,
    pub(crate) topology: Option<TopologyId>,
}

impl Device {
    pub(crate) fn new(name: String, handlers: HandlerTable) -> Device {
        Device {
            name,
            handlers,
            topology: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// The topology this device is a member of.
    pub fn topology(&self) -> Option<TopologyId> {
        self.topology
    }
}

/// Passed to every handler invocation.
pub struct OpContext<'a> {
    device: DeviceId,
    name: &'a str,
    state: State,
    dispatcher: Dispatcher<'a>,
}

impl<'a> OpContext<'a> {
    pub(crate) fn new(
        device: DeviceId,
        name: &'a str,
        state: State,
        dispatcher: Dispatcher<'a>,
    ) -> OpContext<'a> {
        OpContext {
            device,
            name,
            state,
            dispatcher,
        }
    }

    /// The device the handler is invoked for.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The state currently being processed.
    pub fn state(&self) -> State {
        self.state
    }

    /// Requests a pulse from the primary SYSREF provider of the topology.
    /// Succeeds without a pulse when the topology has no primary provider.
    pub fn sysref_async(&self) -> HandlerResult {
        self.dispatcher.pulse_from(self.name, false)
    }

    /// Requests a pulse from the primary SYSREF provider, falling back to the secondary one.
    /// Succeeds without a pulse when the topology has no provider at all.
    pub fn sysref_async_force(&self) -> HandlerResult {
        self.dispatcher.pulse_from(self.name, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_tags_modes() {
        let table = HandlerTable::builder()
            .per_device(State::LinkPreSetup, |_, _| Ok(()))
            .per_link(State::ClocksEnable, |_, _, _| Ok(()))
            .build();
        assert_eq!(
            table.op(State::LinkPreSetup).map(StateOp::mode),
            Some(Mode::PerDevice)
        );
        assert_eq!(
            table.op(State::ClocksEnable).map(StateOp::mode),
            Some(Mode::PerLink)
        );
        assert!(!table.has_sysref());
    }

    #[test]
    fn later_registration_replaces() {
        let table = HandlerTable::builder()
            .per_device(State::LinkSetup, |_, _| Ok(()))
            .per_link(State::LinkSetup, |_, _, _| Ok(()))
            .sysref(|| Ok(()))
            .build();
        assert_eq!(
            table.op(State::LinkSetup).map(StateOp::mode),
            Some(Mode::PerLink)
        );
        assert!(table.has_sysref());
        assert_eq!(
            format!("{:?}", table),
            "{LinkSetup: PerLink, \"sysref\": true}"
        );
    }
}
