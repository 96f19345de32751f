use std::{error::Error as StdError, fmt::Display};

use jesd204_link::error::LinkError;

use crate::{DeviceId, State, TopologyId};

/// The error type returned by device handlers and SYSREF callbacks.
pub type HandlerError = Box<dyn StdError + Send + Sync>;

/// A handler failed while walking the state machine.
#[derive(Debug)]
pub struct HandlerFailure {
    pub state: State,
    pub device: DeviceId,
    pub device_name: String,
    /// The link the handler was invoked for, `None` for per-device handlers and SYSREF pulses.
    pub link_id: Option<u32>,
    pub cause: HandlerError,
}

impl Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.link_id {
            Some(link_id) => write!(
                f,
                "{} ({}) failed in state {} for Link{}: {}",
                self.device_name, self.device, self.state, link_id, self.cause
            ),
            None => write!(
                f,
                "{} ({}) failed in state {}: {}",
                self.device_name, self.device, self.state, self.cause
            ),
        }
    }
}

/// Errors that may occur when building topologies or walking the state machine.
#[derive(Debug)]
pub enum Error {
    NoTopDevice,
    MultipleTopDevices,
    DuplicateLinkId(u32),
    /// A non-top device refers to a link the top device did not declare.
    UnknownLinkId(u32),
    TooManySysrefProviders,
    /// A device was declared as SYSREF provider but registered no SYSREF callback.
    MissingSysrefCallback(DeviceId),
    UnknownDevice(DeviceId),
    UnknownTopology(TopologyId),
    /// The device is already a member of a topology.
    DeviceInUse(DeviceId),
    NotInTopology(DeviceId),
    Link(LinkError),
    HandlerFailure(HandlerFailure),
    /// A SYSREF provider failed outside of a state machine run.
    SysrefFailure { provider: DeviceId, cause: HandlerError },
}

impl From<LinkError> for Error {
    fn from(value: LinkError) -> Self {
        Error::Link(value)
    }
}

impl From<HandlerFailure> for Error {
    fn from(value: HandlerFailure) -> Self {
        Error::HandlerFailure(value)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoTopDevice => write!(f, "Topology has no top device"),
            Error::MultipleTopDevices => write!(f, "Topology has more than one top device"),
            Error::DuplicateLinkId(id) => write!(f, "Link{} is declared more than once", id),
            Error::UnknownLinkId(id) => {
                write!(f, "Link{} is not declared by the top device", id)
            }
            Error::TooManySysrefProviders => {
                write!(f, "At most two SYSREF providers are supported per topology")
            }
            Error::MissingSysrefCallback(dev) => {
                write!(f, "SYSREF provider {} has no SYSREF callback", dev)
            }
            Error::UnknownDevice(dev) => write!(f, "Unknown device {}", dev),
            Error::UnknownTopology(topo) => write!(f, "Unknown topology {}", topo),
            Error::DeviceInUse(dev) => write!(f, "Device {} is already part of a topology", dev),
            Error::NotInTopology(dev) => write!(f, "Device {} is not part of a topology", dev),
            Error::Link(err) => write!(f, "{}", err),
            Error::HandlerFailure(failure) => write!(f, "{}", failure),
            Error::SysrefFailure { provider, cause } => {
                write!(f, "SYSREF provider {} failed: {}", provider, cause)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Link(err) => Some(err),
            Error::HandlerFailure(failure) => Some(failure.cause.as_ref()),
            Error::SysrefFailure { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}
