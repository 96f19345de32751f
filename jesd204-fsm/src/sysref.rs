//! # SYSREF Dispatcher
//!
//! Routes SYSREF requests to the provider registered with the topology of the requesting device.
//! SYSREF is optional: a topology without a provider turns every request into a successful no-op.
use crate::{Device, DeviceId, Error, HandlerError, Jesd204, device::HandlerResult};

/// Providers of one topology, together with the device table to look their callbacks up in.
#[derive(Copy, Clone)]
pub(crate) struct Dispatcher<'a> {
    devices: &'a [Option<Device>],
    primary: Option<DeviceId>,
    secondary: Option<DeviceId>,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(
        devices: &'a [Option<Device>],
        primary: Option<DeviceId>,
        secondary: Option<DeviceId>,
    ) -> Dispatcher<'a> {
        Dispatcher {
            devices,
            primary,
            secondary,
        }
    }

    /// The provider that serves a request. Only forced requests fall back to the secondary.
    pub(crate) fn provider(&self, force: bool) -> Option<DeviceId> {
        match (self.primary, force) {
            (Some(primary), _) => Some(primary),
            (None, true) => self.secondary,
            (None, false) => None,
        }
    }

    /// Issues one pulse. Returns the provider that was used, or `None` for a no-op.
    pub(crate) fn pulse(&self, force: bool) -> Result<Option<DeviceId>, (DeviceId, HandlerError)> {
        let Some(provider) = self.provider(force) else {
            log::debug!("No SYSREF provider registered, skipping pulse");
            return Ok(None);
        };
        let callback = self
            .devices
            .get(provider.index())
            .and_then(Option::as_ref)
            .and_then(|device| device.handlers().sysref());
        match callback {
            Some(callback) => {
                log::debug!("Requesting SYSREF pulse from {}", provider);
                callback().map_err(|cause| (provider, cause))?;
                Ok(Some(provider))
            }
            None => Err((provider, "SYSREF provider has no callback".into())),
        }
    }

    /// Issues one pulse on behalf of a handler.
    pub(crate) fn pulse_from(&self, requester: &str, force: bool) -> HandlerResult {
        match self.pulse(force) {
            Ok(_) => Ok(()),
            Err((provider, cause)) => {
                log::error!(
                    "SYSREF pulse requested by {} failed at {}: {}",
                    requester,
                    provider,
                    cause
                );
                Err(format!("SYSREF provider {} failed: {}", provider, cause).into())
            }
        }
    }
}

impl Jesd204 {
    fn dispatcher_for(&self, device: DeviceId) -> Result<Dispatcher<'_>, Error> {
        let top = self.get_topology_top(device)?;
        Ok(Dispatcher::new(
            &self.devices,
            top.sysref_primary(),
            top.sysref_secondary(),
        ))
    }

    /// Requests a SYSREF pulse from the primary provider of the topology `device` belongs to.
    ///
    /// Succeeds without a pulse if the topology has no primary provider.
    pub fn sysref_async(&self, device: DeviceId) -> Result<(), Error> {
        self.dispatcher_for(device)?
            .pulse(false)
            .map(|_| ())
            .map_err(|(provider, cause)| Error::SysrefFailure { provider, cause })
    }

    /// Like [`Jesd204::sysref_async`], but falls back to the secondary provider when there is
    /// no primary one. Succeeds without a pulse if neither exists.
    pub fn sysref_async_force(&self, device: DeviceId) -> Result<(), Error> {
        self.dispatcher_for(device)?
            .pulse(true)
            .map(|_| ())
            .map_err(|(provider, cause)| Error::SysrefFailure { provider, cause })
    }
}
