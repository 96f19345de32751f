//! # JESD204 Link Bring-Up
//!
//! This crate coordinates the ordered bring-up and teardown of JESD204 links that span several
//! devices: clock chips, a SYSREF distributor, RF transceivers or data converters and the
//! FPGA-side link layer.
//!
//! ## Architecture
//!
//! - **[`Jesd204`]**: the registry. Devices are registered with a [`HandlerTable`] and grouped
//!   into a [`Topology`] from explicit [`TopologyEntry`] descriptions.
//! - **[`HandlerTable`]**: the adapter contract. A device driver registers at most one handler
//!   per [`State`], either per device or per link, plus an optional SYSREF callback.
//! - **[`Jesd204::run`]**: walks all nine states in a fixed order for [`Reason::Init`] or
//!   [`Reason::Uninit`], and issues SYSREF pulses after the states that require one.
//! - **[`RegisterAccess`]** and **[`ClockControl`]**: the boundary to bus and clock hardware.
//!   The core never calls them; adapters capture them in their handlers.
//!
//! Lane rate, device clock and LMFC/LEMC arithmetic lives in [`jesd204_link`].
//!
//! ## Basic Usage
//!
//! ```
//! use jesd204_fsm::{HandlerTable, Jesd204, Reason, State, TopologyEntry};
//!
//! let mut reg = Jesd204::new();
//! let xcvr = reg.register_device(
//!     "xcvr",
//!     HandlerTable::builder()
//!         .per_link(State::LinkInit, |_ctx, _reason, link| {
//!             link.num_lanes = 4;
//!             Ok(())
//!         })
//!         .build(),
//! );
//! let clk = reg.register_device(
//!     "clk",
//!     HandlerTable::builder().sysref(|| Ok(())).build(),
//! );
//! let topo = reg.init_topology([
//!     TopologyEntry::new(xcvr).top().links([0, 1]),
//!     TopologyEntry::new(clk).sysref_provider(),
//! ])?;
//!
//! let report = reg.run(topo, Reason::Init)?;
//! assert_eq!(report.state(State::LinkInit).invocations, 2);
//! # Ok::<(), jesd204_fsm::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Handlers return a [`HandlerError`]. The first failing handler stops the run and is reported
//! as [`Error::HandlerFailure`] with the state, device and link it was invoked for. Nothing is
//! retried or rolled back; after a failed bring-up, run the state machine with
//! [`Reason::Uninit`].
//!
//! ## Configuration
//!
//! Adapters that poll for a condition while requesting SYSREF pulses use
//! [`poll::poll_with_sysref`] with a [`PollConfig`]:
//!
//! - **max_attempts**: upper bound of status checks (default: 255)
//! - **interval**: delay after every pulse (default: none)
//!
//! ## Logging
//!
//! This crate uses the `log` crate. State transitions are logged at `info`, every handler
//! invocation and SYSREF pulse at `debug`, failures at `error`.
//!
//! ## Thread Model
//!
//! Everything runs on the calling thread. [`Jesd204::run`] borrows the registry mutably, so
//! two runs on the same registry cannot overlap.
use std::io;

pub mod device;
pub mod error;
pub mod fsm;
pub mod poll;
pub mod state;
pub mod sysref;
pub mod topology;

pub use device::{Device, DeviceId, HandlerTable, Mode, OpContext, StateOp};
pub use error::{Error, HandlerError, HandlerFailure};
pub use fsm::{RunReport, StateReport};
pub use poll::Config as PollConfig;
pub use state::{Reason, State};
pub use topology::{Jesd204, TopLevelDevice, Topology, TopologyEntry, TopologyId};

/// Bus access to the registers of a chip (SPI, I2C or memory mapped).
///
/// Adapters capture an implementation and use it from their handlers.
pub trait RegisterAccess {
    fn read(&self, addr: u32) -> io::Result<u32>;

    fn write(&self, addr: u32, value: u32) -> io::Result<()>;

    /// Put the chip into its power-on state.
    fn reset(&self) -> io::Result<()>;
}

/// A programmable clock output.
pub trait ClockControl {
    /// The rate closest to `rate_hz` the clock can produce.
    fn round_rate(&self, rate_hz: u64) -> io::Result<u64>;

    /// Set the output to `rate_hz`. Callers pass a value returned by
    /// [`round_rate`](ClockControl::round_rate).
    fn set_rate(&self, rate_hz: u64) -> io::Result<()>;
}
