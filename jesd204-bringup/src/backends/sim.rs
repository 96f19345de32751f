//! # Simulated Collaborators
//!
//! In-memory stand-ins for bus and clock hardware, so that a complete bring-up sequence can run
//! without a board attached.
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    io,
};

use jesd204_fsm::{ClockControl, RegisterAccess};

/// A register map backed by memory. Registers that were never written read as zero.
#[derive(Debug, Default)]
pub struct RegisterFile {
    name: String,
    regs: RefCell<BTreeMap<u32, u32>>,
    writes: Cell<usize>,
}

impl RegisterFile {
    pub fn new(name: impl Into<String>) -> RegisterFile {
        RegisterFile {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of writes since creation. Resets do not clear it.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    /// Peek at a register without going through [`RegisterAccess`].
    pub fn value(&self, addr: u32) -> u32 {
        self.regs.borrow().get(&addr).copied().unwrap_or(0)
    }
}

impl RegisterAccess for RegisterFile {
    fn read(&self, addr: u32) -> io::Result<u32> {
        let value = self.value(addr);
        log::trace!("{}: read 0x{:04x} -> 0x{:08x}", self.name, addr, value);
        Ok(value)
    }

    fn write(&self, addr: u32, value: u32) -> io::Result<()> {
        log::trace!("{}: write 0x{:04x} <- 0x{:08x}", self.name, addr, value);
        self.regs.borrow_mut().insert(addr, value);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn reset(&self) -> io::Result<()> {
        log::debug!("{}: reset", self.name);
        self.regs.borrow_mut().clear();
        Ok(())
    }
}

/// A clock output with a fixed frequency step and an upper limit.
#[derive(Debug)]
pub struct SimClock {
    name: String,
    step_hz: u64,
    max_hz: u64,
    rate: Cell<u64>,
}

impl SimClock {
    pub fn new(name: impl Into<String>, step_hz: u64, max_hz: u64) -> SimClock {
        SimClock {
            name: name.into(),
            step_hz: step_hz.max(1),
            max_hz,
            rate: Cell::new(0),
        }
    }

    /// The rate last set, zero while the clock is off.
    pub fn rate(&self) -> u64 {
        self.rate.get()
    }

    fn check_range(&self, rate_hz: u64) -> io::Result<()> {
        if rate_hz > self.max_hz {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{}: {} Hz exceeds the maximum of {} Hz",
                    self.name, rate_hz, self.max_hz
                ),
            ));
        }
        Ok(())
    }
}

impl ClockControl for SimClock {
    fn round_rate(&self, rate_hz: u64) -> io::Result<u64> {
        self.check_range(rate_hz)?;
        Ok(rate_hz / self.step_hz * self.step_hz)
    }

    fn set_rate(&self, rate_hz: u64) -> io::Result<()> {
        self.check_range(rate_hz)?;
        if rate_hz % self.step_hz != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{}: {} Hz is not a multiple of {} Hz",
                    self.name, rate_hz, self.step_hz
                ),
            ));
        }
        log::debug!("{}: rate set to {} Hz", self.name, rate_hz);
        self.rate.set(rate_hz);
        Ok(())
    }
}

/// The SYSREF net of the board. Counts every edge the distributor drives onto it.
#[derive(Debug, Default)]
pub struct SysrefLine {
    pulses: Cell<u32>,
}

impl SysrefLine {
    pub fn pulse(&self) {
        self.pulses.set(self.pulses.get().wrapping_add(1));
    }

    pub fn pulses(&self) -> u32 {
        self.pulses.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_file_reads_back() {
        let regs = RegisterFile::new("regs");
        assert_eq!(regs.read(0x10).unwrap(), 0);
        regs.write(0x10, 0xdead).unwrap();
        assert_eq!(regs.read(0x10).unwrap(), 0xdead);
        regs.reset().unwrap();
        assert_eq!(regs.read(0x10).unwrap(), 0);
        assert_eq!(regs.writes(), 1);
    }

    #[test]
    fn clock_rounds_down_to_step() {
        let clk = SimClock::new("clk", 1000, 1_000_000_000);
        assert_eq!(clk.round_rate(61_440_123).unwrap(), 61_440_000);
        assert!(clk.set_rate(61_440_123).is_err());
        clk.set_rate(61_440_000).unwrap();
        assert_eq!(clk.rate(), 61_440_000);
        assert!(clk.round_rate(2_000_000_000).is_err());
    }
}
