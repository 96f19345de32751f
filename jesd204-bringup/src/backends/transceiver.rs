//! # RF Transceiver
//!
//! The top device of the simulated board: an RF transceiver whose framers and deframers terminate
//! every link. It publishes the link configuration, requests its device clock and performs
//! multichip synchronization (MCS), which completes only after a number of SYSREF pulses.
use std::{cell::Cell, rc::Rc};

use jesd204_fsm::{
    ClockControl, HandlerError, HandlerTable, OpContext, PollConfig, Reason, RegisterAccess, State,
    poll::poll_with_sysref,
};
use jesd204_link::{Link, copy_link_params, rate};

use crate::backends::sim::SysrefLine;

const REG_MCS_CTRL: u32 = 0x0100;
const REG_MCS_STATUS: u32 = 0x0101;
const REG_INIT_DONE: u32 = 0x0102;

const MCS_START: u32 = 0x01;
const MCS_DONE: u32 = 0x80;

/// Each link owns a block of framer registers.
const FRAMER_BASE: u32 = 0x1000;
const FRAMER_STRIDE: u32 = 0x100;
const FRAMER_CTRL: u32 = 0x00;
const FRAMER_LANES: u32 = 0x01;
const FRAMER_CONVERTERS: u32 = 0x02;
const FRAMER_OCTETS_PER_FRAME: u32 = 0x03;
const FRAMER_FRAMES_PER_MULTIFRAME: u32 = 0x04;

const FRAMER_ENABLE: u32 = 0x01;
const FRAMER_SCRAMBLE: u32 = 0x02;

fn framer_reg(link_id: u32, offset: u32) -> u32 {
    FRAMER_BASE + link_id * FRAMER_STRIDE + offset
}

pub struct Transceiver {
    regs: Rc<dyn RegisterAccess>,
    device_clock: Rc<dyn ClockControl>,
    line: Rc<SysrefLine>,
    /// Configuration published for every link.
    profile: Link,
    mcs: PollConfig,
    /// SYSREF pulses the simulated MCS needs before it locks.
    mcs_pulses: u32,
    device_clock_hz: Cell<u64>,
}

impl Transceiver {
    pub fn new(
        regs: Rc<dyn RegisterAccess>,
        device_clock: Rc<dyn ClockControl>,
        line: Rc<SysrefLine>,
        profile: Link,
        mcs: PollConfig,
        mcs_pulses: u32,
    ) -> Rc<Transceiver> {
        Rc::new(Transceiver {
            regs,
            device_clock,
            line,
            profile,
            mcs,
            mcs_pulses,
            device_clock_hz: Cell::new(0),
        })
    }

    fn link_init(&self, link: &mut Link) -> Result<(), HandlerError> {
        let mut params = self.profile.clone();
        params.link_id = link.link_id;
        params.validate()?;
        copy_link_params(link, &params);

        let clock = rate::device_clock_hz(link)?;
        match self.device_clock_hz.get() {
            0 => self.device_clock_hz.set(clock),
            current if current != clock => {
                return Err(format!(
                    "Link{} needs a device clock of {} Hz, other links use {} Hz",
                    link.link_id, clock, current
                )
                .into());
            }
            _ => {}
        }
        log::debug!(
            "Link{}: {} kHz lane rate, {} Hz device clock",
            link.link_id,
            rate::lane_rate_khz(link)?,
            clock
        );
        Ok(())
    }

    fn request_device_clock(&self) -> Result<(), HandlerError> {
        let wanted = self.device_clock_hz.get();
        if wanted == 0 {
            return Err("no link was initialized".into());
        }
        let rounded = self.device_clock.round_rate(wanted)?;
        if rounded != wanted {
            return Err(format!(
                "device clock {} Hz not supported (closest {} Hz)",
                wanted, rounded
            )
            .into());
        }
        self.device_clock.set_rate(rounded)?;
        Ok(())
    }

    fn multichip_sync(&self, ctx: &OpContext<'_>) -> Result<(), HandlerError> {
        self.regs.write(REG_MCS_CTRL, MCS_START)?;
        let start = self.line.pulses();
        let attempts = poll_with_sysref(ctx, &self.mcs, |_| {
            let seen = self.line.pulses().wrapping_sub(start);
            let status = if seen >= self.mcs_pulses { MCS_DONE } else { 0 };
            self.regs.write(REG_MCS_STATUS, status)?;
            Ok(self.regs.read(REG_MCS_STATUS)? & MCS_DONE != 0)
        })?;
        log::info!("{}: MCS locked after {} attempt(s)", ctx.name(), attempts);
        Ok(())
    }

    fn setup_framer(&self, link: &Link) -> Result<(), HandlerError> {
        let reg = |offset| framer_reg(link.link_id, offset);
        self.regs.write(reg(FRAMER_LANES), link.num_lanes.into())?;
        self.regs
            .write(reg(FRAMER_CONVERTERS), link.num_converters.into())?;
        self.regs
            .write(reg(FRAMER_OCTETS_PER_FRAME), link.octets_per_frame.into())?;
        self.regs.write(
            reg(FRAMER_FRAMES_PER_MULTIFRAME),
            link.frames_per_multiframe.into(),
        )?;
        let ctrl = if link.scrambling { FRAMER_SCRAMBLE } else { 0 };
        self.regs.write(reg(FRAMER_CTRL), ctrl)?;
        Ok(())
    }

    fn enable_framer(&self, link: &Link, enable: bool) -> Result<(), HandlerError> {
        let addr = framer_reg(link.link_id, FRAMER_CTRL);
        let ctrl = self.regs.read(addr)?;
        let ctrl = if enable {
            ctrl | FRAMER_ENABLE
        } else {
            ctrl & !FRAMER_ENABLE
        };
        self.regs.write(addr, ctrl)?;
        Ok(())
    }

    pub fn handlers(self: &Rc<Self>) -> HandlerTable {
        let init = Rc::clone(self);
        let pre_setup = Rc::clone(self);
        let mcs = Rc::clone(self);
        let post_mcs = Rc::clone(self);
        let setup = Rc::clone(self);
        let enable = Rc::clone(self);
        let running = Rc::clone(self);

        HandlerTable::builder()
            .per_link(State::LinkInit, move |_, reason, link| match reason {
                Reason::Init => init.link_init(link),
                Reason::Uninit => {
                    init.device_clock_hz.set(0);
                    Ok(())
                }
            })
            .per_device(State::LinkPreSetup, move |_, reason| match reason {
                Reason::Init => pre_setup.request_device_clock(),
                Reason::Uninit => Ok(pre_setup.regs.reset()?),
            })
            .per_device(State::OptSetupStage1, move |ctx, reason| match reason {
                Reason::Init => mcs.multichip_sync(ctx),
                Reason::Uninit => Ok(mcs.regs.write(REG_MCS_CTRL, 0)?),
            })
            .per_device(State::OptSetupStage2, move |_, reason| {
                let done = u32::from(reason == Reason::Init);
                post_mcs.regs.write(REG_INIT_DONE, done)?;
                Ok(())
            })
            .per_link(State::LinkSetup, move |_, reason, link| match reason {
                Reason::Init => setup.setup_framer(link),
                Reason::Uninit => Ok(()),
            })
            .per_link(State::LinkEnable, move |_, reason, link| {
                enable.enable_framer(link, reason == Reason::Init)
            })
            .per_link(State::LinkRunning, move |ctx, reason, link| {
                if reason == Reason::Uninit {
                    return Ok(());
                }
                let ctrl = running
                    .regs
                    .read(framer_reg(link.link_id, FRAMER_CTRL))?;
                if ctrl & FRAMER_ENABLE == 0 {
                    return Err(format!("Link{} framer is not enabled", link.link_id).into());
                }
                log::info!("{}: Link{} running", ctx.name(), link.link_id);
                Ok(())
            })
            .build()
    }
}
