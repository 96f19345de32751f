//! # Clock Distributor
//!
//! A clock chip that drives the device clocks and the SYSREF net of the board. It is the SYSREF
//! provider of the topology and derives the SYSREF frequency from the LMFC/LEMC of every link it
//! takes part in.
use std::{cell::RefCell, rc::Rc};

use jesd204_fsm::{ClockControl, HandlerTable, Reason, RegisterAccess, State};
use jesd204_link::{Link, rate};

use crate::backends::sim::SysrefLine;

const REG_PULSE_GEN: u32 = 0x0001;
const REG_OUTPUT_ENABLE: u32 = 0x0003;
const REG_SYSREF_TIMER: u32 = 0x005c;

const PULSE_GEN_REQUEST: u32 = 0x04;
const OUTPUT_ENABLE_ALL: u32 = 0x3f;

pub struct ClockDistributor {
    regs: Rc<dyn RegisterAccess>,
    sysref_clock: Rc<dyn ClockControl>,
    line: Rc<SysrefLine>,
    /// Links seen during pre-setup, ordered by link id.
    links: RefCell<Vec<Link>>,
}

impl ClockDistributor {
    pub fn new(
        regs: Rc<dyn RegisterAccess>,
        sysref_clock: Rc<dyn ClockControl>,
        line: Rc<SysrefLine>,
    ) -> Rc<ClockDistributor> {
        Rc::new(ClockDistributor {
            regs,
            sysref_clock,
            line,
            links: RefCell::default(),
        })
    }

    /// Recomputes the SYSREF frequency so that it divides the LMFC/LEMC of every known link.
    fn update_sysref_rate(&self, link: &Link) -> Result<u64, jesd204_fsm::HandlerError> {
        let mut links = self.links.borrow_mut();
        match links.binary_search_by_key(&link.link_id, |l| l.link_id) {
            Ok(pos) => links[pos] = link.clone(),
            Err(pos) => links.insert(pos, link.clone()),
        }
        let wanted = rate::sysref_rate_hz(links.iter())?;
        let rounded = self.sysref_clock.round_rate(wanted)?;
        if rounded != wanted {
            return Err(format!(
                "SYSREF rate {} Hz not supported (closest {} Hz)",
                wanted, rounded
            )
            .into());
        }
        self.sysref_clock.set_rate(rounded)?;
        self.regs
            .write(REG_SYSREF_TIMER, u32::try_from(rounded / 1000).unwrap_or(u32::MAX))?;
        Ok(rounded)
    }

    fn pulse(&self) -> Result<(), jesd204_fsm::HandlerError> {
        self.regs.write(REG_PULSE_GEN, PULSE_GEN_REQUEST)?;
        self.line.pulse();
        log::trace!("SYSREF pulse {}", self.line.pulses());
        Ok(())
    }

    pub fn handlers(self: &Rc<Self>) -> HandlerTable {
        let (pre_setup, clocks, sysref) = (Rc::clone(self), Rc::clone(self), Rc::clone(self));
        HandlerTable::builder()
            .per_link(State::LinkPreSetup, move |ctx, reason, link| {
                if reason == Reason::Uninit {
                    pre_setup
                        .links
                        .borrow_mut()
                        .retain(|l| l.link_id != link.link_id);
                    return Ok(());
                }
                let sysref_hz = pre_setup.update_sysref_rate(link)?;
                log::info!("{}: SYSREF at {} Hz after Link{}", ctx.name(), sysref_hz, link.link_id);
                Ok(())
            })
            .per_device(State::ClocksEnable, move |_, reason| {
                let outputs = match reason {
                    Reason::Init => OUTPUT_ENABLE_ALL,
                    Reason::Uninit => 0,
                };
                clocks.regs.write(REG_OUTPUT_ENABLE, outputs)?;
                Ok(())
            })
            .sysref(move || sysref.pulse())
            .build()
    }
}
