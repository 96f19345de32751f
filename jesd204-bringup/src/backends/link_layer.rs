//! # FPGA Link Layer
//!
//! The FPGA side of every link: a transceiver block that needs its lane clock and a link layer
//! core with one register window per link.
use std::rc::Rc;

use jesd204_fsm::{ClockControl, HandlerError, HandlerTable, Reason, RegisterAccess, State};
use jesd204_link::{Link, rate};

const WINDOW_STRIDE: u32 = 0x400;

const REG_LINK_DISABLE: u32 = 0xc0;
const REG_LINK_STATUS: u32 = 0x280;
const REG_LANES_DISABLE: u32 = 0x200;
const REG_LINK_CONF0: u32 = 0x210;

const LINK_STATUS_DATA: u32 = 0x3;

fn window(link_id: u32, offset: u32) -> u32 {
    link_id * WINDOW_STRIDE + offset
}

/// `(K * F - 1) << 8 | (F - 1)`, how the core expects the frame geometry.
fn link_conf0(link: &Link) -> u32 {
    let octets_per_multiframe =
        u32::from(link.frames_per_multiframe) * u32::from(link.octets_per_frame);
    (octets_per_multiframe.saturating_sub(1) << 8)
        | u32::from(link.octets_per_frame).saturating_sub(1)
}

/// One bit per physical lane, set for lanes this link does not use.
fn lanes_disable(link: &Link) -> u32 {
    link.physical_lanes()
        .filter(|&lane| lane < 32)
        .fold(u32::MAX, |mask, lane| mask & !(1 << lane))
}

pub struct LinkLayer {
    regs: Rc<dyn RegisterAccess>,
    lane_clock: Rc<dyn ClockControl>,
}

impl LinkLayer {
    pub fn new(regs: Rc<dyn RegisterAccess>, lane_clock: Rc<dyn ClockControl>) -> Rc<LinkLayer> {
        Rc::new(LinkLayer { regs, lane_clock })
    }

    fn enable_lane_clock(&self, link: &Link) -> Result<(), HandlerError> {
        let wanted = rate::lane_rate_khz(link)? * 1000;
        let rounded = self.lane_clock.round_rate(wanted)?;
        if rounded != wanted {
            log::warn!(
                "Link{}: lane clock {} Hz instead of {} Hz",
                link.link_id,
                rounded,
                wanted
            );
        }
        self.lane_clock.set_rate(rounded)?;
        Ok(())
    }

    fn setup(&self, link: &Link) -> Result<(), HandlerError> {
        let reg = |offset| window(link.link_id, offset);
        self.regs.write(reg(REG_LINK_DISABLE), 1)?;
        self.regs.write(reg(REG_LANES_DISABLE), lanes_disable(link))?;
        self.regs.write(reg(REG_LINK_CONF0), link_conf0(link))?;
        Ok(())
    }

    fn check_status(&self, link: &Link) -> Result<(), HandlerError> {
        if self.regs.read(window(link.link_id, REG_LINK_DISABLE))? != 0 {
            return Err(format!("Link{} is disabled", link.link_id).into());
        }
        // The simulated core reaches DATA as soon as it is enabled.
        self.regs
            .write(window(link.link_id, REG_LINK_STATUS), LINK_STATUS_DATA)?;
        let status = self.regs.read(window(link.link_id, REG_LINK_STATUS))?;
        if status != LINK_STATUS_DATA {
            return Err(format!("Link{} status 0x{:x}", link.link_id, status).into());
        }
        Ok(())
    }

    pub fn handlers(self: &Rc<Self>) -> HandlerTable {
        let clocks = Rc::clone(self);
        let setup = Rc::clone(self);
        let enable = Rc::clone(self);
        let running = Rc::clone(self);

        HandlerTable::builder()
            .per_link(State::ClocksEnable, move |_, reason, link| match reason {
                Reason::Init => clocks.enable_lane_clock(link),
                Reason::Uninit => Ok(()),
            })
            .per_link(State::LinkSetup, move |_, reason, link| match reason {
                Reason::Init => setup.setup(link),
                Reason::Uninit => Ok(()),
            })
            .per_link(State::LinkEnable, move |_, reason, link| {
                let disable = u32::from(reason == Reason::Uninit);
                enable
                    .regs
                    .write(window(link.link_id, REG_LINK_DISABLE), disable)?;
                Ok(())
            })
            .per_link(State::LinkRunning, move |_, reason, link| match reason {
                Reason::Init => running.check_status(link),
                Reason::Uninit => Ok(()),
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_geometry() {
        let link = Link {
            octets_per_frame: 4,
            frames_per_multiframe: 32,
            ..Link::default()
        };
        assert_eq!(link_conf0(&link), (127 << 8) | 3);
        assert_eq!(link_conf0(&Link::default()), 0);
    }

    #[test]
    fn lane_mask_follows_lane_table() {
        let mut link = Link {
            num_lanes: 2,
            ..Link::default()
        };
        assert_eq!(lanes_disable(&link), !0b11);
        link.lane_ids = vec![2, 5];
        assert_eq!(lanes_disable(&link), !0b10_0100);
    }

    #[test]
    fn windows_do_not_overlap() {
        assert_eq!(window(1, REG_LINK_DISABLE), 0x4c0);
        assert!(window(0, REG_LINK_STATUS) < window(1, 0));
    }
}
