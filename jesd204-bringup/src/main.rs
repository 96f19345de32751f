//! # JESD204 Bring-Up Tool
//!
//! Computes the derived rates of a JESD204 link and runs the complete bring-up sequence on a
//! simulated board.
//!
//! ## Overview
//!
//! The simulated board consists of a clock distributor (SYSREF provider), an RF transceiver
//! (top device, performs multichip synchronization) and an FPGA link layer. Every device is backed
//! by the in-memory collaborators in [`backends::sim`].
pub mod backends;

use std::error::Error;
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};
use clap_num::si_number;
use env_logger::Env;
use jesd204_fsm::{Jesd204, PollConfig, Reason, TopologyEntry, TopologyId};
use jesd204_link::{Encoder, Link, Version, rate};

use crate::backends::{
    clock_distributor::ClockDistributor,
    link_layer::LinkLayer,
    sim::{RegisterFile, SimClock, SysrefLine},
    transceiver::Transceiver,
};

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum VersionArg {
    A,
    B,
    C,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum EncoderArg {
    #[value(name = "8b10b")]
    Enc8b10b,
    #[value(name = "64b66b")]
    Enc64b66b,
    #[value(name = "64b80b")]
    Enc64b80b,
}

#[derive(clap::Args, Clone, Debug)]
struct LinkArgs {
    #[arg(short = 'L', long, default_value = "4", help = "Lanes per link (L)")]
    lanes: u8,

    #[arg(short = 'M', long, default_value = "4", help = "Converters per link (M)")]
    converters: u8,

    #[arg(long, default_value = "16", help = "Bits per sample (N')")]
    bits_per_sample: u8,

    #[arg(
        short,
        long,
        default_value = "245760000",
        value_parser = si_number::<u64>,
        help = "Converter sample rate in Hz, SI suffixes are accepted (e.g. 250M)"
    )]
    sample_rate: u64,

    #[arg(long, value_enum, default_value = "c")]
    version: VersionArg,

    #[arg(long, value_enum, default_value = "64b66b", help = "Line code, only used for 204C")]
    encoder: EncoderArg,

    #[arg(short = 'F', long, default_value = "4")]
    octets_per_frame: u8,

    #[arg(short = 'K', long, default_value = "32")]
    frames_per_multiframe: u16,

    #[arg(short = 'E', long, default_value = "0")]
    multiblocks_in_emb: u8,
}

impl LinkArgs {
    fn link(&self, link_id: u32) -> Link {
        Link {
            num_lanes: self.lanes,
            num_converters: self.converters,
            bits_per_sample: self.bits_per_sample,
            converter_resolution: self.bits_per_sample,
            samples_per_conv_frame: 1,
            sample_rate: self.sample_rate,
            jesd_version: match self.version {
                VersionArg::A => Version::A,
                VersionArg::B => Version::B,
                VersionArg::C => Version::C,
            },
            jesd_encoder: match self.encoder {
                EncoderArg::Enc8b10b => Encoder::Enc8b10b,
                EncoderArg::Enc64b66b => Encoder::Enc64b66b,
                EncoderArg::Enc64b80b => Encoder::Enc64b80b,
            },
            scrambling: true,
            octets_per_frame: self.octets_per_frame,
            frames_per_multiframe: self.frames_per_multiframe,
            num_of_multiblocks_in_emb: self.multiblocks_in_emb,
            ..Link::new(link_id)
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the rates derived from a link configuration
    Rates {
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Bring up a simulated board
    Run {
        #[command(flatten)]
        link: LinkArgs,

        #[arg(long, default_value = "2", help = "Number of links of the board")]
        links: u32,

        #[arg(
            long,
            default_value = "255",
            help = "Status checks before multichip synchronization gives up"
        )]
        mcs_retries: u32,

        #[arg(
            long,
            default_value = "2",
            help = "SYSREF pulses the simulated transceiver needs to lock"
        )]
        mcs_pulses: u32,

        #[arg(long, help = "Tear the board down again after bring-up")]
        uninit: bool,
    },
}

#[derive(Parser)]
#[command(about = "JESD204 link rate calculator and bring-up tool", long_about=None)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

fn print_rates(link: &Link) -> Result<(), Box<dyn Error>> {
    println!("{} {}", link.jesd_version, rate::LineCode::of(link)?);
    println!(
        "lane rate:    {} Hz ({} kHz)",
        rate::lane_rate_hz(link)?,
        rate::lane_rate_khz(link)?
    );
    println!("device clock: {} Hz", rate::device_clock_hz(link)?);
    println!("LMFC/LEMC:    {} Hz", rate::lmfc_lemc_rate_hz(link)?);
    println!("SYSREF:       {} Hz", rate::sysref_rate_hz([link])?);
    Ok(())
}

/// Registers the simulated board and returns its topology.
fn build_board(
    reg: &mut Jesd204,
    profile: Link,
    links: u32,
    mcs: PollConfig,
    mcs_pulses: u32,
) -> Result<TopologyId, Box<dyn Error>> {
    let line = Rc::new(SysrefLine::default());

    let clock = ClockDistributor::new(
        Rc::new(RegisterFile::new("hmc")),
        Rc::new(SimClock::new("sysref", 1, 100_000_000)),
        Rc::clone(&line),
    );
    let xcvr = Transceiver::new(
        Rc::new(RegisterFile::new("xcvr")),
        Rc::new(SimClock::new("dev_clk", 1000, 1_000_000_000)),
        line,
        profile,
        mcs,
        mcs_pulses,
    );
    let fpga = LinkLayer::new(
        Rc::new(RegisterFile::new("fpga")),
        Rc::new(SimClock::new("lane_clk", 1000, 32_000_000_000)),
    );

    let clock = reg.register_device("clock-distributor", clock.handlers());
    let xcvr = reg.register_device("transceiver", xcvr.handlers());
    let fpga = reg.register_device("fpga-link-layer", fpga.handlers());

    let topology = reg.init_topology([
        TopologyEntry::new(clock).links(0..links).sysref_provider(),
        TopologyEntry::new(xcvr).top().links(0..links),
        TopologyEntry::new(fpga).links(0..links),
    ])?;
    Ok(topology)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Rates { link } => print_rates(&link.link(0))?,
        Command::Run {
            link,
            links,
            mcs_retries,
            mcs_pulses,
            uninit,
        } => {
            let mcs = PollConfig::builder().max_attempts(mcs_retries).build();
            log::debug!(
                "Board: {} link(s), MCS bound {} check(s), {} pulse(s) to lock",
                links,
                mcs.max_attempts,
                mcs_pulses
            );

            let mut reg = Jesd204::new();
            let topology = build_board(&mut reg, link.link(0), links, mcs, mcs_pulses)?;

            match reg.run(topology, Reason::Init) {
                Ok(report) => print!("{}", report),
                Err(err) => {
                    log::info!("Bring-up failed, releasing devices");
                    reg.run(topology, Reason::Uninit)?;
                    return Err(err.into());
                }
            }
            for link in reg.topology(topology)?.top().links() {
                println!(
                    "Link{}: {} kHz lane rate",
                    link.link_id,
                    rate::lane_rate_khz(link)?
                );
            }
            if uninit {
                print!("{}", reg.run(topology, Reason::Uninit)?);
            }
        }
    }
    Ok(())
}
