use std::fmt::Display;

use crate::error::LinkError;

/// The revision of the JESD204 standard a link operates under.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Version {
    /// JESD204A. Always 8B/10B, no deterministic latency.
    #[default]
    A,
    /// JESD204B. Always 8B/10B.
    B,
    /// JESD204C. The line code is selected by the [`Encoder`].
    C,
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::A => write!(f, "204A"),
            Version::B => write!(f, "204B"),
            Version::C => write!(f, "204C"),
        }
    }
}

/// Line code used on the lanes. Only meaningful for [`Version::C`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Encoder {
    #[default]
    Unknown,
    Enc8b10b,
    Enc64b66b,
    Enc64b80b,
}

impl Display for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoder::Unknown => write!(f, "unknown"),
            Encoder::Enc8b10b => write!(f, "8B/10B"),
            Encoder::Enc64b66b => write!(f, "64B/66B"),
            Encoder::Enc64b80b => write!(f, "64B/80B"),
        }
    }
}

/// Device subclass, which decides how deterministic latency is achieved.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Subclass {
    /// No deterministic latency support.
    #[default]
    Subclass0,
    /// Deterministic latency using SYSREF.
    Subclass1,
    /// Deterministic latency using SYNC~.
    Subclass2,
}

/// How the SYSREF distributor emits pulses for a link.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum SysrefMode {
    #[default]
    Disabled,
    /// SYSREF is a free running periodic signal.
    Continuous,
    /// SYSREF is only emitted on request, one pulse (or a short burst) at a time.
    OneShot,
}

/// SYSREF capture settings of a link.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SysrefConfig {
    pub mode: SysrefMode,
    /// SYSREF is sampled on the falling edge of the device clock.
    pub capture_falling_edge: bool,
    /// SYSREF is valid on its falling edge (active low).
    pub valid_falling_edge: bool,
    /// Offset, in frame clock cycles, of the local multiframe clock relative to SYSREF.
    pub lmfc_offset: u16,
}

/// Parameters of a single JESD204 link.
///
/// A link is allocated zeroed when a topology is created and populated by the device adapters
/// during the link initialization phase. Field names follow the letters used in the standard
/// where one exists (L, M, N', N, CS, S, F, K, E).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Link {
    /// Identifier of the link, unique within a topology.
    pub link_id: u32,
    /// `true` for links carrying data from the FPGA to a converter (DAC side).
    pub is_transmit: bool,
    /// L
    pub num_lanes: u8,
    /// M
    pub num_converters: u8,
    /// N'
    pub bits_per_sample: u8,
    /// N
    pub converter_resolution: u8,
    /// CS
    pub ctrl_bits_per_sample: u8,
    /// S
    pub samples_per_conv_frame: u8,
    /// Converter sample rate in Hz.
    pub sample_rate: u64,
    /// Divides the sample rate for links running decimated data. Zero is treated as one.
    pub sample_rate_divisor: u32,
    pub jesd_version: Version,
    pub jesd_encoder: Encoder,
    pub subclass: Subclass,
    /// DID
    pub device_id: u8,
    /// BID
    pub bank_id: u8,
    /// SCR
    pub scrambling: bool,
    /// HD
    pub high_density: bool,
    /// F
    pub octets_per_frame: u8,
    /// K
    pub frames_per_multiframe: u16,
    /// E. Zero means "not set".
    pub num_of_multiblocks_in_emb: u8,
    /// Physical lane used for each logical lane. Empty means identity mapping.
    pub lane_ids: Vec<u8>,
    pub sysref: SysrefConfig,
}

impl Link {
    /// Creates a zero-initialized link with the given identifier.
    pub fn new(link_id: u32) -> Link {
        Link {
            link_id,
            ..Default::default()
        }
    }

    /// Returns the effective sample rate divisor (a zero divisor is treated as one).
    pub fn divisor(&self) -> u64 {
        match self.sample_rate_divisor {
            0 => 1,
            d => d as u64,
        }
    }

    /// Checks that the fields required for rate computation are set and that the lane table
    /// (if any) matches the lane count.
    pub fn validate(&self) -> Result<(), LinkError> {
        self.require_rate_fields()?;
        if !self.lane_ids.is_empty() && self.lane_ids.len() != self.num_lanes as usize {
            return Err(LinkError::InvalidLinkConfig {
                link_id: self.link_id,
                field: "lane_ids",
            });
        }
        Ok(())
    }

    /// L, M, N' and the sample rate must all be non-zero before any rate is derived.
    pub(crate) fn require_rate_fields(&self) -> Result<(), LinkError> {
        let required = [
            ("num_lanes", self.num_lanes as u64),
            ("num_converters", self.num_converters as u64),
            ("bits_per_sample", self.bits_per_sample as u64),
            ("sample_rate", self.sample_rate),
        ];
        match required.iter().find(|(_, value)| *value == 0) {
            Some(&(field, _)) => Err(LinkError::InvalidLinkConfig {
                link_id: self.link_id,
                field,
            }),
            None => Ok(()),
        }
    }

    /// Iterates over the physical lanes of this link in logical lane order.
    pub fn physical_lanes(&self) -> impl Iterator<Item = u8> + '_ {
        let identity = if self.lane_ids.is_empty() {
            0..self.num_lanes
        } else {
            0..0
        };
        self.lane_ids.iter().copied().chain(identity)
    }
}

/// Copies every link attribute from `src` into `dst`.
///
/// Adapters use this to publish the configuration they negotiated into the shared topology
/// link. Every field is listed explicitly so that adding a field to [`Link`] without updating
/// this function is caught at compile time.
pub fn copy_link_params(dst: &mut Link, src: &Link) {
    let Link {
        link_id,
        is_transmit,
        num_lanes,
        num_converters,
        bits_per_sample,
        converter_resolution,
        ctrl_bits_per_sample,
        samples_per_conv_frame,
        sample_rate,
        sample_rate_divisor,
        jesd_version,
        jesd_encoder,
        subclass,
        device_id,
        bank_id,
        scrambling,
        high_density,
        octets_per_frame,
        frames_per_multiframe,
        num_of_multiblocks_in_emb,
        lane_ids,
        sysref,
    } = src;

    dst.link_id = *link_id;
    dst.is_transmit = *is_transmit;
    dst.num_lanes = *num_lanes;
    dst.num_converters = *num_converters;
    dst.bits_per_sample = *bits_per_sample;
    dst.converter_resolution = *converter_resolution;
    dst.ctrl_bits_per_sample = *ctrl_bits_per_sample;
    dst.samples_per_conv_frame = *samples_per_conv_frame;
    dst.sample_rate = *sample_rate;
    dst.sample_rate_divisor = *sample_rate_divisor;
    dst.jesd_version = *jesd_version;
    dst.jesd_encoder = *jesd_encoder;
    dst.subclass = *subclass;
    dst.device_id = *device_id;
    dst.bank_id = *bank_id;
    dst.scrambling = *scrambling;
    dst.high_density = *high_density;
    dst.octets_per_frame = *octets_per_frame;
    dst.frames_per_multiframe = *frames_per_multiframe;
    dst.num_of_multiblocks_in_emb = *num_of_multiblocks_in_emb;
    dst.lane_ids.clone_from(lane_ids);
    dst.sysref = SysrefConfig {
        mode: sysref.mode,
        capture_falling_edge: sysref.capture_falling_edge,
        valid_falling_edge: sysref.valid_falling_edge,
        lmfc_offset: sysref.lmfc_offset,
    };
}

#[test]
fn zeroed_link() {
    let link = Link::new(3);
    assert_eq!(link.link_id, 3);
    assert_eq!(link.num_lanes, 0);
    assert_eq!(link.jesd_version, Version::A);
    assert_eq!(link.jesd_encoder, Encoder::Unknown);
    assert_eq!(link.sysref.mode, SysrefMode::Disabled);
    assert_eq!(link.divisor(), 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negotiated() -> Link {
        Link {
            link_id: 2,
            is_transmit: true,
            num_lanes: 4,
            num_converters: 2,
            bits_per_sample: 16,
            converter_resolution: 14,
            ctrl_bits_per_sample: 2,
            samples_per_conv_frame: 1,
            sample_rate: 1_233_000_000,
            sample_rate_divisor: 2,
            jesd_version: Version::C,
            jesd_encoder: Encoder::Enc64b66b,
            subclass: Subclass::Subclass1,
            device_id: 7,
            bank_id: 1,
            scrambling: true,
            high_density: true,
            octets_per_frame: 1,
            frames_per_multiframe: 32,
            num_of_multiblocks_in_emb: 1,
            lane_ids: vec![3, 2, 1, 0],
            sysref: SysrefConfig {
                mode: SysrefMode::OneShot,
                capture_falling_edge: true,
                valid_falling_edge: false,
                lmfc_offset: 5,
            },
        }
    }

    #[test]
    fn copy_overwrites_every_field() {
        let src = negotiated();
        let mut dst = Link::new(2);
        dst.lane_ids = vec![9; 8];
        copy_link_params(&mut dst, &src);
        assert_eq!(dst, src);
    }

    #[test]
    fn validate_reports_first_zero_field() {
        let mut link = negotiated();
        link.num_converters = 0;
        link.sample_rate = 0;
        match link.validate() {
            Err(LinkError::InvalidLinkConfig { link_id, field }) => {
                assert_eq!(link_id, 2);
                assert_eq!(field, "num_converters");
            }
            other => panic!("expected InvalidLinkConfig, got {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_short_lane_table() {
        let mut link = negotiated();
        link.lane_ids.pop();
        assert!(matches!(
            link.validate(),
            Err(LinkError::InvalidLinkConfig {
                field: "lane_ids",
                ..
            })
        ));
    }

    #[test]
    fn physical_lanes_default_to_identity() {
        let mut link = negotiated();
        assert_eq!(link.physical_lanes().collect::<Vec<_>>(), vec![3, 2, 1, 0]);
        link.lane_ids.clear();
        assert_eq!(link.physical_lanes().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}
