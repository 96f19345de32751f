//! Clock derivation for JESD204 links.
//!
//! All functions are pure and only depend on the link passed in.
use std::fmt::Display;

use crate::{
    error::LinkError,
    link::{Encoder, Link, Version},
};

/// Resolved line code of a link. JESD204A/B links always use 8B/10B,
/// JESD204C links use whatever the encoder field selects.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineCode {
    Enc8b10b,
    Enc64b66b,
    Enc64b80b,
}

impl LineCode {
    /// Resolves the line code from the version and encoder fields of a link.
    pub fn of(link: &Link) -> Result<LineCode, LinkError> {
        match (link.jesd_version, link.jesd_encoder) {
            (Version::A | Version::B, _) => Ok(LineCode::Enc8b10b),
            (Version::C, Encoder::Enc8b10b) => Ok(LineCode::Enc8b10b),
            (Version::C, Encoder::Enc64b66b) => Ok(LineCode::Enc64b66b),
            (Version::C, Encoder::Enc64b80b) => Ok(LineCode::Enc64b80b),
            (version, encoder) => Err(LinkError::UnsupportedEncoding { version, encoder }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LineCode::Enc8b10b => "8B/10B",
            LineCode::Enc64b66b => "64B/66B",
            LineCode::Enc64b80b => "64B/80B",
        }
    }

    /// Ratio of line bits to payload bits, as `(numerator, denominator)`.
    pub fn overhead(self) -> (u64, u64) {
        match self {
            LineCode::Enc8b10b => (10, 8),
            LineCode::Enc64b66b => (66, 64),
            LineCode::Enc64b80b => (80, 64),
        }
    }

    /// Ratio of lane rate to device clock.
    pub fn device_clock_divider(self) -> u64 {
        match self {
            LineCode::Enc8b10b => 40,
            LineCode::Enc64b66b => 66,
            LineCode::Enc64b80b => 80,
        }
    }

    /// Number of line bits per 8B/10B character or 64B/xxB block.
    pub fn block_bits(self) -> u64 {
        match self {
            LineCode::Enc8b10b => 10,
            LineCode::Enc64b66b => 66,
            LineCode::Enc64b80b => 80,
        }
    }
}

impl Display for LineCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the lane rate of the link in Hz.
///
/// `lane_rate = M * N' * sample_rate * encoding_overhead / (L * divisor)`, rounded down.
pub fn lane_rate_hz(link: &Link) -> Result<u64, LinkError> {
    link.require_rate_fields()?;
    let (num, den) = LineCode::of(link)?.overhead();

    let dividend = link.num_converters as u128
        * link.bits_per_sample as u128
        * num as u128
        * link.sample_rate as u128;
    let divisor = link.num_lanes as u128 * den as u128 * link.divisor() as u128;
    let rate = dividend / divisor;
    log::trace!(
        "Link{}: lane rate {}*{}*{}*{} / ({}*{}*{}) = {} Hz",
        link.link_id,
        link.num_converters,
        link.bits_per_sample,
        num,
        link.sample_rate,
        link.num_lanes,
        den,
        link.divisor(),
        rate
    );
    u64::try_from(rate).map_err(|_| LinkError::RateOverflow {
        link_id: link.link_id,
    })
}

/// Returns the lane rate of the link in kHz, rounded half up.
pub fn lane_rate_khz(link: &Link) -> Result<u64, LinkError> {
    let rate = lane_rate_hz(link)?;
    Ok(rate / 1000 + u64::from(rate % 1000 >= 500))
}

/// Returns the device clock of the link in Hz.
pub fn device_clock_hz(link: &Link) -> Result<u64, LinkError> {
    let rate = lane_rate_hz(link)?;
    Ok(rate / LineCode::of(link)?.device_clock_divider())
}

/// Returns the local multiframe clock (8B/10B) or local extended multiblock clock
/// (64B/66B, 64B/80B) of the link in Hz.
pub fn lmfc_lemc_rate_hz(link: &Link) -> Result<u64, LinkError> {
    let code = LineCode::of(link)?;
    let rate = lane_rate_hz(link)?;
    let bkw = code.block_bits();

    let lmfc = match code {
        LineCode::Enc64b66b | LineCode::Enc64b80b if link.num_of_multiblocks_in_emb != 0 => {
            rate / (bkw * 32 * link.num_of_multiblocks_in_emb as u64)
        }
        LineCode::Enc64b66b | LineCode::Enc64b80b => {
            (rate as u128 * 8 / (bkw as u128 * link.frame_octets()? as u128)) as u64
        }
        LineCode::Enc8b10b => rate / (bkw * link.frame_octets()?),
    };
    log::trace!("Link{}: LMFC/LEMC {} Hz", link.link_id, lmfc);
    Ok(lmfc)
}

/// Returns the SYSREF frequency that keeps the LMFC/LEMC of every link aligned:
/// the greatest common divisor of all link LMFC/LEMC rates.
pub fn sysref_rate_hz<'a>(links: impl IntoIterator<Item = &'a Link>) -> Result<u64, LinkError> {
    let mut gcd_rate = None;
    for link in links {
        let lmfc = lmfc_lemc_rate_hz(link)?;
        gcd_rate = Some(match gcd_rate {
            None => lmfc,
            Some(acc) => gcd(acc, lmfc),
        });
    }
    gcd_rate.ok_or(LinkError::InvalidLinkConfig {
        link_id: 0,
        field: "links",
    })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Link {
    /// F * K, the number of octets in a multiframe.
    fn frame_octets(&self) -> Result<u64, LinkError> {
        let octets = self.octets_per_frame as u64 * self.frames_per_multiframe as u64;
        if self.octets_per_frame == 0 {
            return Err(LinkError::InvalidLinkConfig {
                link_id: self.link_id,
                field: "octets_per_frame",
            });
        }
        if self.frames_per_multiframe == 0 {
            return Err(LinkError::InvalidLinkConfig {
                link_id: self.link_id,
                field: "frames_per_multiframe",
            });
        }
        Ok(octets)
    }
}
