use std::{error::Error, fmt::Display};

use crate::link::{Encoder, Version};

/// Errors that may occur when deriving clocks from link parameters.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LinkError {
    /// A field required for the computation is zero (or otherwise inconsistent).
    InvalidLinkConfig { link_id: u32, field: &'static str },
    /// The version/line code combination is not covered by the standard.
    UnsupportedEncoding { version: Version, encoder: Encoder },
    /// The derived rate does not fit into 64 bits.
    RateOverflow { link_id: u32 },
}

impl Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::InvalidLinkConfig { link_id, field } => {
                write!(f, "Link{} has an invalid configuration: {} is not set", link_id, field)
            }
            LinkError::UnsupportedEncoding { version, encoder } => {
                write!(f, "Unsupported encoding {} for JESD{}", encoder, version)
            }
            LinkError::RateOverflow { link_id } => {
                write!(f, "Lane rate of Link{} overflows 64 bits", link_id)
            }
        }
    }
}

impl Error for LinkError {}
