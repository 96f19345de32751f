//! # JESD204 Link Library
//!
//! This crate models the parameters of a [JESD204](https://www.jedec.org/document_search?search_api_views_fulltext=jesd204)
//! serial link and derives the clocks that the devices on both ends of the link have to agree on.
//!
//! ## Overview
//!
//! A JESD204 link carries converter samples over one or more serial lanes. Both the transmitter
//! and the receiver must run their serializers at the same lane rate, derive the same device
//! clock and align their local multiframe clocks to a shared SYSREF. This library provides:
//!
//! - The [`Link`] data model, including the SYSREF capture settings
//! - Lane rate, device clock and LMFC/LEMC derivation ([`rate`])
//! - The SYSREF frequency that keeps several links aligned ([`rate::sysref_rate_hz`])
//! - [`copy_link_params`] to publish a negotiated configuration into a shared link
//!
//! ## Supported Encodings
//!
//! | Version | Line code | Overhead | Device clock |
//! |---------|-----------|----------|--------------|
//! | 204A/B  | 8B/10B    | 10/8     | lane rate / 40 |
//! | 204C    | 8B/10B    | 10/8     | lane rate / 40 |
//! | 204C    | 64B/66B   | 66/64    | lane rate / 66 |
//! | 204C    | 64B/80B   | 80/64    | lane rate / 80 |
//!
//! ## Basic Usage
//!
//! ```
//! use jesd204_link::{Encoder, Link, Version, rate};
//!
//! let link = Link {
//!     num_lanes: 4,
//!     num_converters: 4,
//!     bits_per_sample: 16,
//!     sample_rate: 245_760_000,
//!     jesd_version: Version::C,
//!     jesd_encoder: Encoder::Enc64b66b,
//!     ..Link::new(0)
//! };
//! assert_eq!(rate::lane_rate_hz(&link).unwrap(), 4_055_040_000);
//! assert_eq!(rate::lane_rate_khz(&link).unwrap(), 4_055_040);
//! assert_eq!(rate::device_clock_hz(&link).unwrap(), 61_440_000);
//! ```
//!
//! ## Error Handling
//!
//! Every derivation returns a [`error::LinkError`] when a required field is not set or the
//! version and encoder do not form a valid pair.
pub mod link;
pub use link::*;
pub mod error;
pub mod rate;
