// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-prober
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Bounded-concurrency fan-out over a candidate path list, with cooperative
//! early-stop and an optional false-404 site-behavior filter.

/// The `probe` entry point and its request/result types.
pub mod probe;
/// `joinURL`-style path resolution.
pub mod url;

pub use probe::{probe, ProbeRequest, ProbeResult};
pub use url::join_url;
