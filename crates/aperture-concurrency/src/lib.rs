// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-concurrency
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Cancellation tokens and bounded fan-out helpers shared by the prober
//! and orchestrator.

/// Cooperative cancellation token.
pub mod cancel;
/// Bounded-concurrency fan-out over a collection of items.
pub mod fanout;

pub use cancel::CancellationToken;
pub use fanout::fan_out;
