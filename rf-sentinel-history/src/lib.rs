//! C5: the bounded, time-windowed signal history store shared (read-only)
//! by the replay, jamming, and brute-force detectors, and written to only
//! by the threat arbiter (§4.5, §9).

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod similarity;
pub mod store;

pub use similarity::similarity;
pub use store::SignalHistory;
