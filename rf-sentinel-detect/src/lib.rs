//! C6/C7/C8: the three threat detectors sharing the read-only signal
//! history (§4.6-§4.8). Each detector is a pure function from the current
//! [`Detection`](rf_sentinel_common::model::Detection) plus a
//! [`SignalHistory`](rf_sentinel_history::SignalHistory) snapshot to an
//! optional [`Indicator`](rf_sentinel_common::model::Indicator) — never a
//! hard error (§7: "any internal exception is caught, logged, and the
//! detector returns 'no threat' for that frame").

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod bruteforce;
pub mod jamming;
pub mod replay;

pub use bruteforce::detect_brute_force;
pub use jamming::detect_jamming;
pub use replay::detect_replay;
