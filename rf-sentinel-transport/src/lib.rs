//! C1 (SDR transport) and C2 (IQ decoding), plus a synthetic mock-mode
//! frame source that shares C1's external channel-based interface.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod iq;
pub mod mock;
pub mod retry;
pub mod sdr;

pub use mock::{BurstTrainSpec, MockFrameSource};
pub use sdr::{ConnectionHealth, SdrTransport, SdrTransportConfig};
