//! C10: the subscriber TCP server (§4.10). Accepts dashboard/NFC-reader
//! connections, frames messages as newline-delimited JSON, tracks
//! per-connection heartbeats, and fans out detection events.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

mod connection;
mod nfc;
mod server;

pub use server::{Publisher, SubscriberServer, SubscriberServerConfig};
