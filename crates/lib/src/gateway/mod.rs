//! Gateway: HTTP entry point for the messaging platform.
//!
//! Single port serves a health probe and the LINE webhook. Verified batches are queued to a
//! processor task that runs each event's reply chain independently.

mod server;

pub use server::{app, run_gateway, GatewayState};
