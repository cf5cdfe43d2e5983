//! Integration test entry point for tabcollab-client.
//!
//! Run with: cargo test --test integration

mod harness;
mod handshake;
mod exchange;
