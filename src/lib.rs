//! Just Weather library
//!
//! Exposes the cache, fetch bridge, upstream clients and HTTP layers for use
//! by the binary and in integration tests.

pub mod bridge;
pub mod cache;
pub mod cli;
pub mod data;
pub mod routes;
pub mod server;
