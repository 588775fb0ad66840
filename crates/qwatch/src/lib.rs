//! The `qwatch` service: CLI, HTTP server and live feed on top of
//! `qwatch-core`.

pub mod cli;
pub mod commands;
pub mod error;
pub mod server;
pub mod ws;
