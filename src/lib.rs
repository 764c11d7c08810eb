//! Authoritative arena server: a fixed-timestep rocket-dodging game with
//! server-side simulation, diff-based state replication over WebSocket, and
//! client-side snapshot interpolation.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod interp;
pub mod util;
pub mod ws;
