//! API Integrator command-line front end: state-dir resolution, command
//! handlers, and live connection testing.

pub mod commands;
pub mod config;
pub mod probe;

pub use config::resolve_state_dir;
pub use probe::{ConnectionProber, ConnectionReport, ProbeError, ProbeResponse};
