//! CLI command implementations
//!
//! `replay` drives the programmer through the loopback transport; `functions`
//! prints the protocol tables.

mod functions;
mod replay;

pub use functions::list_functions;
pub use replay::run_replay;
