//! Session-level concepts for one debugger under test.
//!
//! - [`correlator::RequestCorrelator`]: request numbering
//! - [`launch::LaunchSpec`]: how the server is invoked and what it must print on startup
//! - [`process::ProcessTree`]: every process the server was seen to spawn

pub mod correlator;
pub mod launch;
pub mod process;
