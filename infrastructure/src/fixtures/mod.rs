//! Test-program fixtures: scratch directories and compiled debuggees.

mod workspace;

pub use workspace::{FixtureError, TestWorkspace};
