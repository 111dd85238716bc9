//! Centralized constants for kube2vulcan.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod network;
pub mod paths;
pub mod state;
pub mod watch;
