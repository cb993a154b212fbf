//! Crate-level test suites.

mod daemon_behaviour;
mod support;
