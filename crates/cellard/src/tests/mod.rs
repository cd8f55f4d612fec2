//! Test suites for the cellar daemon.

mod requests_behaviour;
pub(crate) mod support;
