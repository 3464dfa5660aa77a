//! End-to-end and adversarial test suites for Tide staking.
//!
//! The integration tests under `tests/` drive the engine and the service
//! through whole position lifecycles and randomized operation sequences,
//! checking accounting invariants after every step.

pub mod helpers;
