//! # tide-service: Serialized host for the staking engine.
//!
//! - [`service::StakingService`]: one exclusive section around the engine,
//!   wall clock, event broadcast and a background catch-up task
//! - [`config::StakingConfig`]: layered configuration (defaults, TOML file,
//!   `TIDE_*` environment)
//! - [`checkpoint`]: bincode snapshots of the engine state
//! - [`clock`]: system and manual clocks

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StakingConfig;
pub use error::ServiceError;
pub use service::StakingService;
