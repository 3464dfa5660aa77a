//! Service-level errors.
use thiserror::Error;

use tide_core::error::StakingError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("staking: {0}")] Staking(#[from] StakingError),
    #[error("config: {0}")] Config(#[from] config::ConfigError),
    #[error("invalid config: {0}")] InvalidConfig(String),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("checkpoint encode: {0}")] Encode(#[from] bincode::error::EncodeError),
    #[error("checkpoint decode: {0}")] Decode(#[from] bincode::error::DecodeError),
}
