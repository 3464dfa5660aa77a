//! Engine state checkpoints.
//!
//! The state is serialized with bincode's serde bridge (standard config) and
//! written through a temporary file plus rename, so a crash mid-write never
//! leaves a truncated checkpoint behind.

use std::fs;
use std::path::Path;

use tide_staking::StakingState;
use tracing::info;

use crate::error::ServiceError;

pub fn encode(state: &StakingState) -> Result<Vec<u8>, ServiceError> {
    Ok(bincode::serde::encode_to_vec(state, bincode::config::standard())?)
}

pub fn decode(bytes: &[u8]) -> Result<StakingState, ServiceError> {
    let (state, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(state)
}

/// Write `state` to `path`, creating parent directories as needed.
pub fn save(state: &StakingState, path: &Path) -> Result<(), ServiceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = encode(state)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), bytes = bytes.len(), "checkpoint written");
    Ok(())
}

/// Read a checkpoint; `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<StakingState>, ServiceError> {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes).map(Some),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
