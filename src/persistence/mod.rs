//! Save/load of the progression record
//!
//! Features:
//! - One versioned JSON record under a single key
//! - Ordered migrations on the raw JSON before typed decoding
//! - Missing fields fall back to defaults, derived stats are recomputed
//! - Corrupt or unreadable saves load as a fresh state

pub mod migration;
pub mod storage;

use thiserror::Error;

use crate::progression::ProgressionState;

#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
pub use storage::{MemoryStorage, Storage, StorageError};

/// Key the save record lives under
pub const STORAGE_KEY: &str = "plinko_react_v1";

/// Failure to read or write the save record
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("save record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Malformed(&'static str),
}

/// Decode a save record, running migrations first
pub fn decode(text: &str) -> Result<ProgressionState, PersistenceError> {
    let mut record: serde_json::Value = serde_json::from_str(text)?;
    migration::migrate(&mut record)?;
    let mut state: ProgressionState = serde_json::from_value(record)?;
    state.settings.sanitize();
    state.recompute_derived();
    Ok(state)
}

/// Read the stored state; `None` when nothing has been saved yet
pub fn try_load(storage: &dyn Storage) -> Result<Option<ProgressionState>, PersistenceError> {
    match storage.get(STORAGE_KEY)? {
        Some(text) => decode(&text).map(Some),
        None => Ok(None),
    }
}

/// Load the stored state, falling back to defaults on any failure
pub fn load(storage: &dyn Storage) -> ProgressionState {
    match try_load(storage) {
        Ok(Some(state)) => {
            log::info!(
                "Loaded save: population {}, {} shards, prestiged {}x",
                state.population(),
                state.kinetic_shards,
                state.times_prestiged
            );
            state
        }
        Ok(None) => {
            log::info!("No save found, starting fresh");
            ProgressionState::default()
        }
        Err(err) => {
            log::warn!("Failed to load save, starting fresh: {err}");
            ProgressionState::default()
        }
    }
}

/// Stamp `last_save_time` with `now_ms` and write the record
pub fn save(
    storage: &mut dyn Storage,
    state: &mut ProgressionState,
    now_ms: f64,
) -> Result<(), PersistenceError> {
    state.last_save_time = now_ms;
    let text = serde_json::to_string(state)?;
    storage.set(STORAGE_KEY, &text)?;
    log::debug!("Saved {} bytes", text.len());
    Ok(())
}

/// Delete the save record
pub fn clear(storage: &mut dyn Storage) -> Result<(), PersistenceError> {
    storage.remove(STORAGE_KEY)?;
    Ok(())
}
