//! Schema migrations on the raw JSON record
//!
//! Migrations run before typed deserialization so they can touch fields the
//! current struct no longer has. Each step lifts a record to exactly one
//! version higher.

use serde_json::{Value, json};

use super::PersistenceError;
use crate::progression::CURRENT_VERSION;

/// Upgrade `record` in place to [`CURRENT_VERSION`]
///
/// Returns the version the record was stored with. A missing or zero version
/// counts as version 1.
pub fn migrate(record: &mut Value) -> Result<u32, PersistenceError> {
    let Some(object) = record.as_object() else {
        return Err(PersistenceError::Malformed("save record is not an object"));
    };
    let stored = object
        .get("version")
        .and_then(Value::as_u64)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(1)
        .max(1);

    if stored > CURRENT_VERSION {
        log::warn!("Save version {stored} is newer than {CURRENT_VERSION}, loading as-is");
        return Ok(stored);
    }

    let mut version = stored;
    while version < CURRENT_VERSION {
        if version == 1 {
            v1_to_v2(record);
        }
        version += 1;
    }
    if let Some(object) = record.as_object_mut() {
        object.insert("version".to_string(), json!(CURRENT_VERSION));
    }

    if stored < CURRENT_VERSION {
        log::info!("Migrated save from v{stored} to v{CURRENT_VERSION}");
    }
    Ok(stored)
}

/// v2 counts the starting ball as level 1 of `extraBall`
fn v1_to_v2(record: &mut Value) {
    let Some(upgrades) = record.get_mut("upgrades").and_then(Value::as_object_mut) else {
        return;
    };
    let level = upgrades.get("extraBall").and_then(Value::as_u64).unwrap_or(0);
    upgrades.insert("extraBall".to_string(), json!(level + 1));
}
