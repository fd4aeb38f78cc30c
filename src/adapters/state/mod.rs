//! `state.json` - small process-wide pointers (active plan, session info)
//! that don't belong in the relational schema.
//!
//! Written atomically (temp file + rename), matching the index writer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::TaskWingResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct State {
    pub active_plan_id: Option<String>,
}

pub struct StateStore {
    path: std::path::PathBuf,
}

impl StateStore {
    pub fn new(memory_root: &Path) -> Self {
        Self {
            path: memory_root.join("state.json"),
        }
    }

    pub fn read(&self) -> TaskWingResult<State> {
        if !self.path.exists() {
            return Ok(State::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write(&self, state: &State) -> TaskWingResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert_eq!(store.read().unwrap(), State::default());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        let state = State {
            active_plan_id: Some("plan-1".to_string()),
        };
        store.write(&state).unwrap();
        assert_eq!(store.read().unwrap(), state);
    }
}
