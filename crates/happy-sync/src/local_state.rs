//! On-disk persistence of client-owned session state (drafts and modes).
//! Kept apart from synced state so it can never leak into an outbound update.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use happy_shared::schemas::SessionLocal;
use serde::{Deserialize, Serialize};

use crate::config::settings::write_json_atomic;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStateFile {
    #[serde(default)]
    pub sessions: HashMap<String, SessionLocal>,
}

impl LocalStateFile {
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}
