//! Session metadata and host environment descriptors.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::modes::AgentFlavor;
use crate::validate::non_null;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct MetadataSummary {
    pub text: String,
    pub updated_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct Metadata {
    pub path: String,
    pub host: String,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub summary: Option<MetadataSummary>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub claude_session_id: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub slash_commands: Option<Vec<String>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub happy_home_dir: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub host_pid: Option<f64>,
    /// Can be null or absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
}

impl Metadata {
    pub fn new(path: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
            version: None,
            name: None,
            os: None,
            summary: None,
            machine_id: None,
            claude_session_id: None,
            tools: None,
            slash_commands: None,
            home_dir: None,
            happy_home_dir: None,
            host_pid: None,
            flavor: None,
        }
    }

    pub fn agent_flavor(&self) -> AgentFlavor {
        AgentFlavor::from_metadata(self.flavor.as_deref())
    }
}
