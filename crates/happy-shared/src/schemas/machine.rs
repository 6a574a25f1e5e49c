//! Host machines and their daemon state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::validate::{non_null, nullable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
#[ts(rename_all = "kebab-case")]
pub enum DaemonStatus {
    Running,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
#[ts(rename_all = "kebab-case")]
pub enum ShutdownSource {
    HappyApp,
    HappyCli,
    OsSignal,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct MachineMetadata {
    pub host: String,
    pub platform: String,
    pub happy_cli_version: String,
    pub happy_home_dir: String,
    pub home_dir: String,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub daemon_last_known_status: Option<DaemonStatus>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub daemon_last_known_pid: Option<f64>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub shutdown_requested_at: Option<f64>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub shutdown_source: Option<ShutdownSource>,
}

impl MachineMetadata {
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.host.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    #[ts(type = "number")]
    pub seq: u64,
    pub created_at: f64,
    pub updated_at: f64,
    pub active: bool,
    pub active_at: f64,
    #[serde(deserialize_with = "nullable")]
    pub metadata: Option<MachineMetadata>,
    #[ts(type = "number")]
    pub metadata_version: u64,
    #[serde(deserialize_with = "nullable")]
    pub daemon_state: Option<Value>,
    #[ts(type = "number")]
    pub daemon_state_version: u64,
}

impl Machine {
    pub fn display_label(&self) -> &str {
        self.metadata
            .as_ref()
            .map(MachineMetadata::display_label)
            .unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::parse;
    use serde_json::json;

    fn machine_json() -> Value {
        json!({
            "id": "m1",
            "seq": 3,
            "createdAt": 1000,
            "updatedAt": 1200,
            "active": false,
            "activeAt": 1100,
            "metadata": {
                "host": "devbox",
                "platform": "linux",
                "happyCliVersion": "0.10.0",
                "happyHomeDir": "/home/u/.happy",
                "homeDir": "/home/u",
                "daemonLastKnownStatus": "shutting-down",
                "shutdownSource": "os-signal"
            },
            "metadataVersion": 2,
            "daemonState": {"status": "running", "pid": 42},
            "daemonStateVersion": 4
        })
    }

    #[test]
    fn machine_roundtrip() {
        let machine: Machine = parse(&machine_json()).unwrap();
        let meta = machine.metadata.as_ref().unwrap();
        assert_eq!(meta.daemon_last_known_status, Some(DaemonStatus::ShuttingDown));
        assert_eq!(meta.shutdown_source, Some(ShutdownSource::OsSignal));
        assert_eq!(machine.display_label(), "devbox");

        let json = serde_json::to_value(&machine).unwrap();
        let back: Machine = parse(&json).unwrap();
        assert_eq!(machine, back);
    }

    #[test]
    fn missing_required_metadata_field() {
        let mut json = machine_json();
        json["metadata"].as_object_mut().unwrap().remove("homeDir");
        let err = parse::<Machine>(&json).unwrap_err();
        assert_eq!(err.path.as_str(), "metadata.homeDir");
        assert_eq!(err.message, "missing field `homeDir`");
    }

    #[test]
    fn bad_shutdown_source() {
        let mut json = machine_json();
        json["metadata"]["shutdownSource"] = json!("cosmic-ray");
        let err = parse::<Machine>(&json).unwrap_err();
        assert_eq!(err.path.as_str(), "metadata.shutdownSource");
    }

    #[test]
    fn daemon_state_key_is_nullable_not_optional() {
        let mut json = machine_json();
        json["daemonState"] = json!(null);
        assert_eq!(parse::<Machine>(&json).unwrap().daemon_state, None);

        json.as_object_mut().unwrap().remove("daemonState");
        let err = parse::<Machine>(&json).unwrap_err();
        assert_eq!(err.path.as_str(), "daemonState");
    }

    #[test]
    fn display_name_wins_over_host() {
        let mut json = machine_json();
        json["metadata"]["displayName"] = json!("Work Laptop");
        let machine: Machine = parse(&json).unwrap();
        assert_eq!(machine.display_label(), "Work Laptop");
    }
}
