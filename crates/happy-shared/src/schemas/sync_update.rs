//! Update envelopes exchanged with the sync service.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::validate::{decode_buffered, field_error, non_null};

use super::agent_state::AgentState;
use super::machine::{Machine, MachineMetadata};
use super::metadata::Metadata;
use super::session::Session;
use super::versioned::Versioned;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncUpdate {
    pub id: String,
    pub seq: u64,
    pub created_at: f64,
    pub body: UpdateBody,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "t", rename_all = "kebab-case")]
pub enum UpdateBody {
    NewSession(Session),
    UpdateSession(SessionPatch),
    DeleteSession { sid: String },
    NewMachine(Machine),
    UpdateMachine(MachinePatch),
}

impl UpdateBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewSession(_) => "new-session",
            Self::UpdateSession(_) => "update-session",
            Self::DeleteSession { .. } => "delete-session",
            Self::NewMachine(_) => "new-machine",
            Self::UpdateMachine(_) => "update-machine",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Versioned<Metadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_state: Option<Versioned<AgentState>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachinePatch {
    pub machine_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Versioned<MachineMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_state: Option<Versioned<Value>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub active_at: Option<f64>,
}

#[derive(Deserialize)]
struct DeleteSession {
    sid: String,
}

// Hand-written so errors inside the body keep their field path; serde's
// internally tagged derive buffers the body and loses it.
impl<'de> Deserialize<'de> for UpdateBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(de::Error::custom("expected an update body object"));
        }
        let tag = match value.get("t") {
            Some(Value::String(t)) => t.as_str(),
            Some(_) => return Err(de::Error::custom(field_error("t", "expected a string"))),
            None => return Err(de::Error::missing_field("t")),
        };
        match tag {
            "new-session" => decode_buffered(&value).map(Self::NewSession),
            "update-session" => decode_buffered(&value).map(Self::UpdateSession),
            "delete-session" => {
                decode_buffered::<DeleteSession, D::Error>(&value).map(|d| Self::DeleteSession { sid: d.sid })
            }
            "new-machine" => decode_buffered(&value).map(Self::NewMachine),
            "update-machine" => decode_buffered(&value).map(Self::UpdateMachine),
            other => Err(de::Error::custom(field_error(
                "t",
                format!(
                    "unknown update kind `{other}`, expected one of new-session, \
                     update-session, delete-session, new-machine, update-machine"
                ),
            ))),
        }
    }
}

/// Outbound versioned write of a session field. Carries no local-only state.
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct SessionUpdateRequest<T> {
    pub sid: String,
    #[ts(type = "number")]
    pub expected_version: u64,
    pub value: Option<T>,
}

#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct MachineUpdateRequest<T> {
    pub machine_id: String,
    #[ts(type = "number")]
    pub expected_version: u64,
    pub value: Option<T>,
}
