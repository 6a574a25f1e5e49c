//! Core session aggregate type.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use ts_rs::TS;

use crate::modes::{ModelMode, PermissionMode};
use crate::validate::{non_null, nullable};

use super::agent_state::AgentState;
use super::metadata::Metadata;
use super::todo::TodoItem;

/// `"online"` while the session is alive, otherwise the last-seen time in ms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    Online,
    LastSeen(f64),
}

impl Presence {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl Serialize for Presence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Online => serializer.serialize_str("online"),
            Self::LastSeen(t) => serializer.serialize_f64(*t),
        }
    }
}

impl<'de> Deserialize<'de> for Presence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PresenceVisitor;

        impl Visitor<'_> for PresenceVisitor {
            type Value = Presence;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"online\" or a last-seen timestamp")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Presence, E> {
                match v {
                    "online" => Ok(Presence::Online),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Presence, E> {
                Ok(Presence::LastSeen(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Presence, E> {
                Ok(Presence::LastSeen(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Presence, E> {
                Ok(Presence::LastSeen(v as f64))
            }
        }

        deserializer.deserialize_any(PresenceVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct UsageSnapshot {
    #[ts(type = "number")]
    pub input_tokens: u64,
    #[ts(type = "number")]
    pub output_tokens: u64,
    #[ts(type = "number")]
    pub cache_creation: u64,
    #[ts(type = "number")]
    pub cache_read: u64,
    #[ts(type = "number")]
    pub context_size: u64,
    pub timestamp: f64,
}

/// Client-owned state. Never serialized onto the wire and never read from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLocal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_mode: Option<ModelMode>,
}

impl SessionLocal {
    pub fn is_empty(&self) -> bool {
        self.draft.is_none() && self.permission_mode.is_none() && self.model_mode.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[ts(type = "number")]
    pub seq: u64,
    pub created_at: f64,
    pub updated_at: f64,
    pub active: bool,
    pub active_at: f64,
    #[serde(deserialize_with = "nullable")]
    pub metadata: Option<Metadata>,
    #[ts(type = "number")]
    pub metadata_version: u64,
    #[serde(deserialize_with = "nullable")]
    pub agent_state: Option<AgentState>,
    #[ts(type = "number")]
    pub agent_state_version: u64,
    pub thinking: bool,
    pub thinking_at: f64,
    #[ts(type = "\"online\" | number")]
    pub presence: Presence,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<TodoItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_usage: Option<UsageSnapshot>,
    #[serde(skip)]
    #[ts(skip)]
    pub local: SessionLocal,
}

impl Session {
    pub fn flavor(&self) -> crate::modes::AgentFlavor {
        crate::modes::AgentFlavor::from_metadata(
            self.metadata.as_ref().and_then(|m| m.flavor.as_deref()),
        )
    }

    /// Display name: metadata name, then last path component, then id.
    pub fn display_name(&self) -> &str {
        let Some(meta) = &self.metadata else {
            return &self.id;
        };
        if let Some(name) = meta.name.as_deref() {
            return name;
        }
        meta.path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::parse;
    use serde_json::{Value, json};

    fn session_json() -> Value {
        json!({
            "id": "s1",
            "seq": 5,
            "createdAt": 1000,
            "updatedAt": 2000,
            "active": true,
            "activeAt": 1500,
            "metadata": {"path": "/home/user/project", "host": "myhost", "flavor": "codex"},
            "metadataVersion": 1,
            "agentState": null,
            "agentStateVersion": 0,
            "thinking": false,
            "thinkingAt": 0,
            "presence": "online",
            "todos": [{"content": "Fix bug", "status": "in_progress", "priority": "high", "id": "t1"}]
        })
    }

    #[test]
    fn parses_session() {
        let session: Session = parse(&session_json()).unwrap();
        assert_eq!(session.seq, 5);
        assert!(session.presence.is_online());
        assert_eq!(session.flavor(), crate::modes::AgentFlavor::Codex);
        assert_eq!(session.display_name(), "project");
        assert_eq!(session.latest_usage, None);
        assert!(session.local.is_empty());
    }

    #[test]
    fn inbound_local_fields_are_ignored() {
        let mut json = session_json();
        json["draft"] = json!("half-written");
        json["permissionMode"] = json!("yolo");
        json["modelMode"] = json!("not-a-mode");
        let session: Session = parse(&json).unwrap();
        assert!(session.local.is_empty());
    }

    #[test]
    fn local_fields_are_never_serialized() {
        let mut session: Session = parse(&session_json()).unwrap();
        session.local = SessionLocal {
            draft: Some("draft".into()),
            permission_mode: Some(PermissionMode::Plan),
            model_mode: Some(ModelMode::Opus),
        };
        let json = serde_json::to_value(&session).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("draft"));
        assert!(!obj.contains_key("permissionMode"));
        assert!(!obj.contains_key("modelMode"));
        assert!(!obj.contains_key("local"));

        let back: Session = parse(&json).unwrap();
        session.local = SessionLocal::default();
        assert_eq!(session, back);
    }

    #[test]
    fn presence_forms() {
        assert_eq!(parse::<Presence>(&json!("online")).unwrap(), Presence::Online);
        assert_eq!(parse::<Presence>(&json!(1234)).unwrap(), Presence::LastSeen(1234.0));
        assert_eq!(parse::<Presence>(&json!(12.5)).unwrap(), Presence::LastSeen(12.5));
        assert!(parse::<Presence>(&json!("offline")).is_err());
        assert!(parse::<Presence>(&json!(null)).is_err());
        assert_eq!(
            serde_json::to_value(Presence::LastSeen(99.0)).unwrap(),
            json!(99.0)
        );
    }

    #[test]
    fn metadata_key_is_nullable_not_optional() {
        let mut json = session_json();
        json.as_object_mut().unwrap().remove("metadata");
        let err = parse::<Session>(&json).unwrap_err();
        assert_eq!(err.path.as_str(), "metadata");
        assert_eq!(err.message, "missing field `metadata`");
    }

    #[test]
    fn nested_agent_state_error_path() {
        let mut json = session_json();
        json["agentState"] = json!({"requests": {"r1": {"arguments": {}}}});
        let err = parse::<Session>(&json).unwrap_err();
        assert_eq!(err.path.as_str(), "agentState.requests.r1.tool");
    }

    #[test]
    fn latest_usage_parses() {
        let mut json = session_json();
        json["latestUsage"] = json!({
            "inputTokens": 10,
            "outputTokens": 20,
            "cacheCreation": 0,
            "cacheRead": 5,
            "contextSize": 35,
            "timestamp": 3000
        });
        let session: Session = parse(&json).unwrap();
        assert_eq!(session.latest_usage.unwrap().context_size, 35);
    }
}
