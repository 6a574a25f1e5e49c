//! Agent permission requests, decisions, and state tracking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;

use crate::validate::field_error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct AgentStateRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
#[ts(rename_all = "lowercase")]
pub enum CompletedRequestStatus {
    Canceled,
    Denied,
    Approved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
#[ts(rename_all = "snake_case")]
pub enum PermissionDecision {
    Approved,
    ApprovedForSession,
    Denied,
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct AgentStateCompletedRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,
    pub status: CompletedRequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<PermissionDecision>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase", try_from = "AgentStateFields")]
#[ts(export)]
#[ts(rename_all = "camelCase")]
pub struct AgentState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controlled_by_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<HashMap<String, AgentStateRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_requests: Option<HashMap<String, AgentStateCompletedRequest>>,
}

/// Outcome recorded when a pending request is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: CompletedRequestStatus,
    pub completed_at: Option<f64>,
    pub reason: Option<String>,
    pub mode: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub decision: Option<PermissionDecision>,
}

impl Completion {
    pub fn new(status: CompletedRequestStatus) -> Self {
        Self {
            status,
            completed_at: None,
            reason: None,
            mode: None,
            allowed_tools: None,
            decision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("request `{0}` is not pending")]
    NotPending(String),
    #[error("request `{0}` is already completed")]
    AlreadyCompleted(String),
    #[error("completed request `{0}` reappeared as pending")]
    Revived(String),
    #[error("completed request `{id}` changed status from {from:?} to {to:?}")]
    StatusChanged {
        id: String,
        from: CompletedRequestStatus,
        to: CompletedRequestStatus,
    },
}

impl AgentState {
    pub fn is_pending(&self, id: &str) -> bool {
        self.requests.as_ref().is_some_and(|r| r.contains_key(id))
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed_requests
            .as_ref()
            .is_some_and(|r| r.contains_key(id))
    }

    pub fn pending_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .requests
            .iter()
            .flat_map(|r| r.keys().map(String::as_str))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn add_request(
        &mut self,
        id: impl Into<String>,
        request: AgentStateRequest,
    ) -> Result<(), LifecycleError> {
        let id = id.into();
        if self.is_completed(&id) {
            return Err(LifecycleError::AlreadyCompleted(id));
        }
        self.requests.get_or_insert_with(HashMap::new).insert(id, request);
        Ok(())
    }

    /// Move a pending request into `completedRequests`.
    pub fn complete(&mut self, id: &str, completion: Completion) -> Result<(), LifecycleError> {
        if self.is_completed(id) {
            return Err(LifecycleError::AlreadyCompleted(id.to_string()));
        }
        let request = self
            .requests
            .as_mut()
            .and_then(|r| r.remove(id))
            .ok_or_else(|| LifecycleError::NotPending(id.to_string()))?;

        let completed = AgentStateCompletedRequest {
            tool: request.tool,
            arguments: request.arguments,
            created_at: request.created_at,
            completed_at: completion.completed_at,
            status: completion.status,
            reason: completion.reason,
            mode: completion.mode,
            allowed_tools: completion.allowed_tools,
            decision: completion.decision,
        };
        self.completed_requests
            .get_or_insert_with(HashMap::new)
            .insert(id.to_string(), completed);
        Ok(())
    }

    /// Check that `next` is a legal successor of `self`: completed requests
    /// stay completed with the same terminal status.
    pub fn check_transition(&self, next: &AgentState) -> Result<(), LifecycleError> {
        let Some(done) = &self.completed_requests else {
            return Ok(());
        };
        for (id, prev) in done {
            if next.is_pending(id) {
                return Err(LifecycleError::Revived(id.clone()));
            }
            if let Some(now) = next.completed_requests.as_ref().and_then(|c| c.get(id))
                && now.status != prev.status
            {
                return Err(LifecycleError::StatusChanged {
                    id: id.clone(),
                    from: prev.status,
                    to: now.status,
                });
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentStateFields {
    controlled_by_user: Option<bool>,
    requests: Option<HashMap<String, AgentStateRequest>>,
    completed_requests: Option<HashMap<String, AgentStateCompletedRequest>>,
}

impl TryFrom<AgentStateFields> for AgentState {
    type Error = String;

    /// A request id lives in exactly one of the two maps.
    fn try_from(f: AgentStateFields) -> Result<Self, Self::Error> {
        if let (Some(pending), Some(done)) = (&f.requests, &f.completed_requests) {
            let mut both: Vec<&String> = done.keys().filter(|id| pending.contains_key(*id)).collect();
            both.sort_unstable();
            if let Some(id) = both.first() {
                return Err(field_error(
                    &format!("completedRequests.{id}"),
                    "request is also pending",
                ));
            }
        }
        Ok(Self {
            controlled_by_user: f.controlled_by_user,
            requests: f.requests,
            completed_requests: f.completed_requests,
        })
    }
}
