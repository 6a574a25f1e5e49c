pub mod alive_time;
pub mod event_publisher;
pub mod machine_store;
pub mod session_store;

use std::fmt;

use happy_shared::schemas::{SyncUpdate, UpdateBody};
use happy_shared::{ValidationError, parse, parse_str};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;
use event_publisher::{EventPublisher, StoreEvent};
use machine_store::MachineStore;
use session_store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Applied,
    /// Discarded because the local copy is at least as new.
    Stale,
}

impl ApplyOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Applied => "applied",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes inbound sync updates to the session and machine stores.
pub struct SyncState {
    publisher: EventPublisher,
    sessions: SessionStore,
    machines: MachineStore,
}

impl SyncState {
    pub fn new() -> Self {
        let publisher = EventPublisher::default();
        Self {
            sessions: SessionStore::new(publisher.clone()),
            machines: MachineStore::new(publisher.clone()),
            publisher,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.publisher.subscribe()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    pub fn machines(&self) -> &MachineStore {
        &self.machines
    }

    pub fn machines_mut(&mut self) -> &mut MachineStore {
        &mut self.machines
    }

    pub fn apply(&mut self, update: SyncUpdate) -> Result<ApplyOutcome, StoreError> {
        let kind = update.body.kind();
        let outcome = match update.body {
            UpdateBody::NewSession(session) => self.sessions.apply_session(session)?,
            UpdateBody::UpdateSession(patch) => self.sessions.apply_update(patch, update.seq)?,
            UpdateBody::DeleteSession { sid } => match self.sessions.remove(&sid) {
                Some(_) => ApplyOutcome::Applied,
                None => ApplyOutcome::Stale,
            },
            UpdateBody::NewMachine(machine) => self.machines.apply_machine(machine),
            UpdateBody::UpdateMachine(patch) => self.machines.apply_update(patch, update.seq)?,
        };
        match outcome {
            ApplyOutcome::Stale => {
                tracing::debug!(update_id = %update.id, seq = update.seq, kind, "update discarded")
            }
            _ => tracing::trace!(update_id = %update.id, seq = update.seq, kind, %outcome, "update applied"),
        }
        Ok(outcome)
    }

    /// Validate a raw payload before applying it.
    pub fn apply_json(&mut self, value: &Value) -> Result<ApplyOutcome, StoreError> {
        let update: SyncUpdate = parse(value).inspect_err(|e| log_rejected(e))?;
        self.apply(update)
    }

    pub fn apply_line(&mut self, line: &str) -> Result<ApplyOutcome, StoreError> {
        let update: SyncUpdate = parse_str(line).inspect_err(|e| log_rejected(e))?;
        self.apply(update)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

fn log_rejected(err: &ValidationError) {
    tracing::warn!(
        path = %err.path,
        message = %err.message,
        "rejected malformed sync update"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_session(seq: u64) -> Value {
        json!({
            "id": format!("u{seq}"),
            "seq": seq,
            "createdAt": 1000,
            "body": {
                "t": "new-session",
                "id": "s1",
                "seq": seq,
                "createdAt": 1000,
                "updatedAt": 1000,
                "active": false,
                "activeAt": 900,
                "metadata": {"path": "/p", "host": "h"},
                "metadataVersion": 1,
                "agentState": null,
                "agentStateVersion": 0,
                "thinking": false,
                "thinkingAt": 0,
                "presence": 900
            }
        })
    }

    #[test]
    fn routes_session_lifecycle() {
        let mut state = SyncState::new();
        let mut rx = state.subscribe();

        assert_eq!(state.apply_json(&new_session(1)).unwrap(), ApplyOutcome::Created);
        assert_eq!(state.apply_json(&new_session(1)).unwrap(), ApplyOutcome::Stale);

        let update = json!({
            "id": "u2",
            "seq": 2,
            "createdAt": 1100,
            "body": {
                "t": "update-session",
                "id": "s1",
                "metadata": {"version": 2, "value": {"path": "/p", "host": "h", "name": "renamed"}}
            }
        });
        assert_eq!(state.apply_json(&update).unwrap(), ApplyOutcome::Applied);
        assert_eq!(state.apply_json(&update).unwrap(), ApplyOutcome::Stale);
        let s = state.sessions().get("s1").unwrap();
        assert_eq!(s.metadata.as_ref().unwrap().name.as_deref(), Some("renamed"));

        let delete = json!({"id": "u3", "seq": 3, "createdAt": 1200, "body": {"t": "delete-session", "sid": "s1"}});
        assert_eq!(state.apply_json(&delete).unwrap(), ApplyOutcome::Applied);
        assert_eq!(state.apply_json(&delete).unwrap(), ApplyOutcome::Stale);

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        assert_eq!(
            events.last(),
            Some(&StoreEvent::SessionRemoved {
                session_id: "s1".into()
            })
        );
    }

    #[test]
    fn malformed_update_reports_field_path() {
        let mut state = SyncState::new();
        let mut bad = new_session(1);
        bad["body"]["presence"] = json!("away");
        let err = state.apply_json(&bad).unwrap_err();
        match err {
            StoreError::Validation(e) => assert_eq!(e.path.as_str(), "body.presence"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(state.sessions().is_empty());
    }

    #[test]
    fn apply_line_parses_json() {
        let mut state = SyncState::new();
        let line = serde_json::to_string(&new_session(1)).unwrap();
        assert_eq!(state.apply_line(&line).unwrap(), ApplyOutcome::Created);
        assert!(matches!(
            state.apply_line("{oops"),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn machine_updates_route_to_machine_store() {
        let mut state = SyncState::new();
        let new_machine = json!({
            "id": "u1",
            "seq": 1,
            "createdAt": 1,
            "body": {
                "t": "new-machine",
                "id": "m1",
                "seq": 1,
                "createdAt": 1,
                "updatedAt": 1,
                "active": false,
                "activeAt": 1,
                "metadata": null,
                "metadataVersion": 0,
                "daemonState": null,
                "daemonStateVersion": 0
            }
        });
        assert_eq!(state.apply_json(&new_machine).unwrap(), ApplyOutcome::Created);

        let patch = json!({
            "id": "u2",
            "seq": 2,
            "createdAt": 2,
            "body": {"t": "update-machine", "machineId": "m1", "daemonState": {"version": 1, "value": {"pid": 7}}}
        });
        assert_eq!(state.apply_json(&patch).unwrap(), ApplyOutcome::Applied);
        assert_eq!(
            state.machines().get("m1").unwrap().daemon_state,
            Some(json!({"pid": 7}))
        );
    }
}
