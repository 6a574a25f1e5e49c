use std::collections::HashMap;

use happy_shared::modes::{
    ModelMode, PermissionMode, is_model_mode_allowed_for_flavor,
    is_permission_mode_allowed_for_flavor,
};
use happy_shared::schemas::{
    AgentState, Metadata, Presence, Session, SessionLocal, SessionPatch, SessionUpdateRequest,
    Versioned, VersionedUpdateResult, merge_versioned,
};

use super::ApplyOutcome;
use super::alive_time::{clamp_alive_time, now_millis};
use super::event_publisher::{EventPublisher, StoreEvent};
use crate::error::StoreError;

const SESSION_TIMEOUT_MS: i64 = 30_000;

/// Client-side view of every known session. Server fields only change
/// through version-gated merges; `SessionLocal` only changes through the
/// local setters.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    publisher: EventPublisher,
}

/// Merge a versioned agent state, refusing successors that break the
/// request lifecycle.
fn merge_agent_state(
    session: &mut Session,
    incoming: Versioned<AgentState>,
) -> Result<bool, StoreError> {
    if incoming.version <= session.agent_state_version {
        return Ok(false);
    }
    if let (Some(prev), Some(next)) = (&session.agent_state, &incoming.value) {
        prev.check_transition(next)
            .map_err(|source| StoreError::Lifecycle {
                session_id: session.id.clone(),
                source,
            })?;
    }
    Ok(merge_versioned(
        &mut session.agent_state_version,
        &mut session.agent_state,
        incoming,
    ))
}

impl SessionStore {
    pub fn new(publisher: EventPublisher) -> Self {
        Self {
            sessions: HashMap::new(),
            publisher,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Most recently updated first.
    pub fn list(&self) -> Vec<&Session> {
        let mut all: Vec<&Session> = self.sessions.values().collect();
        all.sort_by(|a, b| {
            b.updated_at
                .total_cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    pub fn active(&self) -> Vec<&Session> {
        self.list().into_iter().filter(|s| s.active).collect()
    }

    fn get_mut(&mut self, session_id: &str) -> Result<&mut Session, StoreError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))
    }

    /// Apply a full session record from the server.
    pub fn apply_session(&mut self, mut incoming: Session) -> Result<ApplyOutcome, StoreError> {
        incoming.local = SessionLocal::default();

        if !self.sessions.contains_key(&incoming.id) {
            let id = incoming.id.clone();
            tracing::debug!(session_id = %id, seq = incoming.seq, "session added");
            self.sessions.insert(id.clone(), incoming);
            self.publisher
                .emit(StoreEvent::SessionUpdated { session_id: id });
            return Ok(ApplyOutcome::Created);
        }

        let session = self.get_mut(&incoming.id)?;
        if incoming.seq <= session.seq {
            tracing::debug!(
                session_id = %incoming.id,
                local_seq = session.seq,
                incoming_seq = incoming.seq,
                "stale session record ignored"
            );
            return Ok(ApplyOutcome::Stale);
        }

        let Session {
            id,
            seq,
            created_at,
            updated_at,
            active,
            active_at,
            metadata,
            metadata_version,
            agent_state,
            agent_state_version,
            thinking,
            thinking_at,
            presence,
            todos,
            latest_usage,
            local: _,
        } = incoming;

        merge_agent_state(session, Versioned::new(agent_state_version, agent_state))?;
        merge_versioned(
            &mut session.metadata_version,
            &mut session.metadata,
            Versioned::new(metadata_version, metadata),
        );
        session.seq = seq;
        session.created_at = created_at;
        session.updated_at = updated_at;
        session.active = active;
        session.active_at = active_at;
        session.thinking = thinking;
        session.thinking_at = thinking_at;
        session.presence = presence;
        session.todos = todos;
        session.latest_usage = latest_usage;

        self.publisher
            .emit(StoreEvent::SessionUpdated { session_id: id });
        Ok(ApplyOutcome::Applied)
    }

    /// Apply a partial update. Each versioned part is merged independently.
    pub fn apply_update(&mut self, patch: SessionPatch, seq: u64) -> Result<ApplyOutcome, StoreError> {
        let session = self.get_mut(&patch.id)?;

        // Agent state first: a lifecycle violation must reject the whole patch.
        let mut applied = match patch.agent_state {
            Some(state) => merge_agent_state(session, state)?,
            None => false,
        };
        if let Some(metadata) = patch.metadata {
            applied |= merge_versioned(&mut session.metadata_version, &mut session.metadata, metadata);
        }

        if !applied {
            tracing::debug!(session_id = %patch.id, seq, "stale session update ignored");
            return Ok(ApplyOutcome::Stale);
        }

        session.seq = session.seq.max(seq);
        self.publisher
            .emit(StoreEvent::SessionUpdated { session_id: patch.id });
        Ok(ApplyOutcome::Applied)
    }

    pub fn remove(&mut self, session_id: &str) -> Option<Session> {
        let removed = self.sessions.remove(session_id)?;
        self.publisher.emit(StoreEvent::SessionRemoved {
            session_id: session_id.to_string(),
        });
        Some(removed)
    }

    // --- Presence ---

    pub fn handle_alive(&mut self, session_id: &str, time: i64, thinking: bool) -> bool {
        let Some(t) = clamp_alive_time(time, now_millis()) else {
            tracing::debug!(session_id, time, "alive ping outside accepted window");
            return false;
        };
        let Some(session) = self.sessions.get_mut(session_id) else {
            return false;
        };

        session.active = true;
        session.active_at = session.active_at.max(t as f64);
        session.thinking = thinking;
        session.thinking_at = t as f64;
        session.presence = Presence::Online;

        self.publisher.emit(StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        true
    }

    pub fn mark_offline(&mut self, session_id: &str) {
        if let Some(session) = self.sessions.get_mut(session_id)
            && (session.active || session.presence.is_online())
        {
            session.active = false;
            session.thinking = false;
            session.presence = Presence::LastSeen(session.active_at);
            self.publisher.emit(StoreEvent::SessionUpdated {
                session_id: session_id.to_string(),
            });
        }
    }

    pub fn expire_inactive(&mut self, now: i64) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| {
                s.active && now.saturating_sub(s.active_at as i64) > SESSION_TIMEOUT_MS
            })
            .map(|(id, _)| id.clone())
            .collect();

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expiring inactive sessions");
        }
        for id in &expired {
            tracing::debug!(session_id = %id, "session expired due to inactivity");
            self.mark_offline(id);
        }
        expired.len()
    }

    // --- Local-only state ---

    pub fn local(&self, session_id: &str) -> Option<&SessionLocal> {
        self.sessions.get(session_id).map(|s| &s.local)
    }

    /// A blank draft clears it.
    pub fn set_draft(&mut self, session_id: &str, draft: Option<&str>) -> Result<(), StoreError> {
        let session = self.get_mut(session_id)?;
        let draft = draft.filter(|d| !d.trim().is_empty()).map(String::from);
        if session.local.draft == draft {
            return Ok(());
        }
        session.local.draft = draft;
        self.publisher.emit(StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    pub fn set_permission_mode(
        &mut self,
        session_id: &str,
        mode: PermissionMode,
    ) -> Result<(), StoreError> {
        let session = self.get_mut(session_id)?;
        let flavor = session.flavor();
        if !is_permission_mode_allowed_for_flavor(mode, flavor) {
            return Err(StoreError::ModeNotAllowed { mode, flavor });
        }
        session.local.permission_mode = Some(mode);
        self.publisher.emit(StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    /// Advance the permission mode to the next one offered for the
    /// session's flavor.
    pub fn cycle_permission_mode(&mut self, session_id: &str) -> Result<PermissionMode, StoreError> {
        let session = self.get_mut(session_id)?;
        let current = session.local.permission_mode.unwrap_or_default();
        let next = current.next_for(session.flavor());
        self.set_permission_mode(session_id, next)?;
        Ok(next)
    }

    /// `None` clears the selection.
    pub fn set_model_mode(&mut self, session_id: &str, mode: Option<ModelMode>) -> Result<(), StoreError> {
        let session = self.get_mut(session_id)?;
        if let Some(mode) = mode {
            let flavor = session.flavor();
            if !is_model_mode_allowed_for_flavor(mode, flavor) {
                return Err(StoreError::ModelModeNotAllowed { mode, flavor });
            }
        }
        session.local.model_mode = mode;
        self.publisher.emit(StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(())
    }

    pub fn export_local(&self) -> HashMap<String, SessionLocal> {
        self.sessions
            .iter()
            .filter(|(_, s)| !s.local.is_empty())
            .map(|(id, s)| (id.clone(), s.local.clone()))
            .collect()
    }

    /// Restore persisted local state. Entries for unknown sessions are skipped.
    pub fn restore_local(&mut self, entries: HashMap<String, SessionLocal>) -> usize {
        let mut restored = 0;
        for (id, local) in entries {
            match self.sessions.get_mut(&id) {
                Some(session) => {
                    session.local = local;
                    restored += 1;
                }
                None => tracing::debug!(session_id = %id, "skipping local state for unknown session"),
            }
        }
        restored
    }

    // --- Outbound ---

    pub fn metadata_update_request(
        &self,
        session_id: &str,
        metadata: Metadata,
    ) -> Result<SessionUpdateRequest<Metadata>, StoreError> {
        let session = self
            .get(session_id)
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))?;
        Ok(SessionUpdateRequest {
            sid: session_id.to_string(),
            expected_version: session.metadata_version,
            value: Some(metadata),
        })
    }

    pub fn agent_state_update_request(
        &self,
        session_id: &str,
        state: AgentState,
    ) -> Result<SessionUpdateRequest<AgentState>, StoreError> {
        let session = self
            .get(session_id)
            .ok_or_else(|| StoreError::UnknownSession(session_id.to_string()))?;
        if let Some(prev) = &session.agent_state {
            prev.check_transition(&state)
                .map_err(|source| StoreError::Lifecycle {
                    session_id: session_id.to_string(),
                    source,
                })?;
        }
        Ok(SessionUpdateRequest {
            sid: session_id.to_string(),
            expected_version: session.agent_state_version,
            value: Some(state),
        })
    }

    pub fn apply_metadata_result(
        &mut self,
        session_id: &str,
        result: VersionedUpdateResult<Metadata>,
    ) -> Result<ApplyOutcome, StoreError> {
        let session = self.get_mut(session_id)?;
        let Some(incoming) = result.into_versioned() else {
            tracing::warn!(session_id, "metadata update failed on server");
            return Ok(ApplyOutcome::Stale);
        };
        if !merge_versioned(&mut session.metadata_version, &mut session.metadata, incoming) {
            return Ok(ApplyOutcome::Stale);
        }
        self.publisher.emit(StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(ApplyOutcome::Applied)
    }

    pub fn apply_agent_state_result(
        &mut self,
        session_id: &str,
        result: VersionedUpdateResult<AgentState>,
    ) -> Result<ApplyOutcome, StoreError> {
        let session = self.get_mut(session_id)?;
        let Some(incoming) = result.into_versioned() else {
            tracing::warn!(session_id, "agent state update failed on server");
            return Ok(ApplyOutcome::Stale);
        };
        if !merge_agent_state(session, incoming)? {
            return Ok(ApplyOutcome::Stale);
        }
        self.publisher.emit(StoreEvent::SessionUpdated {
            session_id: session_id.to_string(),
        });
        Ok(ApplyOutcome::Applied)
    }
}
