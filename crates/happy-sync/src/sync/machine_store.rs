use std::collections::HashMap;

use happy_shared::schemas::{
    Machine, MachineMetadata, MachinePatch, MachineUpdateRequest, Versioned,
    VersionedUpdateResult, merge_versioned,
};
use serde_json::Value;

use super::ApplyOutcome;
use super::alive_time::{clamp_alive_time, now_millis};
use super::event_publisher::{EventPublisher, StoreEvent};
use crate::error::StoreError;

const MACHINE_TIMEOUT_MS: i64 = 45_000;

pub struct MachineStore {
    machines: HashMap<String, Machine>,
    publisher: EventPublisher,
}

impl MachineStore {
    pub fn new(publisher: EventPublisher) -> Self {
        Self {
            machines: HashMap::new(),
            publisher,
        }
    }

    pub fn get(&self, machine_id: &str) -> Option<&Machine> {
        self.machines.get(machine_id)
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn list(&self) -> Vec<&Machine> {
        let mut all: Vec<&Machine> = self.machines.values().collect();
        all.sort_by(|a, b| a.display_label().cmp(b.display_label()).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn online(&self) -> Vec<&Machine> {
        self.list().into_iter().filter(|m| m.active).collect()
    }

    fn get_mut(&mut self, machine_id: &str) -> Result<&mut Machine, StoreError> {
        self.machines
            .get_mut(machine_id)
            .ok_or_else(|| StoreError::UnknownMachine(machine_id.to_string()))
    }

    fn emit_updated(&self, machine_id: &str) {
        self.publisher.emit(StoreEvent::MachineUpdated {
            machine_id: machine_id.to_string(),
        });
    }

    pub fn apply_machine(&mut self, incoming: Machine) -> ApplyOutcome {
        let id = incoming.id.clone();
        let Some(machine) = self.machines.get_mut(&id) else {
            tracing::debug!(machine_id = %id, seq = incoming.seq, "machine added");
            self.machines.insert(id.clone(), incoming);
            self.emit_updated(&id);
            return ApplyOutcome::Created;
        };

        if incoming.seq <= machine.seq {
            tracing::debug!(
                machine_id = %id,
                local_seq = machine.seq,
                incoming_seq = incoming.seq,
                "stale machine record ignored"
            );
            return ApplyOutcome::Stale;
        }

        let Machine {
            seq,
            created_at,
            updated_at,
            active,
            active_at,
            metadata,
            metadata_version,
            daemon_state,
            daemon_state_version,
            ..
        } = incoming;

        merge_versioned(
            &mut machine.metadata_version,
            &mut machine.metadata,
            Versioned::new(metadata_version, metadata),
        );
        merge_versioned(
            &mut machine.daemon_state_version,
            &mut machine.daemon_state,
            Versioned::new(daemon_state_version, daemon_state),
        );
        machine.seq = seq;
        machine.created_at = created_at;
        machine.updated_at = updated_at;
        machine.active = active;
        machine.active_at = active_at;

        self.emit_updated(&id);
        ApplyOutcome::Applied
    }

    pub fn apply_update(&mut self, patch: MachinePatch, seq: u64) -> Result<ApplyOutcome, StoreError> {
        let machine = self.get_mut(&patch.machine_id)?;

        let mut applied = false;
        if let Some(metadata) = patch.metadata {
            applied |= merge_versioned(&mut machine.metadata_version, &mut machine.metadata, metadata);
        }
        if let Some(state) = patch.daemon_state {
            applied |= merge_versioned(
                &mut machine.daemon_state_version,
                &mut machine.daemon_state,
                state,
            );
        }
        // Activity is not versioned. The flag applies whenever it changes;
        // the timestamp only moves forward.
        if let Some(active) = patch.active
            && active != machine.active
        {
            machine.active = active;
            applied = true;
        }
        if let Some(active_at) = patch.active_at
            && active_at > machine.active_at
        {
            machine.active_at = active_at;
            applied = true;
        }

        if !applied {
            tracing::debug!(machine_id = %patch.machine_id, seq, "stale machine update ignored");
            return Ok(ApplyOutcome::Stale);
        }

        machine.seq = machine.seq.max(seq);
        self.emit_updated(&patch.machine_id);
        Ok(ApplyOutcome::Applied)
    }

    pub fn remove(&mut self, machine_id: &str) -> Option<Machine> {
        let removed = self.machines.remove(machine_id)?;
        self.publisher.emit(StoreEvent::MachineRemoved {
            machine_id: machine_id.to_string(),
        });
        Some(removed)
    }

    pub fn handle_alive(&mut self, machine_id: &str, time: i64) -> bool {
        let Some(t) = clamp_alive_time(time, now_millis()) else {
            return false;
        };
        let Some(machine) = self.machines.get_mut(machine_id) else {
            return false;
        };
        machine.active = true;
        machine.active_at = machine.active_at.max(t as f64);
        self.emit_updated(machine_id);
        true
    }

    /// Mark a specific machine as offline (e.g. when its daemon disconnects).
    pub fn mark_offline(&mut self, machine_id: &str) {
        if let Some(machine) = self.machines.get_mut(machine_id)
            && machine.active
        {
            machine.active = false;
            self.emit_updated(machine_id);
        }
    }

    pub fn expire_inactive(&mut self, now: i64) -> usize {
        let expired: Vec<String> = self
            .machines
            .iter()
            .filter(|(_, m)| {
                m.active && now.saturating_sub(m.active_at as i64) > MACHINE_TIMEOUT_MS
            })
            .map(|(id, _)| id.clone())
            .collect();

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expiring inactive machines");
        }
        for id in &expired {
            tracing::debug!(machine_id = %id, "machine expired due to inactivity");
            self.mark_offline(id);
        }
        expired.len()
    }

    // --- Outbound ---

    pub fn metadata_update_request(
        &self,
        machine_id: &str,
        metadata: MachineMetadata,
    ) -> Result<MachineUpdateRequest<MachineMetadata>, StoreError> {
        let machine = self
            .get(machine_id)
            .ok_or_else(|| StoreError::UnknownMachine(machine_id.to_string()))?;
        Ok(MachineUpdateRequest {
            machine_id: machine_id.to_string(),
            expected_version: machine.metadata_version,
            value: Some(metadata),
        })
    }

    pub fn daemon_state_update_request(
        &self,
        machine_id: &str,
        state: Value,
    ) -> Result<MachineUpdateRequest<Value>, StoreError> {
        let machine = self
            .get(machine_id)
            .ok_or_else(|| StoreError::UnknownMachine(machine_id.to_string()))?;
        Ok(MachineUpdateRequest {
            machine_id: machine_id.to_string(),
            expected_version: machine.daemon_state_version,
            value: Some(state),
        })
    }

    pub fn apply_metadata_result(
        &mut self,
        machine_id: &str,
        result: VersionedUpdateResult<MachineMetadata>,
    ) -> Result<ApplyOutcome, StoreError> {
        let machine = self.get_mut(machine_id)?;
        let Some(incoming) = result.into_versioned() else {
            tracing::warn!(machine_id, "machine metadata update failed on server");
            return Ok(ApplyOutcome::Stale);
        };
        if !merge_versioned(&mut machine.metadata_version, &mut machine.metadata, incoming) {
            return Ok(ApplyOutcome::Stale);
        }
        self.emit_updated(machine_id);
        Ok(ApplyOutcome::Applied)
    }

    pub fn apply_daemon_state_result(
        &mut self,
        machine_id: &str,
        result: VersionedUpdateResult<Value>,
    ) -> Result<ApplyOutcome, StoreError> {
        let machine = self.get_mut(machine_id)?;
        let Some(incoming) = result.into_versioned() else {
            tracing::warn!(machine_id, "daemon state update failed on server");
            return Ok(ApplyOutcome::Stale);
        };
        if !merge_versioned(
            &mut machine.daemon_state_version,
            &mut machine.daemon_state,
            incoming,
        ) {
            return Ok(ApplyOutcome::Stale);
        }
        self.emit_updated(machine_id);
        Ok(ApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use happy_shared::parse;
    use serde_json::json;

    fn machine(seq: u64, metadata_version: u64, daemon_state_version: u64) -> Machine {
        parse(&json!({
            "id": "m1",
            "seq": seq,
            "createdAt": 1000,
            "updatedAt": 1000,
            "active": true,
            "activeAt": 1000,
            "metadata": {
                "host": format!("host-v{metadata_version}"),
                "platform": "darwin",
                "happyCliVersion": "0.10.0",
                "happyHomeDir": "/Users/u/.happy",
                "homeDir": "/Users/u"
            },
            "metadataVersion": metadata_version,
            "daemonState": {"status": "running", "v": daemon_state_version},
            "daemonStateVersion": daemon_state_version
        }))
        .unwrap()
    }

    fn store_with(m: Machine) -> MachineStore {
        let mut store = MachineStore::new(EventPublisher::default());
        assert_eq!(store.apply_machine(m), ApplyOutcome::Created);
        store
    }

    #[test]
    fn stale_records_are_discarded() {
        let mut store = store_with(machine(4, 2, 2));
        assert_eq!(store.apply_machine(machine(4, 9, 9)), ApplyOutcome::Stale);
        assert_eq!(store.apply_machine(machine(3, 9, 9)), ApplyOutcome::Stale);
        assert_eq!(store.get("m1").unwrap().metadata_version, 2);
    }

    #[test]
    fn fields_gate_independently() {
        let mut store = store_with(machine(1, 5, 1));
        assert_eq!(store.apply_machine(machine(2, 4, 3)), ApplyOutcome::Applied);
        let m = store.get("m1").unwrap();
        assert_eq!(m.metadata_version, 5);
        assert_eq!(m.metadata.as_ref().unwrap().host, "host-v5");
        assert_eq!(m.daemon_state_version, 3);
        assert_eq!(m.daemon_state.as_ref().unwrap()["v"], 3);
    }

    #[test]
    fn patch_applies_only_newer_versions() {
        let mut store = store_with(machine(1, 2, 2));
        let stale = MachinePatch {
            machine_id: "m1".into(),
            metadata: None,
            daemon_state: Some(Versioned::new(2, Some(json!({"status": "old"})))),
            active: None,
            active_at: None,
        };
        assert_eq!(store.apply_update(stale, 5).unwrap(), ApplyOutcome::Stale);
        assert_eq!(store.get("m1").unwrap().seq, 1);

        let fresh = MachinePatch {
            machine_id: "m1".into(),
            metadata: None,
            daemon_state: Some(Versioned::new(3, None)),
            active: Some(false),
            active_at: Some(2000.0),
        };
        assert_eq!(store.apply_update(fresh, 5).unwrap(), ApplyOutcome::Applied);
        let m = store.get("m1").unwrap();
        assert_eq!(m.daemon_state, None);
        assert!(!m.active);
        assert_eq!(m.seq, 5);
    }

    #[test]
    fn active_flag_applies_without_timestamp() {
        let mut store = store_with(machine(1, 1, 1));
        let offline = MachinePatch {
            machine_id: "m1".into(),
            metadata: None,
            daemon_state: None,
            active: Some(false),
            active_at: None,
        };
        assert_eq!(store.apply_update(offline.clone(), 2).unwrap(), ApplyOutcome::Applied);
        let m = store.get("m1").unwrap();
        assert!(!m.active);
        assert_eq!(m.active_at, 1000.0);
        assert_eq!(m.seq, 2);

        assert_eq!(store.apply_update(offline, 3).unwrap(), ApplyOutcome::Stale);
        assert_eq!(store.get("m1").unwrap().seq, 2);
    }

    #[test]
    fn expiry_handles_out_of_range_active_at() {
        let mut m = machine(1, 1, 1);
        m.active_at = -1e19;
        let mut store = store_with(m);
        assert_eq!(store.expire_inactive(now_millis()), 1);
        assert!(store.online().is_empty());

        let mut m = machine(1, 1, 1);
        m.active_at = 1e19;
        let mut store = store_with(m);
        assert_eq!(store.expire_inactive(i64::MIN), 0);
    }

    #[test]
    fn unknown_machine_patch_fails() {
        let mut store = MachineStore::new(EventPublisher::default());
        let patch = MachinePatch {
            machine_id: "nope".into(),
            metadata: None,
            daemon_state: None,
            active: None,
            active_at: None,
        };
        assert!(matches!(
            store.apply_update(patch, 1),
            Err(StoreError::UnknownMachine(_))
        ));
    }

    #[test]
    fn expiry_marks_offline() {
        let mut store = store_with(machine(1, 1, 1));
        assert_eq!(store.expire_inactive(1000 + 45_000), 0);
        assert_eq!(store.expire_inactive(1000 + 45_001), 1);
        assert!(store.online().is_empty());
        assert!(store.handle_alive("m1", now_millis()));
        assert_eq!(store.online().len(), 1);
    }

    #[test]
    fn outbound_and_replies() {
        let mut store = store_with(machine(1, 3, 6));
        let req = store
            .daemon_state_update_request("m1", json!({"status": "shutting-down"}))
            .unwrap();
        assert_eq!(req.expected_version, 6);

        let reply = VersionedUpdateResult::Success {
            version: 7,
            value: Some(json!({"status": "shutting-down"})),
        };
        assert_eq!(
            store.apply_daemon_state_result("m1", reply.clone()).unwrap(),
            ApplyOutcome::Applied
        );
        assert_eq!(
            store.apply_daemon_state_result("m1", reply).unwrap(),
            ApplyOutcome::Stale
        );
        assert_eq!(
            store
                .metadata_update_request("m1", store.get("m1").unwrap().metadata.clone().unwrap())
                .unwrap()
                .expected_version,
            3
        );
    }
}
