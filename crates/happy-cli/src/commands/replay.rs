use happy_sync::{ApplyOutcome, SyncState};

use super::common::read_input;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub created: usize,
    pub applied: usize,
    pub stale: usize,
    pub rejected: Vec<(usize, String)>,
}

/// Apply every non-blank line of `input` as a sync update. Rejected lines
/// are recorded with their 1-based line number and do not stop the replay.
pub fn replay(state: &mut SyncState, input: &str) -> ReplayReport {
    let mut report = ReplayReport::default();
    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match state.apply_line(line) {
            Ok(ApplyOutcome::Created) => report.created += 1,
            Ok(ApplyOutcome::Applied) => report.applied += 1,
            Ok(ApplyOutcome::Stale) => report.stale += 1,
            Err(e) => report.rejected.push((idx + 1, e.to_string())),
        }
    }
    report
}

pub fn run(path: &str) -> anyhow::Result<()> {
    let input = read_input(path)?;
    let mut state = SyncState::new();
    let report = replay(&mut state, &input);

    tracing::info!(
        created = report.created,
        applied = report.applied,
        stale = report.stale,
        rejected = report.rejected.len(),
        "replay finished"
    );

    println!(
        "created: {}  applied: {}  stale: {}  rejected: {}",
        report.created,
        report.applied,
        report.stale,
        report.rejected.len()
    );
    for (line, err) in &report.rejected {
        println!("  line {line}: {err}");
    }

    println!("\nSessions:");
    for s in state.sessions().list() {
        let presence = if s.presence.is_online() { "online" } else { "offline" };
        println!(
            "  {}  {}  seq={} metadata@{} agentState@{} {}",
            s.id,
            s.display_name(),
            s.seq,
            s.metadata_version,
            s.agent_state_version,
            presence
        );
        if let Some(state) = &s.agent_state {
            let pending = state.pending_ids();
            if !pending.is_empty() {
                println!("    pending requests: {}", pending.join(", "));
            }
        }
    }

    println!("\nMachines:");
    for m in state.machines().list() {
        println!(
            "  {}  {}  seq={} metadata@{} daemonState@{} {}",
            m.id,
            m.display_label(),
            m.seq,
            m.metadata_version,
            m.daemon_state_version,
            if m.active { "online" } else { "offline" }
        );
    }

    Ok(())
}
