use clap::ValueEnum;
use happy_shared::schemas::{
    AgentState, GitStatus, Machine, MachineMetadata, Metadata, Session, SyncUpdate,
};
use happy_shared::{ValidationError, parse_str};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::common::read_input;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Session,
    Machine,
    AgentState,
    GitStatus,
    Metadata,
    MachineMetadata,
    Update,
}

fn normalize<T: DeserializeOwned + Serialize>(input: &str) -> Result<Value, ValidationError> {
    let record: T = parse_str(input)?;
    // Serializing a schema type into a Value cannot fail: every map key is a string.
    Ok(serde_json::to_value(&record).unwrap_or(Value::Null))
}

/// Validate `input` as `kind` and return its normalized wire form.
pub fn validate(kind: RecordKind, input: &str) -> Result<Value, ValidationError> {
    match kind {
        RecordKind::Session => normalize::<Session>(input),
        RecordKind::Machine => normalize::<Machine>(input),
        RecordKind::AgentState => normalize::<AgentState>(input),
        RecordKind::GitStatus => normalize::<GitStatus>(input),
        RecordKind::Metadata => normalize::<Metadata>(input),
        RecordKind::MachineMetadata => normalize::<MachineMetadata>(input),
        RecordKind::Update => normalize::<SyncUpdate>(input),
    }
}

pub fn run(kind: RecordKind, path: &str) -> anyhow::Result<()> {
    let input = read_input(path)?;
    match validate(kind, &input) {
        Ok(normalized) => {
            println!("{}", serde_json::to_string_pretty(&normalized)?);
            Ok(())
        }
        Err(e) => {
            tracing::debug!(path = %e.path, "validation failed");
            anyhow::bail!("{e}")
        }
    }
}
