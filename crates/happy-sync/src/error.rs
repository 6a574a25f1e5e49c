use happy_shared::ValidationError;
use happy_shared::modes::{AgentFlavor, ModelMode, PermissionMode};
use happy_shared::schemas::LifecycleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("agent state for session `{session_id}` rejected: {source}")]
    Lifecycle {
        session_id: String,
        #[source]
        source: LifecycleError,
    },

    #[error("unknown session `{0}`")]
    UnknownSession(String),

    #[error("unknown machine `{0}`")]
    UnknownMachine(String),

    #[error("permission mode {mode:?} is not available for {flavor:?} sessions")]
    ModeNotAllowed {
        mode: PermissionMode,
        flavor: AgentFlavor,
    },

    #[error("model mode {mode:?} is not available for {flavor:?} sessions")]
    ModelModeNotAllowed { mode: ModelMode, flavor: AgentFlavor },
}
