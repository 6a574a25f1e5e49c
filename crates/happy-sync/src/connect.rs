//! Hand-off of terminal connection requests to the connection manager.
//!
//! The URI is passed through untouched: parsing and rejecting malformed
//! `happy://terminal?...` links is the connector's job.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectRequest {
    /// Payload decoded from a scanned QR code.
    Scanned(String),
    /// URI typed or pasted by the user.
    Manual(String),
}

impl ConnectRequest {
    pub fn source(&self) -> &'static str {
        match self {
            Self::Scanned(_) => "scan",
            Self::Manual(_) => "manual",
        }
    }

    fn raw(&self) -> &str {
        match self {
            Self::Scanned(s) | Self::Manual(s) => s,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no connection URL provided")]
    Empty,
    #[error(transparent)]
    Connector(#[from] anyhow::Error),
}

pub trait TerminalConnector {
    fn connect(&self, url: &str) -> anyhow::Result<()>;
}

pub fn connect_terminal(
    connector: &dyn TerminalConnector,
    request: &ConnectRequest,
) -> Result<(), ConnectError> {
    let url = request.raw().trim();
    if url.is_empty() {
        return Err(ConnectError::Empty);
    }
    tracing::info!(source = request.source(), "connecting terminal");
    connector.connect(url)?;
    Ok(())
}
