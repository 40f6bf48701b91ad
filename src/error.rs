use thiserror::Error;

/// Failures surfaced by the client session, the statistics provider and the
/// import endpoints. Each variant is handled at the loop boundary that owns it.
#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("client discovery failed: {0}")]
    Discovery(String),

    #[error("client rejected credentials (status {0})")]
    Auth(u16),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("event stream error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("unexpected http status {status} from {path}")]
    Status { status: u16, path: String },

    #[error("unexpected payload: {0}")]
    Payload(String),

    #[error("build selection failed: {0}")]
    Selection(#[from] SelectionError),
}

impl From<serde_json::Error> for CompanionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Payload(err.to_string())
    }
}

/// No viable candidate at some step of build selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("provider returned no builds")]
    NoBuilds,

    #[error("no rune candidates for perk slot {0}")]
    EmptyRuneSlot(usize),

    #[error("no starting item candidates")]
    NoStartingItems,

    #[error("no completed item candidates")]
    NoCompletedItems,

    #[error("no completed item candidates for build index {0}")]
    EmptyItemSlot(usize),
}
