use note_relay_core::relay::RelayService;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct AppState {
    pub relay: RelayService,
}

impl AppState {
    pub fn new(relay: RelayService) -> Self {
        Self { relay }
    }
}

/// Body returned for failed requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    /// `decode` or `relay`
    pub kind: String,
    pub message: String,
    /// Set when the message was stored locally but not relayed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}
