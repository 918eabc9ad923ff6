//! Session errors

/// Errors raised while talking to the game server or deciding a turn
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to encode action: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Entity {0} missing from world state")]
    MissingEntity(String),

    #[error("Transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed before end of session")]
    ConnectionClosed,
}

impl BotError {
    /// Recoverable errors skip the current turn, everything else ends the session
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingEntity(_))
    }
}
