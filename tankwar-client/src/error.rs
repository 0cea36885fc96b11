//! Error types for the wire protocol and the game loop

use thiserror::Error;

use tankwar_core::WorldError;

use crate::codec::ResultCode;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed with {missing} bytes of the frame outstanding")]
    ConnectionClosed { missing: usize },

    #[error("server rejected request ({code}): {message}")]
    Server { code: ResultCode, message: String },

    #[error("server timed out: {message}")]
    Timeout { message: String },

    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { len: usize, limit: usize },
}

impl ProtocolError {
    /// The connection is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_) | ProtocolError::ConnectionClosed { .. } | ProtocolError::FrameTooLarge { .. }
        )
    }
}

/// Failures that end a game
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error("failed to spawn agent thread: {0}")]
    Spawn(std::io::Error),
}
