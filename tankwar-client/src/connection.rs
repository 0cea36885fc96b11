//! Blocking request/response client for the game server

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tankwar_core::snapshot::ActionData;
use tankwar_core::{GameActions, GameSnapshot, Hex, MapInfo, PlayerInfo, VehicleId};

use crate::codec::{self, Action, ResultCode, DEFAULT_MAX_FRAME_LEN};
use crate::error::ProtocolError;

/// LOGIN payload. Unset options are left out of the document entirely.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_players: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_observer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_full: Option<bool>,
}

impl LoginRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_game(mut self, game: impl Into<String>) -> Self {
        self.game = Some(game.into());
        self
    }

    pub fn with_num_turns(mut self, turns: u32) -> Self {
        self.num_turns = Some(turns);
        self
    }

    pub fn with_num_players(mut self, players: u32) -> Self {
        self.num_players = Some(players);
        self
    }

    pub fn as_observer(mut self) -> Self {
        self.is_observer = Some(true);
        self
    }

    pub fn with_full(mut self, full: bool) -> Self {
        self.is_full = Some(full);
        self
    }
}

/// Result of the turn-advance call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Advanced,
    /// The server gave up waiting; the caller decides whether to retry
    TimedOut,
}

#[derive(Deserialize)]
struct ErrorBody {
    error_message: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    message: &'a str,
}

/// One persistent session with the server.
///
/// Every call blocks until the full response frame has arrived.
pub struct Connection<S: Read + Write = TcpStream> {
    stream: S,
    max_frame_len: usize,
}

impl Connection<TcpStream> {
    pub fn connect<A: ToSocketAddrs + std::fmt::Debug>(addr: A) -> Result<Self, ProtocolError> {
        tracing::debug!("Connecting to {:?}", addr);
        let stream = TcpStream::connect(&addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream))
    }
}

impl<S: Read + Write> Connection<S> {
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(mut self, limit: usize) -> Self {
        self.max_frame_len = limit;
        self
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================

    pub fn login(&mut self, request: &LoginRequest) -> Result<PlayerInfo, ProtocolError> {
        let player: PlayerInfo = self.fetch(Action::Login, Some(request))?;
        tracing::debug!("Logged in as {} (idx {})", player.name, player.idx);
        Ok(player)
    }

    pub fn logout(&mut self) -> Result<(), ProtocolError> {
        self.call(Action::Logout, None).map(drop)
    }

    pub fn map(&mut self) -> Result<MapInfo, ProtocolError> {
        self.fetch::<(), _>(Action::Map, None)
    }

    pub fn game_state(&mut self) -> Result<GameSnapshot, ProtocolError> {
        self.fetch::<(), _>(Action::GameState, None)
    }

    pub fn game_actions(&mut self) -> Result<GameActions, ProtocolError> {
        self.fetch::<(), _>(Action::GameActions, None)
    }

    /// Signal the end of this session's turn and wait for the next one
    pub fn turn(&mut self) -> Result<TurnOutcome, ProtocolError> {
        match self.call(Action::Turn, None) {
            Ok(_) => Ok(TurnOutcome::Advanced),
            Err(ProtocolError::Timeout { message }) => {
                tracing::debug!("Turn call timed out: {}", message);
                Ok(TurnOutcome::TimedOut)
            }
            Err(e) => Err(e),
        }
    }

    pub fn chat(&mut self, message: &str) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(&ChatBody { message })?;
        self.call(Action::Chat, Some(payload)).map(drop)
    }

    pub fn move_vehicle(&mut self, vehicle_id: VehicleId, target: Hex) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(&ActionData { vehicle_id, target })?;
        self.call(Action::Move, Some(payload)).map(drop)
    }

    pub fn shoot(&mut self, vehicle_id: VehicleId, target: Hex) -> Result<(), ProtocolError> {
        let payload = serde_json::to_vec(&ActionData { vehicle_id, target })?;
        self.call(Action::Shoot, Some(payload)).map(drop)
    }

    /// Close the session. The socket is released when the stream drops.
    pub fn disconnect(self) {
        tracing::debug!("Disconnecting");
    }

    // ========================================================================
    // PLUMBING
    // ========================================================================

    fn fetch<B: Serialize, T: DeserializeOwned>(
        &mut self,
        action: Action,
        body: Option<&B>,
    ) -> Result<T, ProtocolError> {
        let payload = body.map(serde_json::to_vec).transpose()?;
        let response = self.call(action, payload)?;
        Ok(serde_json::from_slice(&response)?)
    }

    /// Send one request and map the result code onto success or an error
    fn call(&mut self, action: Action, payload: Option<Vec<u8>>) -> Result<Vec<u8>, ProtocolError> {
        let request = codec::encode_request(action, payload.as_deref());
        self.stream.write_all(&request)?;
        self.stream.flush()?;

        let frame = codec::read_frame(&mut self.stream, self.max_frame_len)?;
        match ResultCode::from_code(frame.code) {
            ResultCode::Okey => Ok(frame.payload),
            ResultCode::Timeout => Err(ProtocolError::Timeout {
                message: error_message(&frame.payload),
            }),
            code => {
                let message = error_message(&frame.payload);
                tracing::debug!("{:?} rejected: {} {}", action, code, message);
                Err(ProtocolError::Server { code, message })
            }
        }
    }
}

fn error_message(payload: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(payload)
        .map(|body| body.error_message)
        .unwrap_or_else(|_| String::from_utf8_lossy(payload).into_owned())
}
