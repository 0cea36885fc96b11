//! TANKWAR Client - Protocol, agents and turn coordination
//!
//! This crate connects the core world model to a game server:
//! - Length-prefixed frame codec and a blocking `Connection`
//! - A two-phase turn barrier between the coordinator and its agents
//! - Agents: autonomous bots, remote-player mirrors, observers
//! - The `Game` coordinator driving rounds, turns and results

pub mod codec;
pub mod error;
pub mod connection;
pub mod barrier;
pub mod agent;
pub mod config;
pub mod coordinator;

// Re-exports for convenient access
pub use codec::{Action, ResultCode};
pub use error::{GameError, ProtocolError};
pub use connection::{Connection, LoginRequest, TurnOutcome};
pub use barrier::{AgentPort, TurnBarrier, TurnReport, TurnStatus, TurnTicket};
pub use agent::{Agent, AgentState, Behavior, Played};
pub use config::{GameConfig, PlayerSpec};
pub use coordinator::{Game, GameOutcome, GameSummary, Phase, RoundResult, TurnView};
