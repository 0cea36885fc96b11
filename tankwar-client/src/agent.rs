//! Per-player agents run by the coordinator
//!
//! Every agent loops `Idle -> Acting -> Idle` on its barrier port until it is
//! told to stop, then tears down according to its behaviour.

use std::io::{Read, Write};
use std::net::TcpStream;

use rand_chacha::ChaCha8Rng;

use tankwar_core::{intent_from_action, BotPlanner, Intent, PlayerId, PlayerInfo, WorldModel};

use crate::barrier::{AgentPort, TurnStatus, TurnTicket};
use crate::connection::Connection;
use crate::error::ProtocolError;

#[derive(Debug)]
pub enum Behavior {
    /// Plans and submits its own moves
    Autonomous(BotPlanner<ChaCha8Rng>),
    /// Follows a player connected elsewhere by replaying its action log
    RemoteMirror,
    /// Watches without acting
    Observer,
}

impl Behavior {
    pub fn label(&self) -> &'static str {
        match self {
            Behavior::Autonomous(_) => "autonomous",
            Behavior::RemoteMirror => "remote mirror",
            Behavior::Observer => "observer",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Acting,
    Stopped,
}

pub struct Agent<S: Read + Write = TcpStream> {
    player: PlayerInfo,
    conn: Option<Connection<S>>,
    behavior: Behavior,
    state: AgentState,
    greeting: Option<String>,
}

impl<S: Read + Write> Agent<S> {
    /// `player` is the seat this agent acts for. For a remote mirror that is
    /// the remote player, while `conn` is the mirror's own observer session.
    pub fn new(player: PlayerInfo, conn: Option<Connection<S>>, behavior: Behavior) -> Self {
        Self {
            player,
            conn,
            behavior,
            state: AgentState::Idle,
            greeting: None,
        }
    }

    /// Chat message sent once, on the first turn
    pub fn with_greeting(mut self, message: impl Into<String>) -> Self {
        self.greeting = Some(message.into());
        self
    }

    pub fn player(&self) -> &PlayerInfo {
        &self.player
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Agent main loop. Returns the final state once stopped.
    pub fn run(mut self, port: AgentPort) -> AgentState {
        tracing::debug!(
            "Agent {} ({}) started for {}",
            port.id(),
            self.behavior.label(),
            self.player.name
        );

        while let Some(ticket) = port.wait() {
            self.state = AgentState::Acting;
            let played = self.take_turn(&ticket);
            self.state = AgentState::Idle;

            match played.error {
                None => port.report(ticket.epoch, played.intents, TurnStatus::Done),
                Some(e) if e.is_fatal() => {
                    tracing::error!("{} lost its connection: {}", self.player.name, e);
                    port.report(ticket.epoch, played.intents, TurnStatus::Failed(e.to_string()));
                    break;
                }
                Some(e) => {
                    tracing::warn!("{} cut turn {} short: {}", self.player.name, ticket.turn, e);
                    port.report(ticket.epoch, played.intents, TurnStatus::Done);
                }
            }
        }

        self.teardown();
        self.state = AgentState::Stopped;
        self.state
    }

    /// Execute one turn. The intents the server accepted are kept even when a
    /// later request fails.
    pub fn take_turn(&mut self, ticket: &TurnTicket) -> Played {
        let me = self.player.idx;
        let my_turn = ticket.actor == Some(me);
        let Some(conn) = self.conn.as_mut() else {
            return Played::default();
        };

        match &mut self.behavior {
            Behavior::Autonomous(planner) => {
                if let Some(message) = self.greeting.take() {
                    if let Err(e) = conn.chat(&message) {
                        tracing::warn!("{} could not chat: {}", self.player.name, e);
                    }
                }

                let mut intents = Vec::new();
                if my_turn {
                    let mut local = WorldModel::clone(&ticket.world);
                    local.reset_shots(me);
                    planner.start_round(ticket.round);
                    intents = match planner.plan_turn(&mut local, me) {
                        Ok(intents) => intents,
                        Err(e) => {
                            tracing::warn!("{} could not plan: {}", self.player.name, e);
                            Vec::new()
                        }
                    };
                }
                play_and_end_turn(conn, &self.player.name, intents)
            }
            Behavior::RemoteMirror if my_turn => match mirror(conn, me, ticket) {
                Ok(intents) => {
                    tracing::debug!("Mirrored {} actions of {}", intents.len(), self.player.name);
                    Played::done(intents)
                }
                Err(e) => Played { intents: Vec::new(), error: Some(e) },
            },
            Behavior::RemoteMirror | Behavior::Observer => Played::default(),
        }
    }

    fn teardown(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match self.behavior {
            Behavior::Autonomous(_) => {
                if let Err(e) = conn.logout() {
                    tracing::debug!("{} logout failed: {}", self.player.name, e);
                }
                conn.disconnect();
            }
            Behavior::RemoteMirror => conn.disconnect(),
            // observers leave their session to lapse
            Behavior::Observer => {}
        }
        tracing::debug!("{} stopped", self.player.name);
    }
}

/// Outcome of one turn: what the server accepted, and the error that ended
/// the turn early, if any
#[derive(Debug, Default)]
pub struct Played {
    pub intents: Vec<Intent>,
    pub error: Option<ProtocolError>,
}

impl Played {
    fn done(intents: Vec<Intent>) -> Self {
        Self { intents, error: None }
    }
}

/// Submit the intents, then end the turn
fn play_and_end_turn<S: Read + Write>(
    conn: &mut Connection<S>,
    name: &str,
    intents: Vec<Intent>,
) -> Played {
    let mut played = submit(conn, name, intents);
    if played.error.is_none() {
        if let Err(e) = conn.turn() {
            played.error = Some(e);
        }
    }
    played
}

/// Send intents in order. Rejected ones are logged and dropped; a fatal error
/// aborts the rest of the turn.
fn submit<S: Read + Write>(conn: &mut Connection<S>, name: &str, intents: Vec<Intent>) -> Played {
    let mut played = Played::done(Vec::with_capacity(intents.len()));
    for intent in intents {
        let sent = match &intent {
            Intent::Move { vehicle, target } => conn.move_vehicle(*vehicle, *target),
            Intent::Shoot { vehicle, target, .. } => conn.shoot(*vehicle, *target),
        };
        match sent {
            Ok(()) => played.intents.push(intent),
            Err(e) if e.is_fatal() => {
                played.error = Some(e);
                break;
            }
            Err(e) => tracing::warn!("{}: server refused {:?}: {}", name, intent, e),
        }
    }
    played
}

/// Advance the remote player's turn if it is still open, then replay its
/// logged actions on a scratch copy so each entry sees the ones before it
fn mirror<S: Read + Write>(
    conn: &mut Connection<S>,
    me: PlayerId,
    ticket: &TurnTicket,
) -> Result<Vec<Intent>, ProtocolError> {
    let state = conn.game_state()?;
    if state.current_round == ticket.round && state.current_turn == ticket.turn && !state.finished {
        conn.turn()?;
    }
    let log = conn.game_actions()?;

    let mut scratch = WorldModel::clone(&ticket.world);
    let mut intents = Vec::new();
    for action in log.actions.iter().filter(|a| a.player_id == me || a.player_id == 0) {
        let Some(intent) = intent_from_action(&scratch, action) else {
            continue;
        };
        if let Err(e) = scratch.apply(&intent) {
            tracing::warn!("Cannot replay {:?}: {}", action, e);
            continue;
        }
        intents.push(intent);
    }
    Ok(intents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ResultCode;
    use crate::tests::Scripted;
    use tankwar_core::Hex;

    fn shot() -> Intent {
        Intent::Shoot {
            vehicle: 1,
            target: Hex::new(1, -1, 0),
            victims: vec![7],
        }
    }

    fn step(vehicle: u32) -> Intent {
        Intent::Move {
            vehicle,
            target: Hex::new(0, 1, -1),
        }
    }

    #[test]
    fn test_accepted_shot_survives_a_refused_turn() {
        let stream = Scripted::new(&[
            (ResultCode::Okey, ""),
            (ResultCode::InappropriateGameState, r#"{"error_message": "game finished"}"#),
        ]);
        let mut conn = Connection::from_stream(stream);

        let played = play_and_end_turn(&mut conn, "bot", vec![shot()]);
        assert_eq!(played.intents, vec![shot()]);
        assert!(matches!(
            played.error,
            Some(ProtocolError::Server { code: ResultCode::InappropriateGameState, .. })
        ));
    }

    #[test]
    fn test_lost_connection_keeps_earlier_intents() {
        // one answer, then the stream runs dry
        let stream = Scripted::new(&[(ResultCode::Okey, "")]);
        let mut conn = Connection::from_stream(stream);

        let played = play_and_end_turn(&mut conn, "bot", vec![step(1), step(2), step(3)]);
        assert_eq!(played.intents, vec![step(1)]);
        assert!(played.error.is_some_and(|e| e.is_fatal()));
    }

    #[test]
    fn test_refused_intent_is_dropped_and_turn_still_ends() {
        let stream = Scripted::new(&[
            (ResultCode::BadCommand, r#"{"error_message": "bad move"}"#),
            (ResultCode::Okey, ""),
            (ResultCode::Okey, ""),
        ]);
        let mut conn = Connection::from_stream(stream);

        let played = play_and_end_turn(&mut conn, "bot", vec![step(1), step(2)]);
        assert_eq!(played.intents, vec![step(2)]);
        assert!(played.error.is_none());
    }
}
