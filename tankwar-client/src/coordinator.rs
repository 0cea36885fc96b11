//! Game coordinator - rounds, turns and results
//!
//! ## Architecture
//!
//! - run(): AwaitAllPlayers -> (RoundSetup -> TurnLoop -> RoundEnd)* -> GameEnd
//! - await_players(), setup_round(), play_turn(), finish()
//! - agent spawning and remote player discovery
//! - result tallying

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashSet;

use tankwar_core::{BotPlanner, GameSnapshot, PlayerId, PlayerInfo, WorldModel};

use crate::agent::{Agent, AgentState, Behavior};
use crate::barrier::{AgentId, TurnBarrier};
use crate::config::{GameConfig, PlayerSpec};
use crate::connection::{Connection, LoginRequest, TurnOutcome};
use crate::error::GameError;

/// Round state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    AwaitAllPlayers,
    RoundSetup,
    TurnLoop,
    RoundEnd,
    GameEnd,
}

/// Per-turn feed for a renderer
#[derive(Clone, Debug)]
pub struct TurnView {
    pub round: u32,
    pub turn: u32,
    pub actor: Option<PlayerId>,
    pub world: Arc<WorldModel>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub round: u32,
    pub winner: Option<PlayerId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOutcome {
    Winner(PlayerId),
    Draw,
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::Winner(idx) => write!(f, "player {} wins", idx),
            GameOutcome::Draw => write!(f, "draw"),
        }
    }
}

/// Final tally of a game
#[derive(Clone, Debug)]
pub struct GameSummary {
    pub players: Vec<PlayerInfo>,
    pub rounds: Vec<RoundResult>,
    /// Round wins per player, zero for players that never won
    pub wins: BTreeMap<PlayerId, u32>,
    pub outcome: GameOutcome,
}

impl GameSummary {
    pub fn new(players: Vec<PlayerInfo>, rounds: Vec<RoundResult>) -> Self {
        let mut wins: BTreeMap<PlayerId, u32> = players.iter().map(|p| (p.idx, 0)).collect();
        for winner in rounds.iter().filter_map(|r| r.winner) {
            *wins.entry(winner).or_default() += 1;
        }
        let outcome = decide_outcome(&wins);
        Self {
            players,
            rounds,
            wins,
            outcome,
        }
    }

    pub fn total_wins(&self) -> u32 {
        self.wins.values().sum()
    }

    pub fn name_of(&self, idx: PlayerId) -> Option<&str> {
        self.players.iter().find(|p| p.idx == idx).map(|p| p.name.as_str())
    }
}

/// The unique leader wins; a shared lead is a draw. A lone player always wins.
pub fn decide_outcome(wins: &BTreeMap<PlayerId, u32>) -> GameOutcome {
    if wins.len() == 1 {
        if let Some(&only) = wins.keys().next() {
            return GameOutcome::Winner(only);
        }
    }
    let Some(&best) = wins.values().max() else {
        return GameOutcome::Draw;
    };
    let mut leaders = wins.iter().filter(|&(_, &w)| w == best);
    match (leaders.next(), leaders.next()) {
        (Some((&idx, _)), None) => GameOutcome::Winner(idx),
        _ => GameOutcome::Draw,
    }
}

struct AgentHandle {
    id: AgentId,
    name: String,
    thread: JoinHandle<AgentState>,
}

/// Drives one game: owns the info connection, the world and the barrier
pub struct Game {
    config: GameConfig,
    info: Connection,
    barrier: TurnBarrier,
    agents: Vec<AgentHandle>,
    /// Players that already have an agent
    known: FxHashSet<PlayerId>,
    /// Players followed through a mirror
    remote: FxHashSet<PlayerId>,
    local_players: u32,
    /// Agents that missed the last barrier; they are not joined at the end
    stalled: FxHashSet<AgentId>,
    views: Option<Sender<TurnView>>,
    phase: Phase,
    rng: ChaCha8Rng,
}

impl Game {
    /// Connect the info client that polls game state
    pub fn connect(config: GameConfig) -> Result<Self, GameError> {
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut info = open(&config)?;
        let name = format!("Info Client - {}", rng.gen_range(0..1_000_000));
        let me = info.login(&login_request(&config, &name).as_observer())?;
        tracing::info!("Connected to {} as {}", config.server, me.name);

        Ok(Self {
            barrier: TurnBarrier::new(config.turn_timeout()),
            config,
            info,
            agents: Vec::new(),
            known: FxHashSet::default(),
            remote: FxHashSet::default(),
            local_players: 0,
            stalled: FxHashSet::default(),
            views: None,
            phase: Phase::AwaitAllPlayers,
            rng,
        })
    }

    /// Receive a `TurnView` every turn
    pub fn subscribe(&mut self) -> Receiver<TurnView> {
        let (tx, rx) = mpsc::channel();
        self.views = Some(tx);
        rx
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Log in a player hosted by this process and start its agent.
    ///
    /// Once every seat is taken, further players join as observers.
    pub fn add_local_player(&mut self, spec: &PlayerSpec) -> Result<PlayerInfo, GameError> {
        let overflow = !spec.observer && self.local_players >= self.config.num_players;
        if overflow {
            tracing::info!("All {} seats taken, {} joins as observer", self.config.num_players, spec.name);
        }
        let observer = spec.observer || overflow;

        let mut request = login_request(&self.config, &spec.name);
        if let Some(password) = &spec.password {
            request = request.with_password(password.clone());
        }
        if observer {
            request = request.as_observer();
        }

        let mut conn = open(&self.config)?;
        let player = conn.login(&request)?;

        let behavior = if observer {
            Behavior::Observer
        } else {
            self.local_players += 1;
            self.known.insert(player.idx);
            Behavior::Autonomous(BotPlanner::new(ChaCha8Rng::seed_from_u64(self.rng.gen())))
        };

        let mut agent = Agent::new(player.clone(), Some(conn), behavior);
        if let (false, Some(greeting)) = (observer, &self.config.greeting) {
            agent = agent.with_greeting(greeting.clone());
        }
        self.spawn(agent)?;

        tracing::info!(
            "{} joined as {} (idx {})",
            player.name,
            if observer { "observer" } else { "player" },
            player.idx
        );
        Ok(player)
    }

    // ========================================================================
    // GAME LOOP
    // ========================================================================

    /// Play the game to the end
    pub fn run(mut self) -> Result<GameSummary, GameError> {
        self.await_players()?;

        let mut state = self.info.game_state()?;
        let mut round = state.current_round;
        let mut world = self.setup_round(&state)?;
        let mut results: Vec<RoundResult> = Vec::new();
        let mut tallied: Option<u32> = None;

        loop {
            if state.current_round != round {
                round = state.current_round;
                world = self.setup_round(&state)?;
            } else {
                let stats = world.update(&state);
                tracing::trace!("Snapshot diff: {:?}", stats);
            }

            if state.finished && tallied != Some(round) {
                self.enter(Phase::RoundEnd);
                tallied = Some(round);
                results.push(RoundResult { round, winner: state.winner });
                tracing::info!(
                    "Round {}/{} finished, winner: {}",
                    round,
                    state.num_rounds,
                    state
                        .winner
                        .map_or_else(|| "none".to_string(), |idx| idx.to_string())
                );
                if round >= state.num_rounds {
                    break;
                }
            }

            self.play_turn(&state, round, &mut world)?;
            state = self.info.game_state()?;
        }

        let players: Vec<PlayerInfo> = state.active_players().cloned().collect();
        self.finish();
        Ok(GameSummary::new(players, results))
    }

    /// Poll until every seat is filled, attaching mirrors to remote players
    fn await_players(&mut self) -> Result<(), GameError> {
        self.enter(Phase::AwaitAllPlayers);
        loop {
            let state = self.info.game_state()?;
            self.discover_remote(&state)?;
            if state.everyone_joined() {
                tracing::info!("All {} players joined", state.num_players);
                return Ok(());
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    fn setup_round(&mut self, state: &GameSnapshot) -> Result<WorldModel, GameError> {
        self.enter(Phase::RoundSetup);
        let map = self.info.map()?;
        let world = WorldModel::build(&map, state)?;
        tracing::info!(
            "Round {}/{} started on {} ({} vehicles)",
            state.current_round,
            state.num_rounds,
            map.name.as_deref().unwrap_or("unnamed map"),
            state.vehicles.len()
        );
        self.enter(Phase::TurnLoop);
        Ok(world)
    }

    /// Release the agents for one turn, advance the server and apply what they did
    fn play_turn(
        &mut self,
        state: &GameSnapshot,
        round: u32,
        world: &mut WorldModel,
    ) -> Result<(), GameError> {
        let actor = state.current_actor();
        if let Some(actor) = actor {
            world.reset_shots(actor);
        }
        tracing::debug!("Round {} turn {}, actor {:?}", round, state.current_turn, actor);

        let shared = Arc::new(world.clone());
        self.publish(TurnView {
            round,
            turn: state.current_turn,
            actor,
            world: Arc::clone(&shared),
        });
        self.barrier.release(round, state.current_turn, actor, shared);

        // a mirrored player's turn is advanced by its mirror
        if !actor.is_some_and(|a| self.remote.contains(&a)) {
            if let TurnOutcome::TimedOut = self.info.turn()? {
                tracing::debug!("Turn {} timed out on the server", state.current_turn);
            }
        }

        let collected = self.barrier.collect();
        self.stalled = collected.missing.into_iter().collect();
        for report in &collected.reports {
            for intent in &report.intents {
                if let Err(e) = world.apply(intent) {
                    tracing::warn!("Agent {} sent an inapplicable intent: {}", report.agent, e);
                }
            }
        }
        Ok(())
    }

    /// Stop the agents and leave
    fn finish(mut self) {
        self.enter(Phase::GameEnd);
        self.barrier.stop();

        for handle in self.agents.drain(..) {
            if self.stalled.contains(&handle.id) {
                tracing::warn!("Not waiting for stalled agent {}", handle.name);
                continue;
            }
            match handle.thread.join() {
                Ok(state) => tracing::debug!("Agent {} ended {:?}", handle.name, state),
                Err(_) => tracing::error!("Agent {} panicked", handle.name),
            }
        }

        if let Err(e) = self.info.logout() {
            tracing::debug!("Info client logout failed: {}", e);
        }
        self.info.disconnect();
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    fn discover_remote(&mut self, state: &GameSnapshot) -> Result<(), GameError> {
        let newcomers: Vec<PlayerInfo> = state
            .active_players()
            .filter(|p| !self.known.contains(&p.idx))
            .cloned()
            .collect();

        for player in newcomers {
            let name = format!("Mirror - {} - {}", player.name, self.rng.gen_range(0..1_000_000));
            let mut conn = open(&self.config)?;
            conn.login(&login_request(&self.config, &name).as_observer())?;

            tracing::info!("Following remote player {} (idx {})", player.name, player.idx);
            self.known.insert(player.idx);
            self.remote.insert(player.idx);
            self.spawn(Agent::new(player, Some(conn), Behavior::RemoteMirror))?;
        }
        Ok(())
    }

    fn spawn(&mut self, agent: Agent) -> Result<(), GameError> {
        let port = self.barrier.register();
        let id = port.id();
        let name = agent.player().name.clone();
        let thread = thread::Builder::new()
            .name(format!("agent-{}", id))
            .spawn(move || agent.run(port))
            .map_err(GameError::Spawn)?;
        self.agents.push(AgentHandle { id, name, thread });
        Ok(())
    }

    fn publish(&mut self, view: TurnView) {
        if let Some(tx) = &self.views {
            if tx.send(view).is_err() {
                tracing::debug!("View subscriber went away");
                self.views = None;
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!("{:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

fn open(config: &GameConfig) -> Result<Connection, GameError> {
    Ok(Connection::connect(config.server.as_str())?.with_max_frame_len(config.max_frame_len))
}

fn login_request(config: &GameConfig, name: &str) -> LoginRequest {
    let mut request = LoginRequest::new(name)
        .with_num_players(config.num_players)
        .with_full(config.is_full);
    if let Some(game) = &config.game {
        request = request.with_game(game.clone());
    }
    if let Some(turns) = config.num_turns {
        request = request.with_num_turns(turns);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(pairs: &[(PlayerId, u32)]) -> BTreeMap<PlayerId, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_unique_leader_wins() {
        assert_eq!(decide_outcome(&tally(&[(1, 2), (2, 1), (3, 0)])), GameOutcome::Winner(1));
    }

    #[test]
    fn test_shared_lead_is_draw() {
        assert_eq!(decide_outcome(&tally(&[(1, 1), (2, 1), (3, 0)])), GameOutcome::Draw);
        assert_eq!(decide_outcome(&tally(&[])), GameOutcome::Draw);
    }

    #[test]
    fn test_lone_player_always_wins() {
        assert_eq!(decide_outcome(&tally(&[(5, 0)])), GameOutcome::Winner(5));
    }

    #[test]
    fn test_summary_counts_round_winners() {
        let players = vec![
            PlayerInfo { idx: 1, name: "a".into(), is_observer: false },
            PlayerInfo { idx: 2, name: "b".into(), is_observer: false },
        ];
        let rounds = vec![
            RoundResult { round: 1, winner: Some(2) },
            RoundResult { round: 2, winner: None },
            RoundResult { round: 3, winner: Some(2) },
        ];
        let summary = GameSummary::new(players, rounds);
        assert_eq!(summary.wins[&1], 0);
        assert_eq!(summary.wins[&2], 2);
        assert_eq!(summary.total_wins(), 2);
        assert_eq!(summary.outcome, GameOutcome::Winner(2));
        assert_eq!(summary.name_of(2), Some("b"));
    }
}
