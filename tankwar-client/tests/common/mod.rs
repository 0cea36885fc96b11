//! In-process game server for integration tests
//!
//! Speaks the real wire protocol over loopback TCP. Rules are simplified:
//! turns rotate through the seated players, every vehicle on the base earns a
//! capture point when a turn ends, and the round goes to the best
//! capture-plus-damage score (lowest idx on ties), so every round has a winner.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use tankwar_client::codec::{encode_response, read_frame, Action, ResultCode, DEFAULT_MAX_FRAME_LEN};
use tankwar_client::LoginRequest;
use tankwar_core::snapshot::{
    ActionData, GameAction, GameActions, MapContent, VehicleSnapshot, ACTION_MOVE, ACTION_SHOOT,
};
use tankwar_core::{
    ring, GameSnapshot, Hex, MapInfo, PlayerId, PlayerInfo, Trajectory, VehicleClass, VehicleId,
    ORIGIN,
};

pub const MAP_SIZE: u32 = 11;

const LINEUP: [(VehicleClass, i32); 5] = [
    (VehicleClass::Spg, 1),
    (VehicleClass::LightTank, 1),
    (VehicleClass::HeavyTank, 3),
    (VehicleClass::MediumTank, 2),
    (VehicleClass::AtSpg, 2),
];

const FIRST_SPAWNS: [Hex; 5] = [
    Hex::new(-8, 2, 6),
    Hex::new(-8, 3, 5),
    Hex::new(-8, 4, 4),
    Hex::new(-8, 5, 3),
    Hex::new(-8, 6, 2),
];

#[derive(Clone, Debug)]
pub struct FakeConfig {
    pub num_players: u32,
    pub num_turns: u32,
    pub num_rounds: u32,
    /// How long a TURN call blocks before answering with a timeout
    pub turn_wait: Duration,
}

impl Default for FakeConfig {
    fn default() -> Self {
        Self {
            num_players: 3,
            num_turns: 45,
            num_rounds: 2,
            turn_wait: Duration::from_secs(5),
        }
    }
}

/// Counters for assertions
#[derive(Clone, Copy, Debug, Default)]
pub struct FakeStats {
    pub moves: usize,
    pub shots: usize,
    pub turns_played: u64,
    pub rounds_finished: u32,
}

pub struct FakeServer {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeServer {
    pub fn start(config: FakeConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let shared = Arc::new(Shared {
            game: Mutex::new(World::default()),
            advanced: Condvar::new(),
            config,
        });

        let acceptor = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let shared = Arc::clone(&acceptor);
                thread::spawn(move || serve(shared, stream));
            }
        });

        Self { addr, shared }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn stats(&self) -> FakeStats {
        self.shared.lock().stats
    }
}

struct Shared {
    game: Mutex<World>,
    advanced: Condvar,
    config: FakeConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, World> {
        self.game.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone, Debug)]
struct Tank {
    player: PlayerId,
    class: VehicleClass,
    hp: i32,
    full_hp: i32,
    spawn: Hex,
    position: Hex,
    capture_points: i32,
}

#[derive(Default)]
struct World {
    seats: Vec<PlayerInfo>,
    observers: Vec<PlayerInfo>,
    next_idx: PlayerId,
    started: bool,
    round: u32,
    turn: u32,
    finished: bool,
    winner: Option<PlayerId>,
    generation: u64,
    done: Vec<PlayerId>,
    tanks: BTreeMap<VehicleId, Tank>,
    damage: BTreeMap<PlayerId, i32>,
    wins: BTreeMap<PlayerId, u32>,
    current_actions: Vec<GameAction>,
    last_actions: Vec<GameAction>,
    stats: FakeStats,
}

pub fn map() -> MapInfo {
    let mut base = vec![ORIGIN];
    base.extend(ring(ORIGIN, 1));
    MapInfo {
        size: MAP_SIZE,
        name: Some("loopback".to_string()),
        content: MapContent {
            base,
            obstacle: vec![
                Hex::new(3, -1, -2),
                Hex::new(-3, 1, 2),
                Hex::new(1, 2, -3),
                Hex::new(-1, -2, 3),
            ],
            light_repair: vec![Hex::new(-5, 5, 0)],
            hard_repair: vec![Hex::new(5, -5, 0)],
            catapult: vec![Hex::new(0, 5, -5)],
        },
    }
}

/// Spawn hexes for a seat: the first seat's line rotated 120 degrees per seat
pub fn spawns(slot: usize) -> Vec<Hex> {
    FIRST_SPAWNS
        .iter()
        .map(|&h| {
            let mut h = h;
            for _ in 0..slot % 3 {
                h = Hex::new(h.s, h.q, h.r);
            }
            h
        })
        .collect()
}

type Reply = (ResultCode, Vec<u8>);

fn ok<T: Serialize>(body: &T) -> Reply {
    (ResultCode::Okey, serde_json::to_vec(body).unwrap_or_default())
}

fn empty() -> Reply {
    (ResultCode::Okey, Vec::new())
}

fn fail(code: ResultCode, message: &str) -> Reply {
    (code, serde_json::to_vec(&serde_json::json!({ "error_message": message })).unwrap_or_default())
}

impl World {
    fn actor(&self) -> Option<PlayerId> {
        if !self.started || self.finished || self.seats.is_empty() {
            return None;
        }
        let at = (self.turn as usize - 1) % self.seats.len();
        Some(self.seats[at].idx)
    }

    fn game_over(&self, config: &FakeConfig) -> bool {
        self.finished && self.round >= config.num_rounds
    }

    fn on_grid(hex: Hex) -> bool {
        hex.is_valid() && hex.distance_to_center() < MAP_SIZE as i32
    }

    fn blocked(&self, hex: Hex) -> bool {
        !Self::on_grid(hex) || map().content.obstacle.contains(&hex)
    }

    fn tank_at(&self, hex: Hex) -> Option<VehicleId> {
        self.tanks.iter().find(|(_, t)| t.position == hex).map(|(&id, _)| id)
    }

    fn join(&mut self, request: &LoginRequest, config: &FakeConfig) -> Result<PlayerInfo, Reply> {
        self.next_idx += 1;
        let observer = request.is_observer.unwrap_or(false);
        let player = PlayerInfo {
            idx: self.next_idx,
            name: request.name.clone(),
            is_observer: observer,
        };
        if observer {
            self.observers.push(player.clone());
            return Ok(player);
        }
        if self.seats.len() as u32 >= config.num_players {
            return Err(fail(ResultCode::InappropriateGameState, "game is full"));
        }

        let slot = self.seats.len();
        for (&(class, hp), spawn) in LINEUP.iter().zip(spawns(slot)) {
            let id = self.tanks.len() as VehicleId + 1;
            self.tanks.insert(
                id,
                Tank {
                    player: player.idx,
                    class,
                    hp,
                    full_hp: hp,
                    spawn,
                    position: spawn,
                    capture_points: 0,
                },
            );
        }
        self.seats.push(player.clone());

        if self.seats.len() as u32 == config.num_players {
            self.started = true;
            self.round = 1;
            self.turn = 1;
        }
        Ok(player)
    }

    fn snapshot(&self, config: &FakeConfig) -> GameSnapshot {
        GameSnapshot {
            num_players: config.num_players,
            num_turns: config.num_turns,
            num_rounds: config.num_rounds,
            current_round: self.round,
            current_turn: self.turn,
            players: self.seats.clone(),
            observers: self.observers.clone(),
            current_player_idx: self.actor(),
            finished: self.finished,
            winner: self.winner,
            vehicles: self
                .tanks
                .iter()
                .map(|(&id, t)| {
                    (
                        id,
                        VehicleSnapshot {
                            player_id: t.player,
                            vehicle_type: t.class,
                            health: t.hp,
                            spawn_position: t.spawn,
                            position: t.position,
                            capture_points: t.capture_points,
                        },
                    )
                })
                .collect(),
            player_result_points: self.wins.clone(),
        }
    }

    fn score(&self, player: PlayerId) -> i32 {
        let capture: i32 = self
            .tanks
            .values()
            .filter(|t| t.player == player)
            .map(|t| t.capture_points)
            .sum();
        capture + self.damage.get(&player).copied().unwrap_or(0)
    }

    fn advance(&mut self, config: &FakeConfig) {
        self.generation += 1;
        self.done.clear();
        self.last_actions = std::mem::take(&mut self.current_actions);
        self.stats.turns_played += 1;

        if self.finished {
            if self.round < config.num_rounds {
                self.start_round();
            }
            return;
        }

        let base = map().content.base;
        for tank in self.tanks.values_mut() {
            if base.contains(&tank.position) {
                tank.capture_points += 1;
            }
        }

        if self.turn >= config.num_turns {
            self.finished = true;
            let winner = self
                .seats
                .iter()
                .map(|p| p.idx)
                .max_by_key(|&idx| (self.score(idx), std::cmp::Reverse(idx)));
            self.winner = winner;
            if let Some(idx) = winner {
                *self.wins.entry(idx).or_default() += 1;
            }
            self.stats.rounds_finished += 1;
        } else {
            self.turn += 1;
        }
    }

    fn start_round(&mut self) {
        self.round += 1;
        self.turn = 1;
        self.finished = false;
        self.winner = None;
        self.damage.clear();
        for tank in self.tanks.values_mut() {
            tank.hp = tank.full_hp;
            tank.position = tank.spawn;
            tank.capture_points = 0;
        }
    }

    fn check_action(&self, idx: PlayerId, data: &ActionData) -> Result<Tank, Reply> {
        if self.actor() != Some(idx) {
            return Err(fail(ResultCode::InappropriateGameState, "not your turn"));
        }
        match self.tanks.get(&data.vehicle_id) {
            Some(tank) if tank.player == idx => Ok(tank.clone()),
            _ => Err(fail(ResultCode::AccessDenied, "not your vehicle")),
        }
    }

    fn do_move(&mut self, idx: PlayerId, data: ActionData) -> Reply {
        let tank = match self.check_action(idx, &data) {
            Ok(tank) => tank,
            Err(reply) => return reply,
        };
        let target = data.target;
        if self.blocked(target)
            || self.tank_at(target).is_some()
            || tank.position.distance_to(target) > tank.class.spec().speed as i32
        {
            return fail(ResultCode::BadCommand, "illegal move");
        }
        if let Some(t) = self.tanks.get_mut(&data.vehicle_id) {
            t.position = target;
        }
        self.record(idx, ACTION_MOVE, data);
        self.stats.moves += 1;
        empty()
    }

    fn do_shoot(&mut self, idx: PlayerId, data: ActionData) -> Reply {
        let tank = match self.check_action(idx, &data) {
            Ok(tank) => tank,
            Err(reply) => return reply,
        };
        let spec = tank.class.spec();
        let victims: Vec<VehicleId> = match spec.trajectory {
            Trajectory::Curved => {
                let d = tank.position.distance_to(data.target);
                if d < spec.min_range as i32 || d > spec.max_range as i32 + 1 {
                    return fail(ResultCode::BadCommand, "out of range");
                }
                self.tank_at(data.target)
                    .filter(|id| self.tanks[id].player != idx)
                    .into_iter()
                    .collect()
            }
            Trajectory::Straight => {
                let Some(dir) = tank.position.direction_to(data.target) else {
                    return fail(ResultCode::BadCommand, "not on a line");
                };
                let mut hit = Vec::new();
                for k in 1..=spec.max_range as i32 {
                    let hex = tank.position + dir.scale(k);
                    if self.blocked(hex) {
                        break;
                    }
                    if let Some(id) = self.tank_at(hex).filter(|id| self.tanks[id].player != idx) {
                        hit.push(id);
                    }
                }
                hit
            }
        };

        for id in victims {
            *self.damage.entry(idx).or_default() += 1;
            if let Some(victim) = self.tanks.get_mut(&id) {
                victim.hp -= 1;
                if victim.hp <= 0 {
                    victim.hp = victim.full_hp;
                    victim.position = victim.spawn;
                }
            }
        }
        self.record(idx, ACTION_SHOOT, data);
        self.stats.shots += 1;
        empty()
    }

    fn record(&mut self, player_id: PlayerId, action_type: u32, data: ActionData) {
        self.current_actions.push(GameAction {
            player_id,
            action_type,
            data,
        });
    }
}

/// Per-connection session state
#[derive(Default)]
struct Session {
    me: Option<PlayerInfo>,
    /// Generation last observed by this session
    seen: u64,
}

fn serve(shared: Arc<Shared>, mut stream: TcpStream) {
    let mut session = Session::default();
    loop {
        let Ok(frame) = read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN) else {
            return;
        };
        let (code, body) = match Action::from_code(frame.code) {
            Some(action) => handle(&shared, &mut session, action, &frame.payload),
            None => fail(ResultCode::BadCommand, "unknown action"),
        };
        if stream.write_all(&encode_response(code, &body)).is_err() {
            return;
        }
    }
}

fn handle(shared: &Shared, session: &mut Session, action: Action, payload: &[u8]) -> Reply {
    let config = &shared.config;

    if action == Action::Login {
        let Ok(request) = serde_json::from_slice::<LoginRequest>(payload) else {
            return fail(ResultCode::BadCommand, "bad login");
        };
        let mut game = shared.lock();
        return match game.join(&request, config) {
            Ok(player) => {
                session.seen = game.generation;
                session.me = Some(player.clone());
                ok(&player)
            }
            Err(reply) => reply,
        };
    }

    let Some(me) = session.me.clone() else {
        return fail(ResultCode::AccessDenied, "login first");
    };

    match action {
        Action::Login => unreachable!(),
        Action::Logout | Action::Chat => empty(),
        Action::Map => ok(&map()),
        Action::GameState => {
            let game = shared.lock();
            session.seen = game.generation;
            ok(&game.snapshot(config))
        }
        Action::GameActions => {
            let game = shared.lock();
            ok(&GameActions {
                actions: game.last_actions.clone(),
            })
        }
        Action::Turn => turn(shared, session, &me),
        Action::Move | Action::Shoot => {
            let Ok(data) = serde_json::from_slice::<ActionData>(payload) else {
                return fail(ResultCode::BadCommand, "bad action");
            };
            let mut game = shared.lock();
            if action == Action::Move {
                game.do_move(me.idx, data)
            } else {
                game.do_shoot(me.idx, data)
            }
        }
    }
}

fn turn(shared: &Shared, session: &mut Session, me: &PlayerInfo) -> Reply {
    let config = &shared.config;
    let mut game = shared.lock();
    if game.game_over(config) {
        return empty();
    }

    if me.is_observer {
        // an advance since this session last looked counts as the one it waits for
        if game.generation > session.seen {
            session.seen = game.generation;
            return empty();
        }
        let seen = session.seen;
        let (game, timeout) = shared
            .advanced
            .wait_timeout_while(game, config.turn_wait, |g| {
                g.generation <= seen && !g.game_over(config)
            })
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        session.seen = game.generation;
        return if timeout.timed_out() {
            fail(ResultCode::Timeout, "turn timeout")
        } else {
            empty()
        };
    }

    if !game.started {
        return fail(ResultCode::InappropriateGameState, "game has not started");
    }
    let generation = game.generation;
    if !game.done.contains(&me.idx) {
        game.done.push(me.idx);
    }
    if game.done.len() == game.seats.len() {
        game.advance(config);
        session.seen = game.generation;
        shared.advanced.notify_all();
        return empty();
    }

    let (game, timeout) = shared
        .advanced
        .wait_timeout_while(game, config.turn_wait, |g| {
            g.generation == generation && !g.game_over(config)
        })
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    session.seen = game.generation;
    if timeout.timed_out() {
        fail(ResultCode::Timeout, "turn timeout")
    } else {
        empty()
    }
}
