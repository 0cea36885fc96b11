//! Server documents: static map, dynamic game state, action log
//!
//! Field names follow the wire schema so these types deserialize straight
//! from response payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hex::Hex;
use crate::vehicle::{PlayerId, VehicleClass, VehicleId};

/// Wire action code for a move, as found in the action log
pub const ACTION_MOVE: u32 = 101;
/// Wire action code for a shot, as found in the action log
pub const ACTION_SHOOT: u32 = 102;

/// Static map definition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    /// Spiral radius plus one: hexes closer than `size` to the origin exist
    pub size: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: MapContent,
}

/// Terrain lists keyed by terrain name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapContent {
    #[serde(default)]
    pub base: Vec<Hex>,
    #[serde(default)]
    pub obstacle: Vec<Hex>,
    #[serde(default)]
    pub light_repair: Vec<Hex>,
    #[serde(default)]
    pub hard_repair: Vec<Hex>,
    #[serde(default)]
    pub catapult: Vec<Hex>,
}

/// A seat in the game, as reported by login and game state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub idx: PlayerId,
    pub name: String,
    #[serde(default)]
    pub is_observer: bool,
}

/// Per-vehicle dynamic fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub player_id: PlayerId,
    pub vehicle_type: VehicleClass,
    pub health: i32,
    pub spawn_position: Hex,
    pub position: Hex,
    #[serde(default)]
    pub capture_points: i32,
}

/// Dynamic game state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub num_players: u32,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub num_rounds: u32,
    #[serde(default)]
    pub current_round: u32,
    #[serde(default)]
    pub current_turn: u32,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
    #[serde(default)]
    pub observers: Vec<PlayerInfo>,
    /// The seat acting this turn; the server uses null or 0 between turns
    #[serde(default)]
    pub current_player_idx: Option<PlayerId>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub winner: Option<PlayerId>,
    #[serde(default)]
    pub vehicles: BTreeMap<VehicleId, VehicleSnapshot>,
    /// Cumulative round wins per player
    #[serde(default)]
    pub player_result_points: BTreeMap<PlayerId, u32>,
}

impl GameSnapshot {
    pub fn current_actor(&self) -> Option<PlayerId> {
        self.current_player_idx.filter(|&idx| idx != 0)
    }

    pub fn active_players(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.players.iter().filter(|p| !p.is_observer)
    }

    pub fn everyone_joined(&self) -> bool {
        self.active_players().count() as u32 >= self.num_players
    }
}

/// Target of a move or a shot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionData {
    pub vehicle_id: VehicleId,
    pub target: Hex,
}

/// One entry of the last turn's action log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAction {
    #[serde(default)]
    pub player_id: PlayerId,
    pub action_type: u32,
    pub data: ActionData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameActions {
    #[serde(default)]
    pub actions: Vec<GameAction>,
}
