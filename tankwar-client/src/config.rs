//! Game session configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_FRAME_LEN;

pub const DEFAULT_SERVER: &str = "wgforge-srv.wargaming.net:443";

/// A player hosted by this process
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSpec {
    pub name: String,
    pub password: Option<String>,
    pub observer: bool,
}

impl PlayerSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn observer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observer: true,
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Game session configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Server address, `host:port`
    pub server: String,
    /// Game to join or create (None = the server's default matchmaking)
    pub game: Option<String>,
    /// Turn limit per round (None = server default)
    pub num_turns: Option<u32>,
    /// Seats in the game
    pub num_players: u32,
    /// Ask the server to fill missing seats
    pub is_full: bool,
    /// Longest the coordinator waits for agents in one turn
    pub turn_timeout_ms: u64,
    /// Polling period while waiting for players to join
    pub poll_interval_ms: u64,
    /// Largest accepted response payload
    pub max_frame_len: usize,
    /// Base seed for bot tie-breaks (None = random)
    pub seed: Option<u64>,
    /// Chat message each bot sends on its first turn
    pub greeting: Option<String>,
    /// Players hosted by this process
    pub players: Vec<PlayerSpec>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            game: None,
            num_turns: None,
            num_players: 1,
            is_full: false,
            turn_timeout_ms: 30_000,
            poll_interval_ms: 100,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            seed: None,
            greeting: None,
            players: Vec::new(),
        }
    }
}

impl GameConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
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
        self.num_players = players;
        self
    }

    pub fn with_full(mut self, full: bool) -> Self {
        self.is_full = full;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_greeting(mut self, message: impl Into<String>) -> Self {
        self.greeting = Some(message.into());
        self
    }

    pub fn with_player(mut self, player: PlayerSpec) -> Self {
        self.players.push(player);
        self
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Load config from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.num_players, 1);
        assert_eq!(config.turn_timeout(), Duration::from_secs(30));
        assert!(config.players.is_empty());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{"game": "g1", "players": [{"name": "bot"}]}"#).unwrap();
        assert_eq!(config.game.as_deref(), Some("g1"));
        assert_eq!(config.players, vec![PlayerSpec::new("bot")]);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("tankwar-config-{}.json", std::process::id()));
        let config = GameConfig::new("localhost:9000")
            .with_num_players(3)
            .with_seed(9)
            .with_player(PlayerSpec::observer("watcher"));
        config.save(&path).unwrap();
        let loaded = GameConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
