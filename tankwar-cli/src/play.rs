//! Play commands - join a game server and play it to the end
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run_local(), run_online() - orchestration
//! - Level 2: build_config(), play_game(), report_results()
//! - Level 3: local_squad(), spawn_watcher(), summarize()
//! - Level 4: formatting utilities

use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use tankwar_client::{Game, GameConfig, GameOutcome, GameSummary, PlayerSpec, TurnView};
use tankwar_core::PlayerId;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

/// Flags shared by every play command
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Game settings JSON file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server address (host:port)
    #[arg(long)]
    pub server: Option<String>,

    /// Game name to create or join
    #[arg(long)]
    pub game: Option<String>,

    /// Turns per round
    #[arg(long)]
    pub turns: Option<u32>,

    /// Seats in the game (defaults to the number of local players)
    #[arg(long)]
    pub max_players: Option<u32>,

    /// Ask the server to start only once every seat is taken
    #[arg(long)]
    pub full: bool,

    /// Longest wait for the agents in one turn, in milliseconds
    #[arg(long)]
    pub turn_timeout_ms: Option<u64>,

    /// Chat message every bot sends when the game starts
    #[arg(long)]
    pub greeting: Option<String>,

    /// Log the world after every turn
    #[arg(long)]
    pub watch: bool,

    /// Write the effective settings to this file before playing
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Number of bots to seat
    #[arg(long, default_value = "3")]
    pub players: u32,

    /// Number of observers to attach
    #[arg(long, default_value = "0")]
    pub observers: u32,

    /// Name prefix for generated bots
    #[arg(long, default_value = "Bot")]
    pub prefix: String,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug)]
pub struct OnlineArgs {
    /// Player name
    #[arg(long)]
    pub name: String,

    /// Player password
    #[arg(long)]
    pub password: Option<String>,

    /// Watch instead of playing
    #[arg(long)]
    pub observer: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run the local command
///
/// 1. Build the game settings from file and flags
/// 2. Seat the bots and observers, play the game
/// 3. Report results
pub fn run_local(args: LocalArgs, seed: Option<u64>) -> Result<()> {
    let mut config = build_config(&args.session, seed)?;
    if config.players.is_empty() {
        config.players = local_squad(&args.prefix, args.players, args.observers);
    }
    let seated = config.players.iter().filter(|p| !p.observer).count() as u32;
    config.num_players = args.session.max_players.unwrap_or(seated.max(1));

    tracing::info!(
        "Starting local game on {}: {} bots, {} seats",
        config.server,
        seated,
        config.num_players
    );

    let summary = play_game(config, &args.session)?;
    report_results(&summary, args.session.json);

    Ok(())
}

/// Run the online command
///
/// 1. Build the game settings from file and flags
/// 2. Log in the single player and play the game
/// 3. Report results
pub fn run_online(args: OnlineArgs, seed: Option<u64>) -> Result<()> {
    let mut config = build_config(&args.session, seed)?;

    let mut player = if args.observer {
        PlayerSpec::observer(&args.name)
    } else {
        PlayerSpec::new(&args.name)
    };
    if let Some(password) = &args.password {
        player = player.with_password(password);
    }
    config.players = vec![player];
    if let Some(seats) = args.session.max_players {
        config.num_players = seats;
    }

    tracing::info!(
        "Joining {} as {}{}",
        config.server,
        args.name,
        if args.observer { " (observer)" } else { "" }
    );

    let summary = play_game(config, &args.session)?;
    report_results(&summary, args.session.json);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Load the settings file if given, then apply the flags on top
fn build_config(session: &SessionArgs, seed: Option<u64>) -> Result<GameConfig> {
    let mut config = match &session.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("Failed to load game settings: {}", path.display()))?,
        None => GameConfig::default(),
    };

    if let Some(server) = &session.server {
        config.server = server.clone();
    }
    if let Some(game) = &session.game {
        config = config.with_game(game.clone());
    }
    if let Some(turns) = session.turns {
        config = config.with_num_turns(turns);
    }
    if session.full {
        config = config.with_full(true);
    }
    if let Some(ms) = session.turn_timeout_ms {
        config = config.with_turn_timeout(Duration::from_millis(ms));
    }
    if let Some(greeting) = &session.greeting {
        config = config.with_greeting(greeting.clone());
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    Ok(config)
}

/// Connect, seat every configured player and play until the game ends
fn play_game(config: GameConfig, session: &SessionArgs) -> Result<GameSummary> {
    if let Some(path) = &session.save_config {
        config
            .save(path)
            .with_context(|| format!("Failed to save game settings: {}", path.display()))?;
    }

    let players = config.players.clone();
    let server = config.server.clone();
    let mut game = Game::connect(config).with_context(|| format!("Failed to connect to {}", server))?;

    let watcher = if session.watch {
        Some(spawn_watcher(game.subscribe()))
    } else {
        None
    };

    for spec in &players {
        game.add_local_player(spec)
            .with_context(|| format!("Failed to log in {}", spec.name))?;
    }

    let summary = game.run().context("Game aborted")?;

    if let Some(handle) = watcher {
        if handle.join().is_err() {
            tracing::warn!("World watcher panicked");
        }
    }

    Ok(summary)
}

/// Report game results
fn report_results(summary: &GameSummary, json: bool) {
    if json {
        print_json_results(summary);
    } else {
        print_text_results(summary);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Generated bots followed by generated observers
fn local_squad(prefix: &str, players: u32, observers: u32) -> Vec<PlayerSpec> {
    let bots = (1..=players).map(|n| PlayerSpec::new(format!("{} {}", prefix, n)));
    let watchers = (1..=observers).map(|n| PlayerSpec::observer(format!("Observer {}", n)));
    bots.chain(watchers).collect()
}

/// Log each published turn until the game drops its sender
fn spawn_watcher(views: Receiver<TurnView>) -> JoinHandle<()> {
    thread::spawn(move || {
        for view in views {
            let line = summarize(&view);
            tracing::info!("Round {} turn {}: {}", view.round, view.turn, line);
        }
    })
}

/// One-line state of the world: per player, vehicles alive and capture points
fn summarize(view: &TurnView) -> String {
    let mut parts = Vec::new();
    for &player in view.world.players() {
        let owned = view.world.vehicles_of(player);
        let alive = owned.iter().filter(|v| v.hp > 0).count();
        let capture: i32 = owned.iter().map(|v| v.capture_points).sum();
        let marker = if view.actor == Some(player) { "*" } else { "" };
        parts.push(format!("{}p{} {}/{} cp={}", marker, player, alive, owned.len(), capture));
    }
    parts.join(", ")
}

// ============================================================================
// LEVEL 4 - FORMATTING
// ============================================================================

fn display_name(summary: &GameSummary, idx: PlayerId) -> String {
    match summary.name_of(idx) {
        Some(name) => format!("{} ({})", name, idx),
        None => format!("player {}", idx),
    }
}

/// Print results as JSON
fn print_json_results(summary: &GameSummary) {
    #[derive(serde::Serialize)]
    struct JsonRound {
        round: u32,
        winner: Option<PlayerId>,
    }

    #[derive(serde::Serialize)]
    struct JsonPlayer {
        idx: PlayerId,
        name: String,
        wins: u32,
    }

    #[derive(serde::Serialize)]
    struct JsonOutput {
        rounds_played: usize,
        winner: Option<PlayerId>,
        draw: bool,
        players: Vec<JsonPlayer>,
        rounds: Vec<JsonRound>,
    }

    let winner = match summary.outcome {
        GameOutcome::Winner(idx) => Some(idx),
        GameOutcome::Draw => None,
    };
    let output = JsonOutput {
        rounds_played: summary.rounds.len(),
        winner,
        draw: winner.is_none(),
        players: summary
            .wins
            .iter()
            .map(|(&idx, &wins)| JsonPlayer {
                idx,
                name: summary.name_of(idx).unwrap_or_default().to_string(),
                wins,
            })
            .collect(),
        rounds: summary
            .rounds
            .iter()
            .map(|r| JsonRound {
                round: r.round,
                winner: r.winner,
            })
            .collect(),
    };

    if let Ok(json) = serde_json::to_string_pretty(&output) {
        println!("{}", json);
    }
}

/// Print results as text
fn print_text_results(summary: &GameSummary) {
    println!("\n=== Game Results ===");
    println!("Rounds played: {}", summary.rounds.len());

    for round in &summary.rounds {
        let winner = match round.winner {
            Some(idx) => display_name(summary, idx),
            None => "no winner".to_string(),
        };
        println!("  Round {:>2}: {}", round.round, winner);
    }

    println!("\nRound wins:");
    for (&idx, &wins) in &summary.wins {
        println!("  {:<24} {}", display_name(summary, idx), wins);
    }

    match summary.outcome {
        GameOutcome::Winner(idx) => println!("\nWinner: {}", display_name(summary, idx)),
        GameOutcome::Draw => println!("\nResult: draw"),
    }
}
