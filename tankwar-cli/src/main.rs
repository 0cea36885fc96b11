//! TANKWAR CLI - Command-line client
//!
//! Commands:
//! - local: Seat a squad of bots (and optional observers) in one game
//! - online: Join a game as a single named player or observer

mod play;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tankwar")]
#[command(about = "TANKWAR hex tank battle client")]
struct Cli {
    /// Base seed for the bots' random tie-breaks
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game with several bots hosted by this process
    Local(play::LocalArgs),
    /// Join a game as one player
    Online(play::OnlineArgs),
}

fn main() -> anyhow::Result<()> {
    // RUST_LOG wins over the default
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Local(args) => play::run_local(args, cli.seed),
        Commands::Online(args) => play::run_online(args, cli.seed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_with_global_seed() {
        let cli = Cli::try_parse_from(["tankwar", "local", "--players", "3", "--seed", "7"]).unwrap();
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Commands::Local(args) => assert_eq!(args.players, 3),
            Commands::Online(_) => panic!("expected local"),
        }
    }

    #[test]
    fn test_online_requires_name() {
        assert!(Cli::try_parse_from(["tankwar", "online"]).is_err());
        assert!(Cli::try_parse_from(["tankwar", "online", "--name", "Boris"]).is_ok());
    }
}
