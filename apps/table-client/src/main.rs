//! Table Client - joins one game and keeps a live, synced view of it.
//!
//! Snapshot, connectivity and notice changes are logged as JSON; actions are
//! read line by line from stdin.

mod commands;
mod telemetry;

use std::future::Future;
use std::sync::Arc;

use clap::Parser;
use game_sync::{
    GameSession, HttpAuthority, Notice, Roster, SessionHandle, SessionParams, SyncConfig,
    WsTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::commands::Command;

#[derive(Parser)]
#[command(name = "table-client")]
#[command(about = "Join a game table and keep its state in sync")]
struct Args {
    /// Base URL of the game server's HTTP API
    #[arg(long, env = "TABLE_SERVER_URL", default_value = "http://localhost:3001")]
    server_url: String,

    /// Realtime WebSocket endpoint
    #[arg(long, env = "TABLE_WS_URL", default_value = "ws://localhost:3001/ws")]
    ws_url: String,

    /// Lobby code of the game to join
    #[arg(long, env = "TABLE_GAME_CODE")]
    game_code: String,

    /// Name of the local player
    #[arg(long, env = "TABLE_PLAYER_NAME")]
    player: String,

    /// Player names in seat order, comma separated
    #[arg(long, env = "TABLE_ROSTER", value_delimiter = ',')]
    roster: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    telemetry::init_tracing(args.verbose);

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let authority = match HttpAuthority::new(args.server_url.as_str()) {
        Ok(authority) => authority,
        Err(e) => {
            eprintln!("❌ Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    info!(
        game_code = %args.game_code,
        player = %args.player,
        server_url = %args.server_url,
        ws_url = %args.ws_url,
        "Joining table"
    );

    let handle = GameSession::start(
        WsTransport::new(args.ws_url.as_str()),
        Arc::new(authority),
        SessionParams {
            game_code: args.game_code.clone(),
            player_name: args.player.clone(),
            roster: Roster::new(args.roster.iter().map(|name| name.trim())),
            config,
        },
    );

    spawn_watchers(&handle);
    read_commands(&handle).await;

    info!("Leaving table");
    handle.shutdown().await;
}

fn spawn_watchers(handle: &SessionHandle) {
    let mut snapshots = handle.subscribe_snapshot();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let Some(snapshot) = snapshots.borrow_and_update().clone() else {
                continue;
            };
            info!(
                version = snapshot.version,
                phase = ?snapshot.phase,
                status = ?snapshot.status,
                turn_owner = snapshot.turn_owner_position,
                trick = snapshot.trick_number,
                trump = ?snapshot.trump_suit,
                "Table updated"
            );
        }
    });

    let mut connectivity = handle.subscribe_connectivity();
    tokio::spawn(async move {
        while connectivity.changed().await.is_ok() {
            let current = connectivity.borrow_and_update().clone();
            info!(
                status = ?current.status,
                attempts = current.reconnect_attempts,
                last_error = ?current.last_error,
                fatal = current.fatal,
                "Connectivity changed"
            );
        }
    });

    let mut notices = handle.notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice {
                Notice::Fatal(err) => {
                    error!(code = %err.code(), error = %err, "Session needs attention")
                }
                Notice::ActionFailed { action_id, error } => {
                    warn!(action_id = %action_id, code = %error.code(), error = %error, "Action failed")
                }
                other => info!(notice = ?other, "Session notice"),
            }
        }
    });
}

async fn read_commands(handle: &SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(line) = until_interrupted(lines.next_line(), tokio::signal::ctrl_c()).await else {
            return;
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Failed to read stdin");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match commands::parse(&line) {
            Ok(Command::Act(action)) => {
                let Some(result) =
                    until_interrupted(handle.submit(action), tokio::signal::ctrl_c()).await
                else {
                    return;
                };
                match result {
                    Ok(action_id) => info!(action_id = %action_id, "Action accepted"),
                    Err(err) if err.is_terminal() => {
                        warn!(code = %err.code(), error = %err, "Action refused")
                    }
                    Err(err) => info!(error = %err, "Action pending, please wait"),
                }
            }
            Ok(Command::Status) => {
                let view = handle.view();
                info!(
                    connected = handle.is_connected(),
                    phase = ?view.phase,
                    pending = view.pending,
                    in_doubt = view.in_doubt,
                    last_synced_at = ?view.last_synced_at,
                    presence = ?view.presence,
                    version = handle.current_snapshot().map(|s| s.version),
                    "Status"
                );
            }
            Ok(Command::Reconnect) => {
                if let Err(err) = handle.reconnect().await {
                    warn!(error = %err, "Reconnect failed");
                }
            }
            Ok(Command::Quit) => return,
            Err(usage) => eprintln!("{usage}"),
        }
    }
}

/// `None` when `interrupt` completes before `work`.
async fn until_interrupted<F, I>(work: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future,
{
    tokio::select! {
        out = work => Some(out),
        _ = interrupt => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interrupt_cuts_a_long_submit_short() {
        let started = tokio::time::Instant::now();
        let out = until_interrupted(
            tokio::time::sleep(Duration::from_secs(25)),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;
        assert!(out.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn finished_work_is_returned() {
        let out = until_interrupted(async { 7 }, std::future::pending::<()>()).await;
        assert_eq!(out, Some(7));
    }
}
