use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use human_panic::setup_panic;
use tokio::io::{AsyncBufReadExt, BufReader};

use playhead::api::{ApiClient, TrackId};
use playhead::app::cli::Args;
use playhead::app::{SessionAction, SessionState, UserSession};
use playhead::config::AppConfig;
use playhead::logging;
use playhead::player::{Coordinator, PlaybackState, PlayerHandle, Snapshot};

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        print!("{}", toml::to_string_pretty(&AppConfig::default())?);
        return Ok(());
    }

    let mut config = AppConfig::load();
    if let Some(api_base) = args.api_base {
        config.api_base = api_base;
    }
    if let Some(stream_base) = args.stream_base {
        config.stream_base = stream_base;
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = Some(log_dir);
    }

    logging::init(config.log_dir.as_deref())?;

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()?;
    let api = Arc::new(ApiClient::new(client, &config));

    let (handle, mut snapshots) =
        Coordinator::spawn(api.clone(), None, SessionState::default());

    // Print every state transition as the coordinator publishes it.
    tokio::spawn(async move {
        loop {
            {
                let snapshot = snapshots.borrow_and_update();
                print_snapshot(&snapshot);
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut user: Option<UserSession> = None;
    while let Ok(Some(line)) = lines.next_line().await {
        if !handle_line(line.trim(), &handle, &api, &mut user) {
            break;
        }
    }

    handle.shutdown();
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    let playback = match &snapshot.playback {
        PlaybackState::Empty => "empty".to_string(),
        PlaybackState::Loading { track_id } => format!("loading #{track_id}"),
        PlaybackState::Ready(track) => {
            let t = track.track();
            format!("ready #{} \"{}\" by {}", t.id, t.title, t.artist)
        }
    };
    println!(
        "queue={:?} index={:?} shuffle={} | {}",
        snapshot.queue, snapshot.current_index, snapshot.shuffle, playback
    );
}

/// One REPL line. Returns false to quit.
fn handle_line(
    line: &str,
    handle: &PlayerHandle,
    api: &ApiClient,
    user: &mut Option<UserSession>,
) -> bool {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some("queue") => {
            let ids: Vec<TrackId> = words.filter_map(|w| w.parse().ok()).collect();
            handle.dispatch(SessionAction::SetQueue(ids));
        }
        Some("add") => {
            let ids: Vec<TrackId> = words.filter_map(|w| w.parse().ok()).collect();
            handle.dispatch(SessionAction::AppendToQueue(ids));
        }
        Some("clear") => handle.dispatch(SessionAction::ClearQueue),
        Some("next") => handle.dispatch(SessionAction::IncrementCurrentIndex),
        Some("prev") => handle.dispatch(SessionAction::DecrementCurrentIndex),
        Some("pop") => handle.dispatch(SessionAction::PopFrontOfQueue),
        Some("ended") => handle.track_ended(),
        Some("pos") => match words.next().and_then(|w| w.parse::<f64>().ok()) {
            Some(elapsed) => handle.progress(elapsed),
            None => println!("usage: pos <elapsed-seconds>"),
        },
        Some("shuffle") => match words.next() {
            Some("on") => handle.dispatch(SessionAction::SetShuffle(true)),
            Some("off") => handle.dispatch(SessionAction::SetShuffle(false)),
            _ => println!("usage: shuffle on|off"),
        },
        Some("login") => {
            match (
                words.next().and_then(|w| w.parse().ok()),
                words.next().map(str::to_string),
            ) {
                (Some(id), Some(client_id)) => {
                    let session = UserSession { id, client_id };
                    *user = Some(session.clone());
                    handle.dispatch(SessionAction::SetUser(session));
                }
                _ => println!("usage: login <user-id> <client-id>"),
            }
        }
        Some("logout") => {
            *user = None;
            handle.dispatch(SessionAction::ClearUser);
        }
        Some("url") => match words.next().and_then(|w| w.parse().ok()) {
            Some(id) => {
                let client_id = user.as_ref().map(|u| u.client_id.as_str());
                println!("{}", api.stream_url(id, client_id));
            }
            None => println!("usage: url <track-id>"),
        },
        Some("quit") | Some("exit") => return false,
        Some(other) => {
            println!("unknown command: {other}");
            println!("commands: queue add clear next prev pop ended pos shuffle login logout url quit");
        }
    }
    true
}
