use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use parley::client::{EventType, PeerSession, Room, RoomEvent, RoomOptions, SessionDirectory};
use parley::validate::validate_user_name;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const ALL_EVENTS: [EventType; 12] = [
    EventType::Open,
    EventType::Closed,
    EventType::Error,
    EventType::VideoOffer,
    EventType::VideoAnswer,
    EventType::DataOffer,
    EventType::DataAnswer,
    EventType::NewIceCandidate,
    EventType::Chat,
    EventType::UserListInit,
    EventType::UserJoin,
    EventType::UserLeave,
];

#[derive(Parser)]
#[command(name = "parley", about = "Talk to a parley signaling server")]
struct Cli {
    /// Signaling server base URL
    #[arg(short, long, default_value = "http://localhost:8080/", global = true)]
    endpoint: String,

    /// Log filter, e.g. `debug` or `parley_client=trace`. Falls back to
    /// `RUST_LOG`, then `warn`.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a room and print its id
    Create,

    /// Join a room and chat from the terminal
    Join {
        #[arg(short, long)]
        room: String,

        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(directives) => EnvFilter::try_new(directives).context("Invalid log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let directory = SessionDirectory::new(&cli.endpoint)?;

    match cli.command {
        Commands::Create => {
            let room_id = directory.create_room().await?;
            println!("{} {}", "Room created:".green().bold(), room_id);
        }
        Commands::Join { room, name } => {
            let name = match name {
                Some(name) => name,
                None => prompt_name()?,
            };
            run_room(directory.get_room(RoomOptions::new(room)), &name).await?;
        }
    }

    Ok(())
}

fn prompt_name() -> Result<String> {
    Input::<String>::new()
        .with_prompt("Your name")
        .validate_with(|input: &String| {
            if validate_user_name(input) {
                Ok(())
            } else {
                Err("1-16 printable characters, no spaces")
            }
        })
        .interact_text()
        .context("Failed to read name")
}

async fn run_room(room: Room, name: &str) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    for event in ALL_EVENTS {
        let event_tx = event_tx.clone();
        room.on(event, move |e| {
            let _ = event_tx.send(e.clone());
        });
    }

    debug!("Joining {} as {}", room.room_id(), name);
    room.connect(name)?;
    println!("{}", "Connecting...".cyan());
    println!(
        "{}",
        "Type to chat. /who lists members, /data <name> opens a data link, /quit leaves.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sessions: Vec<PeerSession> = Vec::new();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if !handle_event(&room, event, &mut sessions).await {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else { break };
                if !handle_input(&room, line.trim(), &mut sessions).await {
                    break;
                }
            }
        }
    }

    for session in sessions {
        session.close().await;
    }
    room.disconnect();
    Ok(())
}

/// Returns false when the room is gone.
async fn handle_event(room: &Room, event: RoomEvent, sessions: &mut Vec<PeerSession>) -> bool {
    match event {
        RoomEvent::Open => println!("{} {}", "Joined".green().bold(), room.room_id()),
        RoomEvent::Closed => {
            println!("{}", "Connection to the server was lost".red().bold());
            return false;
        }
        RoomEvent::Error(message) => println!("{} {}", "Server error:".red(), message.payload),
        RoomEvent::UserListInit(names) => {
            println!("{} {}", "In the room:".cyan(), names.join(", "))
        }
        RoomEvent::UserJoin(name) => println!("{} {}", "+".green(), name),
        RoomEvent::UserLeave(name) => println!("{} {}", "-".yellow(), name),
        RoomEvent::Chat(message) => {
            let from = message.name.as_deref().unwrap_or("?");
            let text = match message.payload.as_str() {
                Some(text) => text.to_owned(),
                None => message.payload.to_string(),
            };
            println!("{} {}", format!("<{from}>").bold(), text);
        }
        RoomEvent::VideoOffer(session) => {
            println!(
                "{} {} wants a call; the terminal cannot show video, declining",
                "!".yellow(),
                session.target()
            );
            session.close().await;
        }
        RoomEvent::DataOffer(session) => {
            println!("{} accepting data link from {}", "!".cyan(), session.target());
            match session.answer().await {
                Ok(()) => sessions.push(session),
                Err(e) => println!("{} {}", "Failed to answer:".red(), e),
            }
        }
        RoomEvent::VideoAnswer(_) | RoomEvent::DataAnswer(_) | RoomEvent::NewIceCandidate(_) => {}
    }
    true
}

/// Returns false when the user asked to leave.
async fn handle_input(room: &Room, line: &str, sessions: &mut Vec<PeerSession>) -> bool {
    if line.is_empty() {
        return true;
    }
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return false,
        ("/who", _) => println!("{} {}", "In the room:".cyan(), room.user_list().join(", ")),
        ("/data", peer) => match room.new_data_offer(peer.trim()).await {
            Ok(Some(session)) => match session.open_channel("data").await {
                Ok(()) => {
                    println!("{} offering data link to {}", "!".cyan(), session.target());
                    sessions.push(session);
                }
                Err(e) => println!("{} {}", "Failed to open channel:".red(), e),
            },
            Ok(None) => println!("{} {} is not here", "!".yellow(), peer.trim()),
            Err(e) => println!("{} {}", "Failed to start data link:".red(), e),
        },
        _ => room.send_chat(json!(line), None),
    }
    true
}
