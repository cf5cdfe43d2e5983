//! tabcollab -- command-line collaboration client.
//!
//! Usage:
//!   tabcollab join --host H --port P --user U --password W   # Join a server
//!   tabcollab --config path.toml join ...                   # Custom config
//!   tabcollab identity Carol                                # Color, RGB, track
//!   tabcollab notes                                         # Note table

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tabcollab_client::applier::{NotificationHandler, RemoteEventApplier};
use tabcollab_client::config::ClientConfig;
use tabcollab_client::{expand_tilde, identity, notes, CollabClient};
use tabcollab_document::{Document, TabDocument};
use tabcollab_protocol::Record;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "tabcollab", about = "Real-time tablature collaboration client")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "~/.tabcollab/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, log in and exchange events read from stdin
    Join {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
        /// Join an existing session
        #[arg(long, conflicts_with = "new_session")]
        session: Option<String>,
        /// Create a new session
        #[arg(long)]
        new_session: Option<String>,
        /// Tracks in the local document
        #[arg(long, default_value_t = 4)]
        tracks: u32,
    },
    /// Show the color and track offset for a login
    Identity { user: String },
    /// List the keyboard note names and their pitches
    Notes,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabcollab_client=info,tabcollab_protocol=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let cfg = ClientConfig::load_or_default(&config_path)?;

    match cli.command {
        Commands::Join {
            host,
            port,
            user,
            password,
            session,
            new_session,
            tracks,
        } => {
            let target = match (session, new_session) {
                (Some(name), _) => SessionChoice::Join(name),
                (None, Some(name)) => SessionChoice::Create(name),
                (None, None) => SessionChoice::None,
            };
            run_join(cfg, &host, port, &user, &password, target, tracks).await?;
        }
        Commands::Identity { user } => match identity::color_for(&user) {
            Some(color) => {
                let offset = identity::track_offset_for(&user).unwrap_or(0);
                println!("{user}: {color} ({}), track offset {offset}", color.hex());
            }
            None => println!("{user}: unmapped (first track, no color)"),
        },
        Commands::Notes => {
            for (name, pitch) in notes::NOTE_TABLE {
                println!("{name:<8} {pitch}");
            }
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

enum SessionChoice {
    Join(String),
    Create(String),
    None,
}

/// Prints chat and presence notifications to stdout.
struct ConsoleHandler;

impl NotificationHandler for ConsoleHandler {
    fn chat(&self, record: &Record) {
        println!("[chat] {}", record.fields.join(";"));
    }

    fn session_started(&self, record: &Record) {
        println!("[session] {} joined", record.field(0).unwrap_or("?"));
    }

    fn session_ended(&self, record: &Record) {
        println!("[session] {} left", record.field(0).unwrap_or("?"));
    }
}

async fn run_join(
    cfg: ClientConfig,
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    target: SessionChoice,
    tracks: u32,
) -> anyhow::Result<()> {
    let document = Arc::new(tokio::sync::Mutex::new(TabDocument::standard(tracks.max(1), 1)));
    let applier = RemoteEventApplier::new(Arc::new(ConsoleHandler));
    let client = CollabClient::with_applier(cfg, document.clone(), applier);

    client.try_connect(host, port).await?;
    client.try_login(user, password).await?;

    let sessions = client.get_known_sessions();
    if !sessions.is_empty() {
        println!("sessions: {}", sessions.join(", "));
    }
    let joined = match &target {
        SessionChoice::Join(name) => client.join_session(name),
        SessionChoice::Create(name) => client.create_session(name),
        SessionChoice::None => false,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&client, line.trim()) {
                    break;
                }
            }
            _ = watchdog.tick() => {
                if !client.is_connected() {
                    tracing::warn!("link lost, leaving");
                    break;
                }
            }
        }
    }

    if joined {
        client.leave_session();
    }
    client.disconnect().await;

    let (notes, measures) = {
        let doc = document.lock().await;
        (doc.note_count(), doc.measure_count())
    };
    let session = client.session();
    let status = serde_json::json!({
        "user": session.login,
        "state": session.state,
        "color": session.color,
        "track_offset": session.track_offset,
        "known_sessions": session.known_sessions,
        "notes": notes,
        "measures": measures,
    });
    println!("{status}");
    Ok(())
}

/// Run one stdin command. False ends the session.
fn handle_command(client: &CollabClient<TabDocument>, line: &str) -> bool {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "quit" | "exit" => return false,
        "sessions" => println!("sessions: {}", client.get_known_sessions().join(", ")),
        "chat" => {
            if !client.send_chat(rest) {
                eprintln!("chat not sent");
            }
        }
        "note" => {
            let mut args = rest.split_whitespace();
            let Some(name) = args.next() else {
                eprintln!("usage: note <NAME> [instrument]");
                return true;
            };
            if notes::pitch_for(name).is_none() {
                eprintln!("unknown note {name}; see `tabcollab notes`");
                return true;
            }
            let instrument = args.next().unwrap_or("piano");
            if !client.play_note(name, instrument) {
                eprintln!("note not sent");
            }
        }
        other => eprintln!("unknown command {other:?} (note, chat, sessions, quit)"),
    }
    true
}
