//! Main Entrypoint for the Tutorbot Console
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Dispatching the requested command against the REST API, or
//! 4. Running an interactive chat with one bot over the realtime session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tutorbot_console::{
    api::ApiClient,
    config::Config,
    credentials::TokenStore,
    models::{LoginRequest, NewBot, RegisterRequest},
};
use tutorbot_core::{BotRef, Role, SubmitOutcome, Turn};
use tutorbot_realtime::{ChatWindow, ConnectionState, SessionManager, WindowUpdate, WsConnector};

#[derive(Parser)]
#[command(name = "tutorbot", version, about = "Manage and chat with educational bots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and store its access token.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, env = "TUTORBOT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and store the access token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TUTORBOT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored access token.
    Logout,
    /// List, create or delete bots.
    Bots {
        #[command(subcommand)]
        action: BotsCommand,
    },
    /// Show dashboard analytics.
    Analytics,
    /// Chat with a bot in real time.
    Chat {
        /// Identifier of the bot, as shown by `bots list`.
        bot_id: String,
    },
}

#[derive(Subcommand)]
enum BotsCommand {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        description: Option<String>,
        /// Textbook file to upload with the bot.
        #[arg(long)]
        textbook: Option<PathBuf>,
    },
    Delete {
        bot_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so the chat transcript on stdout stays readable.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!(
        api = %config.api_base_url,
        realtime = %config.realtime_url,
        "Configuration loaded."
    );

    let tokens = Arc::new(TokenStore::new(config.token_path.clone()));
    let api = ApiClient::new(config.api_base(), tokens);

    // --- 3. Dispatch ---
    match cli.command {
        Command::Register {
            email,
            username,
            full_name,
            password,
        } => {
            let auth = api
                .register(&RegisterRequest {
                    email,
                    username,
                    password,
                    full_name,
                })
                .await?;
            println!("Registered. {}", describe_user(&auth.user));
            if auth.access_token.is_none() {
                println!("Run `tutorbot login` to start a session.");
            }
        }
        Command::Login { email, password } => {
            let auth = api.login(&LoginRequest { email, password }).await?;
            println!("Logged in. {}", describe_user(&auth.user));
        }
        Command::Logout => {
            api.logout()?;
            println!("Logged out.");
        }
        Command::Bots { action } => run_bots(&api, action).await?,
        Command::Analytics => {
            let dashboard = api.analytics().await?;
            println!("Dashboard for {}", dashboard.user_name);
            for (key, value) in &dashboard.analytics {
                println!("  {}: {}", key, value);
            }
            if !dashboard.recent_bots.is_empty() {
                println!("Recent bots:");
                for bot in &dashboard.recent_bots {
                    let name = bot
                        .get("bot_name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("(unnamed)");
                    println!("  - {}", name);
                }
            }
        }
        Command::Chat { bot_id } => run_chat(&config, &api, &bot_id).await?,
    }

    Ok(())
}

fn describe_user(user: &serde_json::Value) -> String {
    user.get("username")
        .or_else(|| user.get("email"))
        .and_then(|v| v.as_str())
        .map(|name| format!("Welcome, {}.", name))
        .unwrap_or_default()
}

async fn run_bots(api: &ApiClient, action: BotsCommand) -> Result<()> {
    match action {
        BotsCommand::List => {
            let bots = api.list_bots().await?;
            if bots.is_empty() {
                println!("No bots yet.");
            }
            for bot in bots {
                println!(
                    "{}\t{}\t{} (grade {})",
                    bot.bot_id, bot.bot_name, bot.subject, bot.grade
                );
            }
        }
        BotsCommand::Create {
            name,
            subject,
            grade,
            description,
            textbook,
        } => {
            let response = api
                .create_bot(&NewBot {
                    name,
                    subject,
                    grade,
                    description,
                    textbook,
                })
                .await?;
            println!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "Bot created.".to_string())
            );
        }
        BotsCommand::Delete { bot_id } => {
            api.delete_bot(&bot_id).await?;
            println!("Deleted bot {}.", bot_id);
        }
    }
    Ok(())
}

fn print_turn(api: &ApiClient, bot_name: &str, turn: &Turn) {
    let author = match turn.role() {
        Role::User => "you",
        Role::Bot => bot_name,
    };
    println!("{}: {}", author, turn.text());
    if let Some(image) = turn.image_reference() {
        println!("  [illustration] {}", api.image_url(image));
    }
}

/// Runs one chat window until `/quit` or end of input.
///
/// `/reconnect` re-opens the shared connection after a drop; nothing
/// reconnects automatically.
async fn run_chat(config: &Config, api: &ApiClient, bot_id: &str) -> Result<()> {
    let bot: BotRef = api
        .list_bots()
        .await?
        .into_iter()
        .find(|bot| bot.bot_id == bot_id)
        .map(BotRef::from)
        .with_context(|| format!("No bot with id '{}'", bot_id))?;
    let bot_name = bot.bot_name.clone();

    let session = Arc::new(SessionManager::new(
        Arc::new(WsConnector::new(config.realtime_url.as_str())),
        api.tokens().clone(),
    ));
    let mut window = ChatWindow::open(session.clone(), bot.clone()).await;

    println!(
        "{} • {} • Grade {}  (/quit to leave)",
        bot.bot_name, bot.subject, bot.grade
    );
    for turn in window.conversation().transcript() {
        print_turn(api, &bot_name, turn);
    }
    if !session.is_connected() {
        println!("! Not connected to the realtime service. Type /reconnect to retry.");
    }

    let mut state_rx = session.subscribe_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "/quit" => break,
                    "/reconnect" => {
                        let state = session.connect().await;
                        println!("! Connection: {:?}", state);
                    }
                    _ => match window.submit(&line) {
                        Ok(SubmitOutcome::Busy) => {
                            println!("(still waiting for {} to answer)", bot_name)
                        }
                        Ok(SubmitOutcome::Sent | SubmitOutcome::EmptyInput) => {}
                        Err(e) => println!("! {}", e),
                    },
                }
            }
            Some(update) = window.next_update() => match update {
                WindowUpdate::Composing => println!("{} is typing...", bot_name),
                WindowUpdate::Reply(turn) => print_turn(api, &bot_name, &turn),
            },
            Ok(()) = state_rx.changed() => {
                if *state_rx.borrow_and_update() == ConnectionState::Disconnected {
                    println!("! Connection lost. Type /reconnect to retry.");
                }
            }
        }
    }

    window.close();
    session.disconnect();
    Ok(())
}
