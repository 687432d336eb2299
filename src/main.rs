//! mastra-chat CLI entry point

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mastra_chat::adapters::cli::{ActiveReply, CliChannel};
use mastra_chat::chat::ChatSession;
use mastra_chat::client::AgentClient;
use mastra_chat::config::{self, Config};
use mastra_chat::ui;

#[derive(Parser)]
#[command(name = "mastra-chat")]
#[command(about = "Chat with agents on a Mastra server")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.mastra-chat/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the server URL from the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check whether the server is reachable
    Health,

    /// List the agents offered by the server
    Agents,

    /// Chat with an agent
    Chat {
        /// Agent to talk to
        #[arg(short, long)]
        agent: Option<String>,

        /// Message to send (omit for interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration and server status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let base_url = cli.base_url.as_deref();

    match cli.command {
        Commands::Init { force } => run_init(&path, force)?,

        Commands::Health => {
            let (config, client) = load_client(&path, base_url)?;
            if client.health_check().await {
                ui::print_success(&format!("{} is healthy", config.client.base_url()));
            } else {
                ui::print_error(&format!("{} is unreachable", config.client.base_url()));
                std::process::exit(1);
            }
        }

        Commands::Agents => {
            let (config, client) = load_client(&path, base_url)?;
            let mut session = ChatSession::new(client, config.default_agent.clone());
            if !session.connect().await {
                ui::print_warning("Server offered no agents; showing examples");
            }
            let selected = session.selected_agent().map(|a| a.id.clone());
            ui::print_agents(session.agents(), selected.as_deref());
        }

        Commands::Chat { agent, message } => {
            let (config, client) = load_client(&path, base_url)?;
            run_chat(&config, client, agent, message).await?;
        }

        Commands::Status => {
            let (config, client) = load_client(&path, base_url)?;
            let c = &config.client;
            println!("Config: {:?}", path);
            println!("Server: {}", c.base_url());
            println!(
                "Retries: {} (backoff {}ms, max {}ms)",
                c.retries, c.backoff_ms, c.max_backoff_ms
            );
            println!("Timeout: {}ms", c.timeout_ms);
            println!(
                "Default agent: {}",
                config.default_agent.as_deref().unwrap_or("(first available)")
            );
            println!(
                "Health: {}",
                if client.health_check().await { "✓" } else { "unreachable" }
            );
        }
    }

    Ok(())
}

/// Load the config file (or defaults) and build a client from it.
fn load_client(path: &Path, base_url: Option<&str>) -> Result<(Config, AgentClient)> {
    let mut config = config::load_or_default(path)?;
    if let Some(base_url) = base_url {
        config.client.base_url = base_url.to_string();
    }
    let client = AgentClient::new(&config.client).context("Invalid client configuration")?;
    Ok((config, client))
}

fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        ui::print_warning(&format!("{:?} already exists (use --force to overwrite)", path));
        return Ok(());
    }
    config::save(&Config::default(), path)?;
    ui::print_success(&format!("Wrote default config to {:?}", path));
    ui::print_step("Edit client.base_url to point at your Mastra server.");
    Ok(())
}

async fn run_chat(
    config: &Config,
    client: AgentClient,
    agent: Option<String>,
    message: Option<String>,
) -> Result<()> {
    let mut session = ChatSession::new(client, config.default_agent.clone());
    let connected = session.connect().await;
    if let Some(id) = agent {
        session.select_agent(&id)?;
    }

    let active: ActiveReply = Arc::new(Mutex::new(None));
    install_interrupt_handler(active.clone());

    let mut channel = CliChannel::new(session, active);

    if let Some(msg) = message {
        // Single message mode
        if !channel.run_once(&msg).await? {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Interactive mode
    ui::print_header(
        config.client.base_url(),
        channel.session().selected_agent(),
        connected,
    );
    if !connected {
        ui::print_warning("Server unreachable or without agents; replies will fail until it is up");
    }
    println!("  Type a message, /agents, /agent [id], /clear or exit (Ctrl+C stops a reply)");
    channel.run_interactive().await?;
    Ok(())
}

/// Ctrl+C cancels the streaming reply; outside a reply, pressing it twice
/// within three seconds exits.
fn install_interrupt_handler(active: ActiveReply) {
    let exit_flag = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler(move || {
        let streaming = active.lock().ok().and_then(|slot| slot.clone());
        if let Some(token) = streaming {
            token.cancel();
            return;
        }

        if exit_flag.load(Ordering::SeqCst) {
            println!("\n👋 Bye!");
            std::process::exit(0);
        } else {
            println!("\n⚠️  Press Ctrl+C again to exit");
            exit_flag.store(true, Ordering::SeqCst);

            // Reset flag after 3 seconds
            let flag = exit_flag.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_secs(3));
                flag.store(false, Ordering::SeqCst);
            });
        }
    })
    .ok();
}
