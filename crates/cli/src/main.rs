use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cli::{AppState, Config, Error, Result, Terminal};
use runtime::{ChatService, Conversation, StdioBridge};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolrelay")]
#[command(about = "Relay chat to a language model with MCP tool access", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: ./relay.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the chat page and WebSocket endpoint
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Chat in the terminal
    Chat,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Before tracing, so RUST_LOG may come from .env.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::discover(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Serve { host, port }) => cmd_serve(config, host, port).await,
        Some(Commands::Chat) => cmd_chat(config).await,
        None => cmd_serve(config, None, None).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let backend = config.backend()?;
    let bridge = StdioBridge::new(config.provider_command());

    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| Error::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!(
        %addr,
        model = backend.model(),
        provider = %bridge.command().program,
        dialect = ?config.server.dialect,
        "listening"
    );

    let state = AppState::new(backend, bridge)
        .with_system(config.model.system)
        .with_dialect(config.server.dialect);
    cli::serve(listener, state).await?;
    Ok(())
}

async fn cmd_chat(config: Config) -> Result<()> {
    let backend = config.backend()?;
    let bridge = StdioBridge::new(config.provider_command());

    println!("toolrelay v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", backend.model());
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut conversation = Conversation::new(backend);
    if let Some(system) = config.model.system {
        conversation = conversation.with_system(system);
    }
    let mut chat = ChatService::new(conversation, bridge);

    let interrupt = async {
        // If the handler cannot be installed, never report an interrupt.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    Terminal::stdio().run(&mut chat, interrupt).await?;
    Ok(())
}
