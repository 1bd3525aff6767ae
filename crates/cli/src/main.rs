mod config;
mod error;
mod shell;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use runtime::{Health, Service};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use error::{Error, Result};
use shell::Command;

const CONFIG_FILE: &str = "kvlog.toml";
const DEFAULT_LOG_FILTER: &str = "cli=info,runtime=info,storage=info";

#[derive(Parser)]
#[command(name = "kvlog")]
#[command(about = "A key-value store backed by a replayable event log", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./kvlog.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive shell
    Shell,
    /// Print the value of a key
    Get { key: String },
    /// Set a key
    Put { key: String, value: String },
    /// Remove a key
    Delete { key: String },
    /// Print the raw event log
    Log {
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Shell) | None => cmd_shell(&config).await,
        Some(Commands::Get { key }) => cmd_get(&config, &key).await,
        Some(Commands::Put { key, value }) => cmd_put(&config, key, value).await,
        Some(Commands::Delete { key }) => cmd_delete(&config, key).await,
        Some(Commands::Log { json }) => cmd_log(&config, json),
    }
}

async fn cmd_shell(config: &Config) -> Result<()> {
    println!("kvlog v{}", env!("CARGO_PKG_VERSION"));

    let service = Service::start(&config.log).await?;
    println!("Event log: {}", config.log.target());
    println!("Replayed {} events", service.replayed().events);
    println!("Type 'help' for commands, 'quit' or Ctrl+D to exit.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut warned = false;

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match shell::parse(input) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                if let Err(e) = execute(&service, command).await {
                    eprintln!("Error: {e}");
                }
            }
            Err(usage) => eprintln!("{usage}"),
        }

        if !warned && !service.health().is_healthy() {
            eprintln!("Warning: event log writer stopped, changes are no longer persisted");
            warned = true;
        }
    }

    let appended = service.shutdown().await?;
    println!("\n{appended} events written.");
    Ok(())
}

async fn execute(service: &Service, command: Command<'_>) -> Result<()> {
    match command {
        Command::Put { key, value } => {
            service.put(key, value).await?;
            println!("OK");
        }
        Command::Get { key } => match service.get(key) {
            Ok(value) => println!("{value}"),
            Err(e) if e.is_not_found() => println!("(not found)"),
            Err(e) => return Err(e.into()),
        },
        Command::Delete { key } => {
            service.delete(key).await?;
            println!("OK");
        }
        Command::List => {
            for (key, value) in service.store().snapshot() {
                println!("{key} = {value}");
            }
        }
        Command::Health => match service.health() {
            Health::Healthy => println!("healthy"),
            Health::Degraded(e) => println!("degraded: {e}"),
        },
        Command::Help => println!("{}", shell::HELP),
        Command::Quit => {}
    }
    Ok(())
}

async fn cmd_get(config: &Config, key: &str) -> Result<()> {
    let service = Service::start(&config.log).await?;
    let value = service.get(key);
    service.shutdown().await?;

    println!("{}", value?);
    Ok(())
}

async fn cmd_put(config: &Config, key: String, value: String) -> Result<()> {
    let service = Service::start(&config.log).await?;
    service.put(key, value).await?;
    service.shutdown().await?;
    Ok(service.ensure_healthy()?)
}

async fn cmd_delete(config: &Config, key: String) -> Result<()> {
    let service = Service::start(&config.log).await?;
    service.delete(key).await?;
    service.shutdown().await?;
    Ok(service.ensure_healthy()?)
}

fn cmd_log(config: &Config, json: bool) -> Result<()> {
    let mut backend = config.log.open()?;
    let mut out = io::stdout().lock();
    let mut failure: Option<Error> = None;

    backend.read_all(&mut |event| {
        let written = if json {
            serde_json::to_string(&event)
                .map_err(Error::from)
                .and_then(|line| writeln!(out, "{line}").map_err(Error::from))
        } else {
            writeln!(
                out,
                "{:>8}  {:<6}  {}  {}",
                event.sequence, event.kind, event.key, event.value
            )
            .map_err(Error::from)
        };

        match written {
            Ok(()) => true,
            Err(e) => {
                failure = Some(e);
                false
            }
        }
    })?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None if Path::new(CONFIG_FILE).exists() => Config::load(CONFIG_FILE)?,
        None => Config::default_config(),
    };
    let config = config.with_env()?;
    tracing::debug!(log = ?config.log, "configuration loaded");
    Ok(config)
}
