//! `switchboard` command-line tool: session server, network client and local console.

mod client;
mod settings;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use switchboard_call_engine::config::CallCenterConfig;
use switchboard_call_engine::console::run_console;
use switchboard_call_engine::logging::{log_welcome, setup_logging};
use switchboard_call_engine::server::CallCenterServer;
use switchboard_call_engine::Dispatcher;
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "Call center dispatcher: server, client and local console")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/switchboard/config.toml)
    #[arg(short, long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the dispatcher to TCP clients
    Server {
        /// Number of operators
        operators: Option<usize>,

        /// Listening port
        #[arg(short, long)]
        port: Option<u16>,

        /// Listening address, overrides the configured host and port
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Send updates only to the session that issued the command
        #[arg(long)]
        no_broadcast: bool,
    },

    /// Connect to a running server
    Client {
        /// Server host
        #[arg(default_value = "localhost")]
        host: String,

        /// Server port
        #[arg(default_value = "5678")]
        port: u16,
    },

    /// Run the dispatcher in this terminal
    Console {
        /// Number of operators
        operators: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = settings::load_config(cli.config.as_deref())?;
    let interactive = !matches!(cli.command, Commands::Server { .. });
    match cli.log_level {
        Some(level) => config.logging.level = level,
        // Keep the terminal for the shell; only warnings go to the log
        None if interactive => config.logging.level = "warn".to_string(),
        None => {}
    }

    match cli.command {
        Commands::Server {
            operators,
            port,
            bind,
            no_broadcast,
        } => {
            if let Some(operators) = operators {
                config.dispatcher.operators = operators;
            }
            if let Some(port) = port {
                config.server.bind_addr.set_port(port);
            }
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if no_broadcast {
                config.server.broadcast_updates = false;
            }
            serve(config).await
        }
        Commands::Client { host, port } => {
            setup_logging(&config.logging)?;
            client::run_client(&format!("{}:{}", host, port)).await
        }
        Commands::Console { operators } => {
            if let Some(operators) = operators {
                config.dispatcher.operators = operators;
            }
            console(config).await
        }
    }
}

async fn serve(config: CallCenterConfig) -> Result<()> {
    setup_logging(&config.logging)?;
    log_welcome("switchboard server", env!("CARGO_PKG_VERSION"));

    let dispatcher = Dispatcher::from_config(&config.dispatcher);
    info!(
        "👥 {} operators, broadcast updates: {}",
        dispatcher.pool_size(),
        config.server.broadcast_updates
    );

    CallCenterServer::new(config.server, dispatcher)
        .run()
        .await
        .context("Server failed")
}

async fn console(config: CallCenterConfig) -> Result<()> {
    setup_logging(&config.logging)?;

    let mut dispatcher = Dispatcher::from_config(&config.dispatcher);
    println!("{} operators ready, type 'help' for commands", dispatcher.pool_size());

    let stdin = BufReader::new(tokio::io::stdin());
    run_console(&mut dispatcher, stdin, tokio::io::stdout())
        .await
        .context("Console failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn server_arguments_mirror_positional_layout() {
        let cli = Cli::parse_from(["switchboard", "server", "5", "--port", "7000"]);
        match cli.command {
            Commands::Server { operators, port, .. } => {
                assert_eq!(operators, Some(5));
                assert_eq!(port, Some(7000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn client_defaults() {
        let cli = Cli::parse_from(["switchboard", "client"]);
        match cli.command {
            Commands::Client { host, port } => {
                assert_eq!(host, "localhost");
                assert_eq!(port, 5678);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
