//! Interactive network client.

use std::io::Write as _;

use anyhow::{Context, Result};
use colored::Colorize;
use switchboard_call_engine::console::HELP;
use switchboard_call_engine::protocol::{Command, MessageKind, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const PROMPT: &str = "(Client) ";

/// Render one server message for the terminal
pub fn render(message: &ServerMessage) -> String {
    let kind = match message.kind {
        MessageKind::Update => message.kind.to_string().green(),
        MessageKind::Error => message.kind.to_string().red(),
    };
    format!("Server: {}: {}", kind, message.message)
}

/// Connect to `addr` and relay shell lines until `exit`, EOF or disconnect
pub async fn run_client(addr: &str) -> Result<()> {
    println!("Connecting to {}", addr);
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Connection to {} failed", addr))?;
    println!("Connected to server");

    let (reader, mut writer) = stream.into_split();
    let mut server_lines = BufReader::new(reader).lines();
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    prompt()?;
    loop {
        tokio::select! {
            line = server_lines.next_line() => match line? {
                Some(line) => {
                    match ServerMessage::from_line(&line) {
                        Ok(message) => println!("\n{}", render(&message)),
                        Err(e) => tracing::warn!("Unreadable server frame {:?}: {}", line, e),
                    }
                    prompt()?;
                }
                None => {
                    println!("\nLost connection.");
                    break;
                }
            },
            line = stdin_lines.next_line() => {
                let Some(line) = line? else {
                    println!("Bye bye");
                    break;
                };
                let line = line.trim();
                match line {
                    "" => {}
                    "exit" | "quit" => {
                        println!("Bye bye");
                        break;
                    }
                    "help" | "?" => print!("{}", HELP),
                    _ => match Command::parse_line(line) {
                        Ok(command) => {
                            let mut frame = serde_json::to_string(&command.to_request())?;
                            frame.push('\n');
                            writer.write_all(frame.as_bytes()).await?;
                        }
                        Err(e) => println!("{}: {}", "error".red(), e),
                    },
                }
                prompt()?;
            }
        }
    }

    writer.shutdown().await.ok();
    Ok(())
}

fn prompt() -> Result<()> {
    print!("{}", PROMPT);
    std::io::stdout().flush()?;
    Ok(())
}
