//! Local interactive shell driving a dispatcher directly, without a network.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::protocol::{Command, ServerMessage};

pub const HELP: &str = "\
commands:
  call <call id>          create a new call
  answer <operator id>    operator answers its ringing call
  reject <operator id>    operator rejects its ringing call
  hangup <call id>        end or abandon a call
  info {calls | operators} show queue or operator state
  help                    show this message
  exit                    quit
";

/// Read commands from `input` until EOF or `exit`, writing one line per message
pub async fn run_console<R, W>(dispatcher: &mut Dispatcher, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "help" | "?" => {
                output.write_all(HELP.as_bytes()).await?;
                output.flush().await?;
                continue;
            }
            _ => {}
        }

        let messages: Vec<ServerMessage> = match Command::parse_line(line) {
            Ok(command) => {
                debug!("Console -> {}", command);
                command
                    .dispatch(dispatcher)
                    .iter()
                    .map(ServerMessage::from)
                    .collect()
            }
            Err(e) => vec![ServerMessage::from(&e)],
        };

        for message in messages {
            output.write_all(format!("{}\n", message).as_bytes()).await?;
        }
        output.flush().await?;
    }

    Ok(())
}
