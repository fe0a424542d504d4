//! Session server tests over real TCP connections
//!
//! Each test binds an ephemeral port on 127.0.0.1.

use std::time::Duration;

use anyhow::Result;
use serial_test::serial;
use switchboard_call_engine::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(handle: &ServerHandle) -> Result<Self> {
        let stream = TcpStream::connect(handle.local_addr()).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn send_raw(&mut self, frame: &str) -> Result<()> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        let request = Command::parse_line(line)?.to_request();
        self.send_raw(&serde_json::to_string(&request)?).await
    }

    async fn recv(&mut self) -> Result<ServerMessage> {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await??
            .ok_or_else(|| anyhow::anyhow!("connection closed"))?;
        Ok(ServerMessage::from_line(&line)?)
    }

    async fn recv_n(&mut self, n: usize) -> Result<Vec<ServerMessage>> {
        let mut messages = Vec::with_capacity(n);
        for _ in 0..n {
            messages.push(self.recv().await?);
        }
        Ok(messages)
    }
}

async fn start_server(pool: usize, broadcast_updates: bool) -> Result<ServerHandle> {
    start_server_with(pool, broadcast_updates, None).await
}

async fn start_server_with(
    pool: usize,
    broadcast_updates: bool,
    idle_timeout_secs: Option<u64>,
) -> Result<ServerHandle> {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("switchboard_call_engine=debug")
        .try_init();

    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse()?,
        broadcast_updates,
        idle_timeout_secs,
    };
    Ok(CallCenterServer::new(config, Dispatcher::new(pool)).bind().await?)
}

#[tokio::test]
#[serial]
async fn test_call_flow_over_tcp() -> Result<()> {
    let handle = start_server(1, false).await?;
    let mut client = TestClient::connect(&handle).await?;

    client.send("call c1").await?;
    assert_eq!(
        client.recv_n(2).await?,
        vec![
            ServerMessage::update("call c1 received"),
            ServerMessage::update("call c1 ringing for operator A"),
        ]
    );

    client.send("call c2").await?;
    assert_eq!(client.recv_n(2).await?[1], ServerMessage::update("call c2 waiting in queue"));

    client.send("answer A").await?;
    assert_eq!(client.recv().await?, ServerMessage::update("call c1 answered by operator A"));

    client.send("hangup c1").await?;
    assert_eq!(
        client.recv_n(2).await?,
        vec![
            ServerMessage::update("call c1 finished and operator A available"),
            ServerMessage::update("call c2 ringing for operator A"),
        ]
    );

    client.send("info calls").await?;
    assert_eq!(
        client.recv().await?,
        ServerMessage::update("calls waiting: [] assigned: [c2]")
    );

    handle.dispatcher().read().check_invariants()?;
    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_malformed_frames_keep_session_open() -> Result<()> {
    let handle = start_server(1, false).await?;
    let mut client = TestClient::connect(&handle).await?;

    client.send_raw(r#"{"command": "call"}"#).await?;
    assert_eq!(client.recv().await?, ServerMessage::error("'command' or 'id' not found"));

    client.send_raw(r#"{"command": "dial", "id": "c1"}"#).await?;
    assert_eq!(client.recv().await?, ServerMessage::error("invalid command dial"));

    client.send_raw("not json").await?;
    assert_eq!(client.recv().await?.kind, MessageKind::Error);

    client.send("reject A").await?;
    assert_eq!(client.recv().await?, ServerMessage::error("operator A not in ringing state"));

    client.send("call c1").await?;
    assert_eq!(client.recv().await?, ServerMessage::update("call c1 received"));

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_updates_are_broadcast_to_other_sessions() -> Result<()> {
    let handle = start_server(1, true).await?;
    let mut caller = TestClient::connect(&handle).await?;
    let mut operator = TestClient::connect(&handle).await?;

    // Make sure both sessions are registered before traffic starts
    for _ in 0..50 {
        if handle.session_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.session_count(), 2);

    caller.send("call c1").await?;
    assert_eq!(caller.recv_n(2).await?.len(), 2);
    assert_eq!(
        operator.recv_n(2).await?,
        vec![
            ServerMessage::update("call c1 received"),
            ServerMessage::update("call c1 ringing for operator A"),
        ]
    );

    // Errors stay with the session that caused them
    operator.send("answer B").await?;
    assert_eq!(operator.recv().await?.kind, MessageKind::Error);

    operator.send("answer A").await?;
    assert_eq!(operator.recv().await?, ServerMessage::update("call c1 answered by operator A"));
    assert_eq!(caller.recv().await?, ServerMessage::update("call c1 answered by operator A"));

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_shutdown_closes_sessions() -> Result<()> {
    let handle = start_server(0, false).await?;
    let mut client = TestClient::connect(&handle).await?;
    client.send("call c1").await?;
    client.recv_n(2).await?;

    handle.shutdown().await?;
    let next = timeout(Duration::from_secs(5), client.lines.next_line()).await??;
    assert!(next.is_none());
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_idle_session_is_closed() -> Result<()> {
    let handle = start_server_with(1, false, Some(1)).await?;
    let mut client = TestClient::connect(&handle).await?;

    let started = tokio::time::Instant::now();
    let next = timeout(Duration::from_secs(5), client.lines.next_line()).await??;
    assert!(next.is_none());
    assert!(started.elapsed() >= Duration::from_millis(900));

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_traffic_resets_idle_deadline() -> Result<()> {
    let handle = start_server_with(1, false, Some(1)).await?;
    let mut client = TestClient::connect(&handle).await?;

    // Each command lands before the previous deadline would have expired
    for i in 0..3 {
        tokio::time::sleep(Duration::from_millis(600)).await;
        client.send(&format!("call c{}", i)).await?;
        assert_eq!(
            client.recv().await?,
            ServerMessage::update(format!("call c{} received", i))
        );
        client.recv().await?;
    }

    let next = timeout(Duration::from_secs(5), client.lines.next_line()).await??;
    assert!(next.is_none());
    handle.shutdown().await?;
    Ok(())
}
