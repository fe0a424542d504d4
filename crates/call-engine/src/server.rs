//! # Call Center Session Server
//!
//! TCP front end for a shared [`Dispatcher`]. Each connection is a session
//! that sends one JSON command per line and receives one JSON message per
//! line (see [`crate::protocol`]).
//!
//! ```text
//! ┌──────────┐   lines    ┌───────────────┐  write lock  ┌────────────┐
//! │ session  │ ─────────► │ decode + route│ ───────────► │ Dispatcher │
//! └──────────┘            └───────────────┘  read lock   └────────────┘
//!      ▲                          │          (info)
//!      │   replies + broadcasts   │
//!      └──────────────────────────┘
//! ```
//!
//! Mutating commands hold the dispatcher's write lock for the whole
//! operation, queue drain included, so no two commands interleave. `info`
//! queries share the read lock. Errors are sent to the originating session
//! only; updates are also broadcast to the other sessions when
//! [`ServerConfig::broadcast_updates`] is set.
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchboard_call_engine::{
//!     config::ServerConfig, dispatcher::Dispatcher, server::CallCenterServer,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = CallCenterServer::new(ServerConfig::default(), Dispatcher::new(10));
//! let handle = server.bind().await?;
//! println!("listening on {}", handle.local_addr());
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{CallCenterError, Result};
use crate::protocol::{Command, MessageKind, ServerMessage};

/// Dispatcher shared between sessions
pub type SharedDispatcher = Arc<RwLock<Dispatcher>>;

const BROADCAST_CAPACITY: usize = 256;

/// Updates produced by one session, fanned out to the others
#[derive(Debug, Clone)]
struct Broadcast {
    origin: Uuid,
    messages: Arc<Vec<ServerMessage>>,
}

/// State shared by the accept loop and every session task
struct SessionContext {
    config: ServerConfig,
    dispatcher: SharedDispatcher,
    sessions: DashMap<Uuid, SocketAddr>,
    broadcast_tx: broadcast::Sender<Broadcast>,
}

impl SessionContext {
    /// Decode one frame and run it against the dispatcher.
    ///
    /// Returns the replies for the originating session.
    fn process_frame(&self, session_id: Uuid, frame: &str) -> Vec<ServerMessage> {
        let command = match Command::from_json(frame) {
            Ok(command) => command,
            Err(e) => {
                warn!("Session {} sent malformed frame: {}", session_id, e);
                return vec![ServerMessage::from(&e)];
            }
        };

        debug!("Session {} -> {}", session_id, command);
        if let Command::Info(scope) = &command {
            let outcomes = self.dispatcher.read().info(scope);
            return outcomes.iter().map(ServerMessage::from).collect();
        }

        // The guard stays held until the updates are queued for the other
        // sessions, so observers see them in dispatcher order.
        let mut dispatcher = self.dispatcher.write();
        let outcomes = command.dispatch(&mut dispatcher);
        let replies: Vec<ServerMessage> = outcomes.iter().map(ServerMessage::from).collect();

        if self.config.broadcast_updates {
            let updates: Vec<ServerMessage> = replies
                .iter()
                .filter(|m| m.kind == MessageKind::Update)
                .cloned()
                .collect();
            if !updates.is_empty() {
                let _ = self.broadcast_tx.send(Broadcast {
                    origin: session_id,
                    messages: Arc::new(updates),
                });
            }
        }
        drop(dispatcher);

        replies
    }
}

/// What a session does with one item from the broadcast channel
#[derive(Debug)]
enum Relay {
    Forward(Arc<Vec<ServerMessage>>),
    Ignore,
    Closed,
}

fn relay(
    session_id: Uuid,
    received: std::result::Result<Broadcast, broadcast::error::RecvError>,
) -> Relay {
    match received {
        Ok(broadcast) if broadcast.origin != session_id => Relay::Forward(broadcast.messages),
        Ok(_) => Relay::Ignore,
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!("Session {} missed {} broadcasts", session_id, skipped);
            Relay::Forward(Arc::new(vec![ServerMessage::error(format!(
                "missed {} updates, send info to resynchronize",
                skipped
            ))]))
        }
        Err(broadcast::error::RecvError::Closed) => Relay::Closed,
    }
}

/// Call center TCP server
pub struct CallCenterServer {
    config: ServerConfig,
    dispatcher: SharedDispatcher,
}

impl CallCenterServer {
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self::with_shared(config, Arc::new(RwLock::new(dispatcher)))
    }

    /// Serve an existing shared dispatcher
    pub fn with_shared(config: ServerConfig, dispatcher: SharedDispatcher) -> Self {
        Self { config, dispatcher }
    }

    pub fn dispatcher(&self) -> SharedDispatcher {
        self.dispatcher.clone()
    }

    /// Bind the listener and start accepting sessions in the background
    pub async fn bind(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("📞 Listening on {}", local_addr);

        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(SessionContext {
            config: self.config,
            dispatcher: self.dispatcher.clone(),
            sessions: DashMap::new(),
            broadcast_tx,
        });

        let task = tokio::spawn(accept_loop(listener, ctx.clone(), shutdown_rx));

        Ok(ServerHandle {
            local_addr,
            dispatcher: self.dispatcher,
            ctx,
            shutdown_tx,
            task,
        })
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let handle = self.bind().await?;
        tokio::signal::ctrl_c().await?;
        info!("🛑 Shutdown requested");
        handle.shutdown().await
    }
}

/// Handle to a running server
pub struct ServerHandle {
    local_addr: SocketAddr,
    dispatcher: SharedDispatcher,
    ctx: Arc<SessionContext>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn dispatcher(&self) -> SharedDispatcher {
        self.dispatcher.clone()
    }

    /// Number of currently connected sessions
    pub fn session_count(&self) -> usize {
        self.ctx.sessions.len()
    }

    /// Stop accepting connections and close every session
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| CallCenterError::Io(std::io::Error::other(e)))?;
        info!("🛑 Server on {} stopped", self.local_addr);
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sessions = Vec::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let ctx = ctx.clone();
                    let shutdown = shutdown.clone();
                    sessions.push(tokio::spawn(async move {
                        if let Err(e) = run_session(stream, peer, ctx, shutdown).await {
                            warn!("Session with {} ended with error: {}", peer, e);
                        }
                    }));
                }
                Err(e) => error!("Failed to accept connection: {}", e),
            },
            _ = shutdown.changed() => break,
        }
        sessions.retain(|task: &JoinHandle<()>| !task.is_finished());
    }

    for task in sessions {
        let _ = task.await;
    }
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: Arc<SessionContext>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let session_id = Uuid::new_v4();
    let broadcasts = ctx.broadcast_tx.subscribe();
    ctx.sessions.insert(session_id, peer);
    info!("👤 Session {} connected from {} ({} active)", session_id, peer, ctx.sessions.len());

    let result = serve_session(session_id, stream, broadcasts, &ctx, &mut shutdown).await;

    ctx.sessions.remove(&session_id);
    info!("👋 Session {} disconnected ({} active)", session_id, ctx.sessions.len());
    result
}

async fn serve_session(
    session_id: Uuid,
    stream: TcpStream,
    mut broadcasts: broadcast::Receiver<Broadcast>,
    ctx: &SessionContext,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let idle_timeout = ctx.config.idle_timeout();
    let mut deadline = idle_timeout.map(|t| Instant::now() + t);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                deadline = idle_timeout.map(|t| Instant::now() + t);
                if line.trim().is_empty() {
                    continue;
                }
                let replies = ctx.process_frame(session_id, &line);
                write_messages(&mut writer, &replies).await?;
            }
            received = broadcasts.recv() => match relay(session_id, received) {
                Relay::Forward(messages) => write_messages(&mut writer, &messages).await?,
                Relay::Ignore => {}
                Relay::Closed => break,
            },
            _ = idle_expired(deadline) => {
                info!("⏰ Session {} idle, closing", session_id);
                break;
            }
            _ = shutdown.changed() => break,
        }
    }

    writer.shutdown().await.ok();
    Ok(())
}

async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn write_messages(writer: &mut OwnedWriteHalf, messages: &[ServerMessage]) -> Result<()> {
    for message in messages {
        writer.write_all(message.to_line()?.as_bytes()).await?;
    }
    writer.flush().await?;
    Ok(())
}
