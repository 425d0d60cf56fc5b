//! Server network layer handling WebSocket connections and the event loop

use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, Outbound};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode, encode, ClientEvent, ProtocolError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    EventReceived { id: String, event: ClientEvent },
    /// A frame without an event, such as a pong
    Heartbeat { id: String },
    Disconnected { id: String },
}

/// Main server owning the listener, the dispatcher and one outbox per connection
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    config: ServerConfig,
    /// Frames waiting to be written, keyed by connection id
    outboxes: HashMap<String, mpsc::UnboundedSender<Message>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            dispatcher: Dispatcher::new(config.rules.clone(), config.max_clients),
            config,
            outboxes: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Main server loop. Every dispatcher call happens here, one event at a time.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut sweep = interval(Duration::from_secs(1));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }

                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::EventReceived { id, event }) => {
                            debug!("Received {} from {}", event.name(), id);
                            let outbound = self.dispatcher.handle_event(&id, event);
                            self.deliver(outbound);
                        }
                        Some(ServerMessage::Heartbeat { id }) => {
                            self.dispatcher.heartbeat(&id);
                        }
                        Some(ServerMessage::Disconnected { id }) => {
                            self.outboxes.remove(&id);
                            let outbound = self.dispatcher.disconnect(&id);
                            self.deliver(outbound);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = sweep.tick() => {
                    let outbound = self.dispatcher.check_timeouts(self.config.client_timeout);
                    self.deliver(outbound);
                }
            }
        }

        Ok(())
    }

    fn handle_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let Some(id) = self.dispatcher.connect(addr) else {
            warn!("Rejecting connection from {}: server full", addr);
            tokio::spawn(reject_connection(stream, addr));
            return;
        };

        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        self.outboxes.insert(id.clone(), outbox_tx);

        tokio::spawn(run_connection(
            id,
            stream,
            outbox_rx,
            self.server_tx.clone(),
            self.config.ping_interval,
        ));
    }

    /// Hands dispatcher output to the connection tasks
    fn deliver(&mut self, outbound: Vec<Outbound>) {
        for action in outbound {
            match action {
                Outbound::Event { to, event } => {
                    if to.is_empty() {
                        continue;
                    }
                    let frame = match encode(&event) {
                        Ok(text) => Message::text(text),
                        Err(e) => {
                            error!("Failed to encode {}: {}", event.name(), e);
                            continue;
                        }
                    };
                    for id in &to {
                        self.send_frame(id, frame.clone());
                    }
                }
                Outbound::Close { to } => {
                    if let Some(outbox) = self.outboxes.remove(&to) {
                        let _ = outbox.send(Message::Close(None));
                    }
                }
            }
        }
    }

    fn send_frame(&self, id: &str, frame: Message) {
        match self.outboxes.get(id) {
            Some(outbox) => {
                if outbox.send(frame).is_err() {
                    debug!("Connection {} already closed", id);
                }
            }
            None => debug!("No outbox for {}", id),
        }
    }
}

/// Drives one WebSocket connection until either side closes it
async fn run_connection(
    id: String,
    stream: TcpStream,
    mut outbox: mpsc::UnboundedReceiver<Message>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    ping_interval: Duration,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", id, e);
            let _ = server_tx.send(ServerMessage::Disconnected { id });
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let writer = async {
        let mut ping = interval(ping_interval);
        // First tick fires immediately
        ping.tick().await;

        loop {
            tokio::select! {
                message = outbox.recv() => {
                    let Some(message) = message else { break };
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = write.send(message).await {
                        debug!("Failed to write to {}: {}", id, e);
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    };

    let reader = async {
        while let Some(frame) = read.next().await {
            let message = match frame {
                Ok(Message::Text(text)) => match decode::<ClientEvent>(text.as_str()) {
                    Ok(event) => ServerMessage::EventReceived {
                        id: id.clone(),
                        event,
                    },
                    Err(e) => {
                        warn!("Ignoring malformed event from {}: {}", id, e);
                        ServerMessage::Heartbeat { id: id.clone() }
                    }
                },
                Ok(Message::Binary(_)) => {
                    warn!(
                        "Ignoring frame from {}: {}",
                        id,
                        ProtocolError::UnsupportedFrame("binary")
                    );
                    ServerMessage::Heartbeat { id: id.clone() }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => ServerMessage::Heartbeat { id: id.clone() },
                Err(e) => {
                    debug!("Read error on {}: {}", id, e);
                    break;
                }
            };

            if server_tx.send(message).is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = writer => {}
        _ = reader => {}
    }

    let _ = server_tx.send(ServerMessage::Disconnected { id });
}

/// Completes the handshake only to tell the client why it is turned away
async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake with rejected client {} failed: {}", addr, e);
            return;
        }
    };

    let frame = CloseFrame {
        code: CloseCode::Again,
        reason: "Server full".into(),
    };
    if let Err(e) = ws_stream.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame to {}: {}", addr, e);
    }
}
