//! Persistent connection to the detection backend.
//!
//! The connection runs on its own task: length-delimited frames over a
//! `TcpStream`, bincode-encoded [`WireEvent`]s, bounded reconnection
//! with a fixed delay between attempts. The session only ever sees the
//! four [`TransportEvent`]s.
use std::time::Duration;

use common::protocol::WireEvent;
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc, task::JoinHandle};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Events surfaced to the session driver.
#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    ConnectError(String),
    Message(WireEvent),
}

/// Bounded reconnection with a fixed delay between attempts.
///
/// The attempt counter resets on every successful connection, so the
/// budget applies per outage, not per process lifetime.
#[derive(Clone, Copy, Debug)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Handle to a spawned transport task.
pub struct TransportHandle {
    /// Single-slot, fire-and-forget outbound lane.
    pub outbound: mpsc::Sender<WireEvent>,
    /// Lifecycle and message events, in arrival order.
    pub events: mpsc::Receiver<TransportEvent>,
    pub task: JoinHandle<()>,
}

/// Spawn the connection task for `addr`.
pub fn spawn(addr: String, policy: ReconnectPolicy) -> TransportHandle {
    let (outbound_tx, outbound_rx) = mpsc::channel(1);
    let (event_tx, event_rx) = mpsc::channel(16);
    let task = tokio::spawn(run(addr, policy, outbound_rx, event_tx));

    TransportHandle {
        outbound: outbound_tx,
        events: event_rx,
        task,
    }
}

enum ConnectionEnd {
    Remote,
    SessionDropped,
}

async fn run(
    addr: String,
    policy: ReconnectPolicy,
    mut outbound: mpsc::Receiver<WireEvent>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut attempts = 0;
    while attempts < policy.max_attempts {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                log::info!("Connected to {}", &addr);
                attempts = 0;
                if events.send(TransportEvent::Connected).await.is_err() {
                    return;
                }

                match run_connection(stream, &mut outbound, &events).await {
                    ConnectionEnd::SessionDropped => return,
                    ConnectionEnd::Remote => {
                        if events.send(TransportEvent::Disconnected).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                attempts += 1;
                log::warn!(
                    "Connecting to {} failed (attempt {}/{}): {}",
                    &addr,
                    attempts,
                    policy.max_attempts,
                    err
                );
                if events
                    .send(TransportEvent::ConnectError(err.to_string()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }

        tokio::time::sleep(policy.delay).await;
    }

    log::error!(
        "Giving up on {} after {} attempts",
        &addr,
        policy.max_attempts
    );
}

async fn run_connection(
    stream: TcpStream,
    outbound: &mut mpsc::Receiver<WireEvent>,
    events: &mpsc::Sender<TransportEvent>,
) -> ConnectionEnd {
    // A frame captured while offline is stale by now.
    while outbound.try_recv().is_ok() {}

    let mut transport = Framed::new(stream, LengthDelimitedCodec::new());

    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let data = match msg.serialize() {
                        Ok(data) => bytes::Bytes::from(data),
                        Err(err) => {
                            log::warn!("Dropping unserializable {} event: {}", msg.name(), err);
                            continue;
                        }
                    };
                    log::debug!("Sending {} event ({} bytes)", msg.name(), data.len());
                    if let Err(err) = transport.send(data).await {
                        log::warn!("Send failed: {}", err);
                        return ConnectionEnd::Remote;
                    }
                }
                // The session dropped its sender; no one left to stream for.
                None => return ConnectionEnd::SessionDropped,
            },
            frame = transport.next() => match frame {
                Some(Ok(data)) => match WireEvent::deserialize(&data[..]) {
                    Ok(msg) => {
                        log::debug!("Received {} event ({} bytes)", msg.name(), data.len());
                        if events.send(TransportEvent::Message(msg)).await.is_err() {
                            return ConnectionEnd::SessionDropped;
                        }
                    }
                    Err(err) => log::warn!("Skipping undecodable message: {}", err),
                },
                Some(Err(err)) => {
                    log::warn!("Connection error: {}", err);
                    return ConnectionEnd::Remote;
                }
                None => return ConnectionEnd::Remote,
            },
        }
    }
}
