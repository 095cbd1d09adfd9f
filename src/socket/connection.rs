use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle, time};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;

use super::packet::{EnginePacket, Handshake, PacketKind, SocketPacket};
use crate::{EngineIo, Network, error::ApiError};

/// Capacity of the event channel between the socket task and the client.
pub const DEFAULT_CHANNEL_SIZE: usize = 100;

/// Pause between subscriptions in [`SocketClient::subscribe_all`].
pub const SUBSCRIBE_DELAY: Duration = Duration::from_millis(250);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Event received on the namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct SocketEvent {
    pub name: String,
    pub data: Value,
}

#[derive(Debug)]
enum Command {
    Send(String),
    Disconnect,
}

/// Socket.io client joined to a single namespace over the websocket transport.
///
/// Events are read by a background task and buffered in a bounded channel, a
/// connection failure is delivered as the last item before the channel closes.
#[derive(derive_more::Debug)]
pub struct SocketClient {
    namespace: String,
    #[debug(skip)]
    commands: mpsc::Sender<Command>,
    #[debug(skip)]
    events: mpsc::Receiver<Result<SocketEvent, ApiError>>,
    next_ack: u64,
    #[debug(skip)]
    task: JoinHandle<()>,
}

impl SocketClient {
    /// Connects to the socket server of the network and joins its namespace.
    pub async fn connect(network: &Network) -> Result<Self, ApiError> {
        let url = socket_url(network)?;
        match time::timeout(CONNECT_TIMEOUT, Self::handshake(&url, network)).await {
            Ok(Ok(client)) => {
                info!(%url, namespace = %network.namespace(), "socket connected");
                Ok(client)
            }
            Ok(Err(e)) => {
                warn!(%url, error = %e, "socket connection failed");
                Err(e)
            }
            Err(_) => {
                warn!(%url, "socket connection timed out");
                Err(ApiError::Socket("connection timed out".to_string()))
            }
        }
    }

    async fn handshake(url: &Url, network: &Network) -> Result<Self, ApiError> {
        let (ws, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws.split();
        let namespace = network.namespace().to_string();
        let engine_io = network.engine_io();

        let handshake = loop {
            match EnginePacket::decode(&next_text(&mut read).await?)? {
                EnginePacket::Open(handshake) => break handshake,
                other => debug!(?other, "packet before handshake"),
            }
        };
        debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "engine.io open");

        write
            .send(Message::Text(SocketPacket::connect(&namespace).to_frame()))
            .await?;
        loop {
            match EnginePacket::decode(&next_text(&mut read).await?)? {
                EnginePacket::Message(data) => {
                    let packet = SocketPacket::decode(&data)?;
                    match packet.kind {
                        PacketKind::Connect if packet.namespace == namespace => break,
                        PacketKind::ConnectError => {
                            return Err(ApiError::Socket(format!(
                                "namespace {} rejected: {}",
                                packet.namespace,
                                packet.data.unwrap_or(Value::Null)
                            )));
                        }
                        _ => trace!(?packet, "packet before namespace connect"),
                    }
                }
                EnginePacket::Ping(data) => {
                    write
                        .send(Message::Text(EnginePacket::Pong(data).encode()))
                        .await?
                }
                EnginePacket::Close => return Err(ApiError::Closed),
                _ => {}
            }
        }

        let (commands_tx, commands_rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
        let (events_tx, events_rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
        let task_namespace = namespace.clone();
        let task = tokio::spawn(async move {
            let result = run(
                write,
                read,
                commands_rx,
                &events_tx,
                engine_io,
                &handshake,
                &task_namespace,
            )
            .await;
            match result {
                Ok(()) => info!(namespace = %task_namespace, "socket disconnected"),
                Err(e) => {
                    warn!(namespace = %task_namespace, error = %e, "socket connection lost");
                    let _ = events_tx.send(Err(e)).await;
                }
            }
        });

        Ok(Self {
            namespace,
            commands: commands_tx,
            events: events_rx,
            next_ack: 0,
            task,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Emits an event on the namespace, returns its ack ID.
    pub async fn emit(&mut self, event: &str, data: Value) -> Result<u64, ApiError> {
        let ack_id = self.next_ack;
        self.next_ack += 1;
        let packet = SocketPacket::event(&self.namespace, event, data, Some(ack_id));
        self.commands
            .send(Command::Send(packet.to_frame()))
            .await
            .map_err(|_| ApiError::Closed)?;
        Ok(ack_id)
    }

    /// Subscribes to a channel, `params` are merged into the request.
    pub async fn subscribe(
        &mut self,
        channel: &str,
        params: &Map<String, Value>,
    ) -> Result<u64, ApiError> {
        debug!(%channel, ?params, "subscribe");
        self.emit("subscribe", subscription(channel, params)).await
    }

    /// Subscribes to several channels, pausing between requests.
    pub async fn subscribe_all(
        &mut self,
        subscriptions: &[(&str, Map<String, Value>)],
    ) -> Result<(), ApiError> {
        for (i, (channel, params)) in subscriptions.iter().enumerate() {
            if i > 0 {
                time::sleep(SUBSCRIBE_DELAY).await;
            }
            self.subscribe(channel, params).await?;
        }
        Ok(())
    }

    pub async fn unsubscribe(
        &mut self,
        channel: &str,
        params: &Map<String, Value>,
    ) -> Result<u64, ApiError> {
        debug!(%channel, "unsubscribe");
        self.emit("unsubscribe", subscription(channel, params)).await
    }

    /// Next event on the namespace.
    pub async fn recv(&mut self) -> Result<SocketEvent, ApiError> {
        self.events.recv().await.unwrap_or(Err(ApiError::Closed))
    }

    /// Leaves the namespace and closes the websocket.
    pub async fn disconnect(self) -> Result<(), ApiError> {
        // Task is already gone if the connection failed
        let _ = self.commands.send(Command::Disconnect).await;
        self.task
            .await
            .map_err(|e| ApiError::Socket(format!("socket task failed: {e}")))
    }
}

fn subscription(channel: &str, params: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("ch".to_string(), Value::String(channel.to_string()));
    body.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    Value::Object(body)
}

/// Websocket URL of the socket.io endpoint.
pub fn socket_url(network: &Network) -> Result<Url, ApiError> {
    let mut url = network.socket_url().clone();
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ApiError::Socket(format!("unsupported socket scheme: {other}")));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ApiError::Socket(format!("cannot use scheme {scheme}")))?;
    url.set_path("/socket.io/");
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", network.engine_io().query_value())
        .append_pair("transport", "websocket");
    Ok(url)
}

async fn next_text<S>(read: &mut S) -> Result<String, ApiError>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text),
            Some(Ok(Message::Close(_))) | None => return Err(ApiError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn run<W, R>(
    mut write: W,
    mut read: R,
    mut commands: mpsc::Receiver<Command>,
    events: &mpsc::Sender<Result<SocketEvent, ApiError>>,
    engine_io: EngineIo,
    handshake: &Handshake,
    namespace: &str,
) -> Result<(), ApiError>
where
    W: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let mut ping = time::interval(Duration::from_millis(handshake.ping_interval.max(1)));
    // First tick completes immediately
    ping.tick().await;

    loop {
        tokio::select! {
            frame = next_text(&mut read) => {
                match EnginePacket::decode(&frame?)? {
                    EnginePacket::Message(data) => {
                        let packet = SocketPacket::decode(&data)?;
                        match packet.kind {
                            PacketKind::Event => {
                                let Some((name, data)) = packet.event_parts() else {
                                    warn!(?packet, "malformed event");
                                    continue;
                                };
                                let event = SocketEvent { name: name.to_string(), data };
                                trace!(name = %event.name, "event");
                                if events.send(Ok(event)).await.is_err() {
                                    // Receiver dropped
                                    return Ok(());
                                }
                            }
                            PacketKind::Ack => {
                                debug!(ack_id = ?packet.ack_id, data = ?packet.data, "ack");
                            }
                            PacketKind::Disconnect if packet.namespace == namespace => {
                                return Err(ApiError::Closed);
                            }
                            PacketKind::ConnectError => {
                                return Err(ApiError::Socket(format!(
                                    "connect error: {}",
                                    packet.data.unwrap_or(Value::Null)
                                )));
                            }
                            _ => trace!(?packet, "ignored packet"),
                        }
                    }
                    EnginePacket::Ping(data) => {
                        write.send(Message::Text(EnginePacket::Pong(data).encode())).await?;
                    }
                    EnginePacket::Close => return Err(ApiError::Closed),
                    other => trace!(?other, "ignored engine.io packet"),
                }
            }
            command = commands.recv() => match command {
                Some(Command::Send(frame)) => write.send(Message::Text(frame)).await?,
                Some(Command::Disconnect) | None => {
                    write
                        .send(Message::Text(SocketPacket::disconnect(namespace).to_frame()))
                        .await?;
                    write.send(Message::Text(EnginePacket::Close.encode())).await?;
                    let _ = write.close().await;
                    return Ok(());
                }
            },
            _ = ping.tick(), if engine_io == EngineIo::V3 => {
                write.send(Message::Text(EnginePacket::Ping(String::new()).encode())).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_socket_url() {
        let url = socket_url(&Network::mainnet()).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.opium.exchange/socket.io/?EIO=3&transport=websocket"
        );

        let network = Network::custom(
            "http://127.0.0.1:1/v1",
            "http://127.0.0.1:2",
            "/v1",
            EngineIo::V4,
        )
        .unwrap();
        assert_eq!(
            socket_url(&network).unwrap().as_str(),
            "ws://127.0.0.1:2/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_socket_url_rejects_unknown_scheme() {
        let network =
            Network::custom("http://127.0.0.1:1/v1", "ftp://127.0.0.1", "/v1", EngineIo::V3)
                .unwrap();
        assert!(matches!(socket_url(&network), Err(ApiError::Socket(_))));
    }

    #[test]
    fn test_subscription_body() {
        let mut params = Map::new();
        params.insert("t".to_string(), json!("0xabc"));
        params.insert("c".to_string(), json!("0xdef"));
        assert_eq!(
            subscription("orderbook:orders:ticker", &params),
            json!({"ch": "orderbook:orders:ticker", "t": "0xabc", "c": "0xdef"})
        );
    }
}
