//! Local socket.io server and fixtures for tests.
//!
//! [`TestSocketServer`] speaks enough of the engine.io/socket.io websocket
//! protocol to exercise [`crate::socket::SocketClient`] and
//! [`crate::stream::OpiumStream`]: it performs the handshake, joins (or
//! rejects) the namespace, acknowledges events and answers `subscribe` requests
//! with the messages configured for the channel.
//!
//! [`TEST_PRIVATE_KEY`] and [`login_data`] cover the signing side of the
//! account endpoints.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::debug;

use crate::{
    EngineIo, Network,
    error::ApiError,
    socket::packet::{EnginePacket, PacketKind, SocketPacket},
};

/// Well-known development key (first Anvil/Hardhat account).
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address of [`TEST_PRIVATE_KEY`].
pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Default ping interval announced in the handshake, milliseconds.
const PING_INTERVAL_MS: u64 = 25000;

/// Typed-data document in the shape served by `GET /auth/loginData`.
pub fn login_data() -> Value {
    json!({
        "types": {
            "EIP712Domain": [
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"}
            ],
            "Login": [
                {"name": "message", "type": "string"},
                {"name": "nonce", "type": "uint256"}
            ]
        },
        "primaryType": "Login",
        "domain": {"name": "Opium Exchange", "version": "1"},
        "message": {"message": "Sign-in to your Opium account", "nonce": 42}
    })
}

/// Event received by the server.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedEvent {
    pub name: String,
    pub data: Value,
    pub ack_id: Option<u64>,
}

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<ReceivedEvent>,
    pings: usize,
    pongs: usize,
    disconnects: usize,
}

#[derive(Debug)]
struct ServerConfig {
    engine_io: EngineIo,
    namespace: String,
    ping_interval_ms: u64,
    channels: HashMap<String, Vec<Value>>,
}

/// Builder of [`TestSocketServer`].
#[derive(Debug)]
pub struct TestSocketServerBuilder {
    config: ServerConfig,
}

impl TestSocketServerBuilder {
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.config.namespace = namespace.to_string();
        self
    }

    pub fn ping_interval_ms(mut self, ping_interval_ms: u64) -> Self {
        self.config.ping_interval_ms = ping_interval_ms;
        self
    }

    /// Messages pushed on the channel right after it is subscribed to.
    pub fn channel(mut self, channel: &str, messages: Vec<Value>) -> Self {
        self.config.channels.insert(channel.to_string(), messages);
        self
    }

    pub async fn start(self) -> TestSocketServer {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test socket server");
        let addr = listener.local_addr().expect("test socket server address");
        let config = Arc::new(self.config);
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let task = {
            let config = config.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let config = config.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, &config, &recorded).await {
                            debug!(error = %e, "test connection ended");
                        }
                    });
                }
            })
        };

        TestSocketServer {
            addr,
            engine_io: config.engine_io,
            recorded,
            task,
        }
    }
}

/// Socket.io server on a local port, stopped on drop.
#[derive(Debug)]
pub struct TestSocketServer {
    addr: SocketAddr,
    engine_io: EngineIo,
    recorded: Arc<Mutex<Recorded>>,
    task: JoinHandle<()>,
}

impl TestSocketServer {
    /// Server joined to `/v1`, speaking the given engine.io revision.
    pub fn builder(engine_io: EngineIo) -> TestSocketServerBuilder {
        TestSocketServerBuilder {
            config: ServerConfig {
                engine_io,
                namespace: format!("/{}", crate::API_VERSION),
                ping_interval_ms: PING_INTERVAL_MS,
                channels: HashMap::new(),
            },
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Network with the given REST base URL and this server as the socket endpoint.
    pub fn network(&self, rest_url: &str) -> Network {
        Network::custom(
            rest_url,
            &self.url(),
            &format!("/{}", crate::API_VERSION),
            self.engine_io,
        )
        .expect("test network")
    }

    pub fn events(&self) -> Vec<ReceivedEvent> {
        self.recorded().events.clone()
    }

    /// Events with the given name.
    pub fn events_named(&self, name: &str) -> Vec<ReceivedEvent> {
        self.recorded()
            .events
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Engine.io pings received from clients.
    pub fn pings(&self) -> usize {
        self.recorded().pings
    }

    /// Engine.io pongs received from clients.
    pub fn pongs(&self) -> usize {
        self.recorded().pongs
    }

    /// Namespace disconnect packets received from clients.
    pub fn disconnects(&self) -> usize {
        self.recorded().disconnects
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("test server state")
    }
}

impl Drop for TestSocketServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    stream: TcpStream,
    config: &ServerConfig,
    recorded: &Mutex<Recorded>,
) -> Result<(), ApiError> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let handshake = json!({
        "sid": "test-sid",
        "upgrades": [],
        "pingInterval": config.ping_interval_ms,
        "pingTimeout": 5000
    });
    write.send(Message::Text(format!("0{handshake}"))).await?;
    match config.engine_io {
        // Engine.io 3 servers join the default namespace implicitly
        EngineIo::V3 => {
            write
                .send(Message::Text(SocketPacket::connect("/").to_frame()))
                .await?
        }
        EngineIo::V4 => {
            write
                .send(Message::Text(EnginePacket::Ping(String::new()).encode()))
                .await?
        }
    }

    while let Some(message) = read.next().await {
        let Message::Text(text) = message? else {
            continue;
        };
        let data = match EnginePacket::decode(&text)? {
            EnginePacket::Ping(data) => {
                lock(recorded).pings += 1;
                write
                    .send(Message::Text(EnginePacket::Pong(data).encode()))
                    .await?;
                continue;
            }
            EnginePacket::Pong(_) => {
                lock(recorded).pongs += 1;
                continue;
            }
            EnginePacket::Close => break,
            EnginePacket::Message(data) => data,
            _ => continue,
        };

        let packet = SocketPacket::decode(&data)?;
        match packet.kind {
            PacketKind::Connect if packet.namespace == config.namespace => {
                let mut reply = SocketPacket::connect(&config.namespace);
                reply.data = Some(json!({"sid": "test-namespace-sid"}));
                write.send(Message::Text(reply.to_frame())).await?;
            }
            PacketKind::Connect => {
                let reply = SocketPacket {
                    kind: PacketKind::ConnectError,
                    namespace: packet.namespace.clone(),
                    ack_id: None,
                    data: Some(json!({"message": "Invalid namespace"})),
                };
                write.send(Message::Text(reply.to_frame())).await?;
            }
            PacketKind::Disconnect => lock(recorded).disconnects += 1,
            PacketKind::Event => {
                let Some((name, body)) = packet.event_parts() else {
                    continue;
                };
                lock(recorded).events.push(ReceivedEvent {
                    name: name.to_string(),
                    data: body.clone(),
                    ack_id: packet.ack_id,
                });
                if let Some(ack_id) = packet.ack_id {
                    let ack = SocketPacket {
                        kind: PacketKind::Ack,
                        namespace: config.namespace.clone(),
                        ack_id: Some(ack_id),
                        data: Some(json!(["ok"])),
                    };
                    write.send(Message::Text(ack.to_frame())).await?;
                }
                if name != "subscribe" {
                    continue;
                }
                let Some(channel) = body.get("ch").and_then(Value::as_str) else {
                    continue;
                };
                for message in config.channels.get(channel).into_iter().flatten() {
                    let event =
                        SocketPacket::event(&config.namespace, channel, message.clone(), None);
                    write.send(Message::Text(event.to_frame())).await?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn lock(recorded: &Mutex<Recorded>) -> std::sync::MutexGuard<'_, Recorded> {
    recorded.lock().expect("test server state")
}
