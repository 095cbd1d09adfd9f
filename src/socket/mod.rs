//! Minimal socket.io client over the websocket transport.

mod connection;
pub mod packet;

pub use connection::{
    DEFAULT_CHANNEL_SIZE, SUBSCRIBE_DELAY, SocketClient, SocketEvent, socket_url,
};
