//! Connection to the coordination server.

use std::time::Duration;
use thiserror::Error;

pub mod connection;
pub mod message;

pub use connection::{ConnConfig, Connection, Inbound, Link};

#[derive(Debug, Error)]
pub enum ConnError {
    #[error("zmq: {0}")]
    Zmq(#[from] zmq::Error),
    #[error("decode: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("no reply in {0:?}")]
    Timeout(Duration),
    #[error("interrupted")]
    Interrupted,
    #[error("connection closed")]
    Closed,
}
