//! Registered session with the coordination server.
//!
//! Three zmq sockets are used: a REQ socket for control requests, a SUB socket
//! subscribed to the fuzzer id on which the server publishes commands and
//! jobs, and a REQ socket for submitting test cases.

use crate::{
    message::{
        decode_ctrl, encode_ctrl, CtrlCommand, FuzzerCtrlMsg, JobMsg, SeedMsg,
        TestCaseReportReply, CTRL_HEADER, SEED_HEADER,
    },
    ConnError,
};
use collab_core::{
    fuzzer::FuzzerType,
    test_case::{ControlMsg, SeedJob, TestCase},
};
use prost::Message;
use std::{
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

pub const DEFAULT_CTRL_URI: &str = "ipc:///tmp/server-ctrl.ipc";
pub const DEFAULT_PULL_URI: &str = "ipc:///tmp/server-push.ipc";
pub const DEFAULT_PUSH_URI: &str = "ipc:///tmp/server-pull.ipc";

/// Interval at which registration re-checks the stop predicate.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);
const DEREGISTER_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ConnConfig {
    pub fuzzer_type: FuzzerType,
    /// Control socket.
    pub ctrl_uri: String,
    /// Socket the server publishes commands and jobs on.
    pub pull_uri: String,
    /// Socket test cases are submitted to.
    pub push_uri: String,
}

impl ConnConfig {
    pub fn new(fuzzer_type: FuzzerType) -> Self {
        Self {
            fuzzer_type,
            ctrl_uri: DEFAULT_CTRL_URI.to_string(),
            pull_uri: DEFAULT_PULL_URI.to_string(),
            push_uri: DEFAULT_PUSH_URI.to_string(),
        }
    }
}

/// Message pulled from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Job(SeedJob),
    Control(ControlMsg),
}

/// Session operations used by the watcher and the receiver.
pub trait Link: Send + Sync {
    /// Tell the server that the receiver is ready for jobs.
    fn report_ready(&self) -> Result<(), ConnError>;
    /// Next message addressed to this fuzzer, `None` on timeout.
    fn pull(&self, timeout: Duration) -> Result<Option<Inbound>, ConnError>;
    /// Submit a test case, returns the id assigned by the server.
    fn push_test_case(&self, tc: &TestCase) -> Result<String, ConnError>;
}

type Slot = Mutex<Option<zmq::Socket>>;

pub struct Connection {
    fuzzer_id: String,
    /// Sockets are taken out on close.
    ctrl: Slot,
    pull: Slot,
    push: Slot,
    _ctx: zmq::Context,
}

impl Connection {
    /// Register with the server, blocks until the server answers or `stop`
    /// returns true.
    pub fn connect(config: &ConnConfig, stop: &dyn Fn() -> bool) -> Result<Self, ConnError> {
        let ctx = zmq::Context::new();
        let ctrl = open(&ctx, zmq::REQ, &config.ctrl_uri)?;
        log::info!(
            "registering {} fuzzer at {}",
            config.fuzzer_type,
            config.ctrl_uri
        );
        ctrl.send_multipart(encode_ctrl(&FuzzerCtrlMsg::register(config.fuzzer_type)), 0)?;
        while ctrl.poll(zmq::POLLIN, millis(POLL_INTERVAL))? == 0 {
            if stop() {
                return Err(ConnError::Interrupted);
            }
        }
        let reply = decode_ctrl(ctrl.recv_multipart(0)?)?;
        let fuzzer_id = match reply.command() {
            CtrlCommand::Register if !reply.fuzzer_id.is_empty() => reply.fuzzer_id,
            CtrlCommand::Register => {
                return Err(ConnError::Rejected("empty fuzzer id".to_string()))
            }
            other => return Err(ConnError::Rejected(format!("server replied {:?}", other))),
        };

        let sockets = open(&ctx, zmq::SUB, &config.pull_uri).and_then(|pull| {
            pull.set_subscribe(fuzzer_id.as_bytes())?;
            let push = open(&ctx, zmq::REQ, &config.push_uri)?;
            Ok((pull, push))
        });
        match sockets {
            Ok((pull, push)) => Ok(Self {
                fuzzer_id,
                ctrl: Mutex::new(Some(ctrl)),
                pull: Mutex::new(Some(pull)),
                push: Mutex::new(Some(push)),
                _ctx: ctx,
            }),
            Err(e) => {
                if let Err(e) = deregister(&ctrl, &fuzzer_id) {
                    log::warn!("failed to deregister {}: {}", fuzzer_id, e);
                }
                Err(e)
            }
        }
    }

    pub fn fuzzer_id(&self) -> &str {
        &self.fuzzer_id
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.ctrl).is_none()
    }

    /// Deregister and release all sockets. Only the first call has effect,
    /// sockets are released even if deregistration fails.
    pub fn close(&self) -> Result<(), ConnError> {
        let ctrl = match lock(&self.ctrl).take() {
            Some(s) => s,
            None => return Ok(()),
        };
        let ret = deregister(&ctrl, &self.fuzzer_id);
        drop(ctrl);
        lock(&self.pull).take();
        lock(&self.push).take();
        log::info!("connection of {} closed", self.fuzzer_id);
        ret
    }

    fn parse_inbound(&self, parts: Vec<Vec<u8>>) -> Result<Option<Inbound>, ConnError> {
        let (id, kind, body) = match parts.as_slice() {
            [id, kind, body] => (id, kind, body),
            _ => {
                return Err(ConnError::Protocol(format!(
                    "expected 3 parts, got {}",
                    parts.len()
                )))
            }
        };
        // subscriptions match by prefix
        if id.as_slice() != self.fuzzer_id.as_bytes() {
            log::debug!("discarding message for {}", String::from_utf8_lossy(id));
            return Ok(None);
        }
        let inbound = match kind.as_slice() {
            CTRL_HEADER => {
                Inbound::Control(FuzzerCtrlMsg::decode(body.as_slice())?.into_control()?)
            }
            SEED_HEADER => Inbound::Job(SeedJob::from(JobMsg::decode(body.as_slice())?)),
            other => {
                return Err(ConnError::Protocol(format!(
                    "unknown message kind: {:?}",
                    String::from_utf8_lossy(other)
                )))
            }
        };
        Ok(Some(inbound))
    }
}

impl Link for Connection {
    fn report_ready(&self) -> Result<(), ConnError> {
        let ctrl = lock(&self.ctrl);
        let sock = ctrl.as_ref().ok_or(ConnError::Closed)?;
        let msg = FuzzerCtrlMsg::request(CtrlCommand::Ready, &self.fuzzer_id);
        let reply = decode_ctrl(request(sock, encode_ctrl(&msg), REPLY_TIMEOUT)?)?;
        expect_ack(&reply, "ready")
    }

    fn pull(&self, timeout: Duration) -> Result<Option<Inbound>, ConnError> {
        let pull = lock(&self.pull);
        let sock = pull.as_ref().ok_or(ConnError::Closed)?;
        let deadline = Instant::now() + timeout;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            if sock.poll(zmq::POLLIN, millis(wait))? == 0 {
                return Ok(None);
            }
            if let Some(inbound) = self.parse_inbound(sock.recv_multipart(0)?)? {
                return Ok(Some(inbound));
            }
        }
    }

    fn push_test_case(&self, tc: &TestCase) -> Result<String, ConnError> {
        let body = SeedMsg::from_test_case(&self.fuzzer_id, tc).encode_to_vec();
        let push = lock(&self.push);
        let sock = push.as_ref().ok_or(ConnError::Closed)?;
        let mut reply = request(sock, vec![SEED_HEADER.to_vec(), body], REPLY_TIMEOUT)?;
        if reply.len() != 1 {
            return Err(ConnError::Protocol(format!(
                "expected 1 part reply, got {}",
                reply.len()
            )));
        }
        let reply = TestCaseReportReply::decode(reply.remove(0).as_slice())?;
        if !reply.error.is_empty() {
            return Err(ConnError::Rejected(reply.error));
        }
        if reply.id.is_empty() {
            return Err(ConnError::Protocol("empty test case id".to_string()));
        }
        Ok(reply.id)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("close on drop: {}", e);
        }
    }
}

fn lock(m: &Slot) -> MutexGuard<'_, Option<zmq::Socket>> {
    m.lock().unwrap()
}

fn millis(d: Duration) -> i64 {
    d.as_millis() as i64
}

fn open(ctx: &zmq::Context, ty: zmq::SocketType, uri: &str) -> Result<zmq::Socket, ConnError> {
    let sock = ctx.socket(ty)?;
    sock.set_linger(0)?;
    sock.connect(uri)?;
    Ok(sock)
}

/// Send `parts` on a REQ socket and wait at most `timeout` for the reply.
fn request(
    sock: &zmq::Socket,
    parts: Vec<Vec<u8>>,
    timeout: Duration,
) -> Result<Vec<Vec<u8>>, ConnError> {
    sock.send_multipart(parts, 0)?;
    if sock.poll(zmq::POLLIN, millis(timeout))? == 0 {
        return Err(ConnError::Timeout(timeout));
    }
    Ok(sock.recv_multipart(0)?)
}

fn expect_ack(reply: &FuzzerCtrlMsg, what: &str) -> Result<(), ConnError> {
    match reply.command() {
        CtrlCommand::Ack => Ok(()),
        other => Err(ConnError::Protocol(format!(
            "expected ack for {}, got {:?}",
            what, other
        ))),
    }
}

fn deregister(ctrl: &zmq::Socket, fuzzer_id: &str) -> Result<(), ConnError> {
    let msg = FuzzerCtrlMsg::request(CtrlCommand::Deregister, fuzzer_id);
    let reply = decode_ctrl(request(ctrl, encode_ctrl(&msg), DEREGISTER_TIMEOUT)?)?;
    expect_ack(&reply, "deregister")
}
