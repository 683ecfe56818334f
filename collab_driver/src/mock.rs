//! In-process doubles of the server session and the container runtime.

use collab_conn::{ConnError, Inbound, Link};
use collab_container::{ContainerError, ManageContainer};
use collab_core::test_case::TestCase;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    thread::sleep,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Ready,
    /// `pull` returned a message.
    Delivered,
    Push(String),
}

#[derive(Default)]
pub struct MockLink {
    inbound: Mutex<VecDeque<Result<Inbound, ConnError>>>,
    calls: Mutex<Vec<Call>>,
    pushed: Mutex<Vec<TestCase>>,
}

impl MockLink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn feed(&self, msg: Inbound) {
        self.inbound.lock().unwrap().push_back(Ok(msg));
    }

    pub fn feed_err(&self, e: ConnError) {
        self.inbound.lock().unwrap().push_back(Err(e));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<TestCase> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn ready_count(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Ready).count()
    }
}

impl Link for MockLink {
    fn report_ready(&self) -> Result<(), ConnError> {
        self.calls.lock().unwrap().push(Call::Ready);
        Ok(())
    }

    fn pull(&self, timeout: Duration) -> Result<Option<Inbound>, ConnError> {
        let next = self.inbound.lock().unwrap().pop_front();
        match next {
            Some(Ok(msg)) => {
                self.calls.lock().unwrap().push(Call::Delivered);
                Ok(Some(msg))
            }
            Some(Err(e)) => Err(e),
            None => {
                sleep(timeout.min(Duration::from_millis(10)));
                Ok(None)
            }
        }
    }

    fn push_test_case(&self, tc: &TestCase) -> Result<String, ConnError> {
        let mut pushed = self.pushed.lock().unwrap();
        self.calls.lock().unwrap().push(Call::Push(tc.id.clone()));
        pushed.push(tc.clone());
        Ok(format!("srv-{}", pushed.len() - 1))
    }
}

/// Records every operation as a string.
pub struct MockContainer {
    pub ops: Arc<Mutex<Vec<String>>>,
}

impl ManageContainer for MockContainer {
    fn name(&self) -> &str {
        "mock"
    }

    fn pause(&mut self) -> Result<(), ContainerError> {
        self.ops.lock().unwrap().push("pause".to_string());
        Ok(())
    }

    fn unpause(&mut self) -> Result<(), ContainerError> {
        self.ops.lock().unwrap().push("unpause".to_string());
        Ok(())
    }

    // always fails
    fn kill(&mut self) -> Result<(), ContainerError> {
        self.ops.lock().unwrap().push("kill".to_string());
        Err(ContainerError::NotFound("mock".to_string()))
    }

    fn set_cpu_shares(&mut self, shares: u64) -> Result<(), ContainerError> {
        self.ops.lock().unwrap().push(format!("set_cpu_shares({})", shares));
        Ok(())
    }
}

pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(10));
    }
    cond()
}
