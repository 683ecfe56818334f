//! Test cases exchanged with the coordination server.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestCaseKind {
    Normal,
    Crash,
    Hang,
}

impl fmt::Display for TestCaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestCaseKind::Normal => "normal",
            TestCaseKind::Crash => "crash",
            TestCaseKind::Hang => "hang",
        };
        write!(f, "{}", s)
    }
}

/// A test case produced by the local fuzzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Id observed locally, usually the file name.
    pub id: String,
    pub content: Vec<u8>,
    pub kind: TestCaseKind,
    /// Parents in the server id space.
    pub parents: Vec<String>,
}

impl TestCase {
    pub fn new(id: String, content: Vec<u8>, kind: TestCaseKind, parents: Vec<String>) -> Self {
        Self {
            id,
            content,
            kind,
            parents,
        }
    }
}

/// One test case of a job, identified by its server id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSeed {
    pub id: String,
    pub content: Vec<u8>,
}

/// Test cases the server wants imported by this fuzzer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedJob {
    pub fuzzer_id: String,
    pub seeds: Vec<JobSeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Run,
    Pause,
    Kill,
    SetPriority(u64),
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Run => write!(f, "run"),
            ControlCommand::Pause => write!(f, "pause"),
            ControlCommand::Kill => write!(f, "kill"),
            ControlCommand::SetPriority(p) => write!(f, "set_priority({})", p),
        }
    }
}

/// Control command addressed to one fuzzer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMsg {
    pub fuzzer_id: String,
    pub command: ControlCommand,
}
