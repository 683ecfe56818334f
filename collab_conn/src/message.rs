//! Protobuf messages exchanged with the server, see `fuzzerctrlmsg.proto` and
//! `seedmsg.proto` of the coordination server.

use crate::ConnError;
use collab_core::{
    fuzzer::FuzzerType,
    test_case::{ControlCommand, ControlMsg, JobSeed, SeedJob, TestCase, TestCaseKind},
};
use prost::Message;
use std::convert::TryFrom;

/// Discriminator part of control messages.
pub const CTRL_HEADER: &[u8] = b"C";
/// Discriminator part of test case messages.
pub const SEED_HEADER: &[u8] = b"S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CtrlCommand {
    Unspecified = 0,
    Register = 1,
    Deregister = 2,
    Ready = 3,
    Ack = 4,
    Err = 5,
    Run = 6,
    Pause = 7,
    Kill = 8,
    SetPriority = 9,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoFuzzerType {
    Unspecified = 0,
    Afl = 1,
    Angora = 2,
    Qsym = 3,
    LibFuzzer = 4,
    Honggfuzz = 5,
    AflFast = 6,
    FairFuzz = 7,
    Radamsa = 8,
}

impl From<FuzzerType> for ProtoFuzzerType {
    fn from(ty: FuzzerType) -> Self {
        match ty {
            FuzzerType::Afl => ProtoFuzzerType::Afl,
            FuzzerType::Angora => ProtoFuzzerType::Angora,
            FuzzerType::Qsym => ProtoFuzzerType::Qsym,
            FuzzerType::LibFuzzer => ProtoFuzzerType::LibFuzzer,
            FuzzerType::Honggfuzz => ProtoFuzzerType::Honggfuzz,
            FuzzerType::AflFast => ProtoFuzzerType::AflFast,
            FuzzerType::FairFuzz => ProtoFuzzerType::FairFuzz,
            FuzzerType::Radamsa => ProtoFuzzerType::Radamsa,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SeedType {
    Normal = 0,
    Crash = 1,
    Hang = 2,
}

impl From<TestCaseKind> for SeedType {
    fn from(kind: TestCaseKind) -> Self {
        match kind {
            TestCaseKind::Normal => SeedType::Normal,
            TestCaseKind::Crash => SeedType::Crash,
            TestCaseKind::Hang => SeedType::Hang,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FuzzerCtrlMsg {
    #[prost(enumeration = "CtrlCommand", tag = "1")]
    pub command: i32,
    #[prost(string, tag = "2")]
    pub fuzzer_id: String,
    #[prost(enumeration = "ProtoFuzzerType", tag = "3")]
    pub fuzzer_type: i32,
    #[prost(int32, tag = "4")]
    pub fuzzer_priority: i32,
}

impl FuzzerCtrlMsg {
    pub fn request(command: CtrlCommand, fuzzer_id: &str) -> Self {
        Self {
            command: command as i32,
            fuzzer_id: fuzzer_id.to_string(),
            ..Default::default()
        }
    }

    pub fn register(ty: FuzzerType) -> Self {
        Self {
            fuzzer_type: ProtoFuzzerType::from(ty) as i32,
            ..Self::request(CtrlCommand::Register, "")
        }
    }

    /// Convert a command published by the server into a container command.
    pub fn into_control(self) -> Result<ControlMsg, ConnError> {
        let command = match self.command() {
            CtrlCommand::Run => ControlCommand::Run,
            CtrlCommand::Pause => ControlCommand::Pause,
            CtrlCommand::Kill => ControlCommand::Kill,
            CtrlCommand::SetPriority => {
                let p = u64::try_from(self.fuzzer_priority).map_err(|_| {
                    ConnError::Protocol(format!("negative priority: {}", self.fuzzer_priority))
                })?;
                ControlCommand::SetPriority(p)
            }
            other => {
                return Err(ConnError::Protocol(format!(
                    "unexpected control command: {:?}",
                    other
                )))
            }
        };
        Ok(ControlMsg {
            fuzzer_id: self.fuzzer_id,
            command,
        })
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SeedMsg {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub fuzzer_id: String,
    #[prost(bytes = "vec", tag = "3")]
    pub content: Vec<u8>,
    #[prost(enumeration = "SeedType", tag = "4")]
    pub r#type: i32,
    #[prost(string, repeated, tag = "5")]
    pub parent_ids: Vec<String>,
}

impl SeedMsg {
    pub fn from_test_case(fuzzer_id: &str, tc: &TestCase) -> Self {
        Self {
            id: tc.id.clone(),
            fuzzer_id: fuzzer_id.to_string(),
            content: tc.content.clone(),
            r#type: SeedType::from(tc.kind) as i32,
            parent_ids: tc.parents.clone(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobMsg {
    #[prost(string, tag = "1")]
    pub fuzzer_id: String,
    #[prost(message, repeated, tag = "2")]
    pub seeds: Vec<SeedMsg>,
}

impl From<JobMsg> for SeedJob {
    fn from(job: JobMsg) -> Self {
        SeedJob {
            fuzzer_id: job.fuzzer_id,
            seeds: job
                .seeds
                .into_iter()
                .map(|s| JobSeed {
                    id: s.id,
                    content: s.content,
                })
                .collect(),
        }
    }
}

/// Reply to a submitted test case, either the server id or an error.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestCaseReportReply {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub error: String,
}

/// Parts of a control request or reply.
pub fn encode_ctrl(msg: &FuzzerCtrlMsg) -> Vec<Vec<u8>> {
    vec![CTRL_HEADER.to_vec(), msg.encode_to_vec()]
}

pub fn decode_ctrl(parts: Vec<Vec<u8>>) -> Result<FuzzerCtrlMsg, ConnError> {
    match parts.as_slice() {
        [header, body] if header.as_slice() == CTRL_HEADER => {
            Ok(FuzzerCtrlMsg::decode(body.as_slice())?)
        }
        _ => Err(ConnError::Protocol(format!(
            "malformed control message with {} parts",
            parts.len()
        ))),
    }
}
