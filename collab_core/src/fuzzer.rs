//! Supported fuzzer types.

use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuzzerType {
    Afl,
    Angora,
    Qsym,
    LibFuzzer,
    Honggfuzz,
    AflFast,
    FairFuzz,
    Radamsa,
}

/// Directory layout and naming convention family a fuzzer type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Sequential-id mutational fuzzers (AFL and its forks).
    AflFamily,
    Angora,
    Qsym,
    LibFuzzer,
    Honggfuzz,
}

pub const FUZZER_TYPES: [FuzzerType; 8] = [
    FuzzerType::Afl,
    FuzzerType::Angora,
    FuzzerType::Qsym,
    FuzzerType::LibFuzzer,
    FuzzerType::Honggfuzz,
    FuzzerType::AflFast,
    FuzzerType::FairFuzz,
    FuzzerType::Radamsa,
];

impl FuzzerType {
    pub fn name(self) -> &'static str {
        match self {
            FuzzerType::Afl => "afl",
            FuzzerType::Angora => "angora",
            FuzzerType::Qsym => "qsym",
            FuzzerType::LibFuzzer => "libfuzzer",
            FuzzerType::Honggfuzz => "honggfuzz",
            FuzzerType::AflFast => "aflfast",
            FuzzerType::FairFuzz => "fairfuzz",
            FuzzerType::Radamsa => "radamsa",
        }
    }

    pub fn backend(self) -> Backend {
        match self {
            FuzzerType::Afl
            | FuzzerType::AflFast
            | FuzzerType::FairFuzz
            | FuzzerType::Radamsa => {
                Backend::AflFamily
            }
            FuzzerType::Angora => Backend::Angora,
            FuzzerType::Qsym => Backend::Qsym,
            FuzzerType::LibFuzzer => Backend::LibFuzzer,
            FuzzerType::Honggfuzz => Backend::Honggfuzz,
        }
    }
}

impl fmt::Display for FuzzerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Error)]
#[error("unsupported fuzzer type: {0}")]
pub struct ParseFuzzerTypeError(String);

impl FromStr for FuzzerType {
    type Err = ParseFuzzerTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FUZZER_TYPES
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| ParseFuzzerTypeError(s.to_string()))
    }
}
