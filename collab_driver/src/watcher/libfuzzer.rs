//! libFuzzer keeps its corpus in `queue` and artifacts in `artifacts`, both
//! created by whoever launches it.

use super::{file_name, WatchPolicy, WatcherError};
use collab_core::test_case::TestCaseKind;
use std::path::{Path, PathBuf};

/// Prefix of the files the receiver imports into the shared queue.
pub const IMPORT_PREFIX: &str = "framework-";

pub struct LibFuzzerWatch {
    dirs: Vec<PathBuf>,
}

impl LibFuzzerWatch {
    pub fn new(output: &Path) -> Self {
        Self {
            dirs: vec![output.join("queue"), output.join("artifacts")],
        }
    }
}

impl WatchPolicy for LibFuzzerWatch {
    fn target_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn ignore(&self, path: &Path) -> bool {
        file_name(path).map_or(true, |n| n.starts_with(IMPORT_PREFIX))
    }

    fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError> {
        let name = file_name(path)?;
        let kind = if name.starts_with("crash-") || name.starts_with("leak-") {
            TestCaseKind::Crash
        } else if name.starts_with("timeout-") || name.starts_with("oom-") {
            TestCaseKind::Hang
        } else {
            TestCaseKind::Normal
        };
        Ok(kind)
    }
}
