//! Angora creates its whole output tree itself, lineage is not tracked.

use super::{classify_by_dir, file_name, wait_dir, WatchPolicy, WatcherError};
use collab_core::{fuzzer::FuzzerType, test_case::TestCaseKind};
use std::path::{Path, PathBuf};

const DIRS: [(&str, TestCaseKind); 3] = [
    ("queue", TestCaseKind::Normal),
    ("crashes", TestCaseKind::Crash),
    ("hangs", TestCaseKind::Hang),
];

pub struct AngoraWatch {
    root: PathBuf,
    dirs: Vec<PathBuf>,
}

impl AngoraWatch {
    pub fn new(output: &Path, ty: FuzzerType) -> Self {
        let root = output.join(ty.name());
        let dirs = DIRS.iter().map(|(d, _)| root.join(d)).collect();
        Self { root, dirs }
    }
}

impl WatchPolicy for AngoraWatch {
    fn target_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn prepare(&self, stop: &dyn Fn() -> bool) -> Result<(), WatcherError> {
        wait_dir(&self.root, stop)?;
        for dir in &self.dirs {
            wait_dir(dir, stop)?;
        }
        Ok(())
    }

    fn ignore(&self, path: &Path) -> bool {
        !file_name(path).map_or(false, |n| n.starts_with("id:"))
    }

    fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError> {
        classify_by_dir(path, &DIRS)
    }
}
