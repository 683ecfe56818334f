//! honggfuzz reuses existing directories, they are created ahead of time.

use super::{classify_by_dir, WatchPolicy, WatcherError};
use collab_core::test_case::TestCaseKind;
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

const DIRS: [(&str, TestCaseKind); 2] = [
    ("queue", TestCaseKind::Normal),
    ("crashes", TestCaseKind::Crash),
];

pub struct HonggfuzzWatch {
    dirs: Vec<PathBuf>,
}

impl HonggfuzzWatch {
    pub fn new(output: &Path) -> Result<Self, WatcherError> {
        let dirs = DIRS.iter().map(|(d, _)| output.join(d)).collect::<Vec<_>>();
        for dir in &dirs {
            create_dir_all(dir)?;
        }
        Ok(Self { dirs })
    }
}

impl WatchPolicy for HonggfuzzWatch {
    fn target_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError> {
        classify_by_dir(path, &DIRS)
    }
}
