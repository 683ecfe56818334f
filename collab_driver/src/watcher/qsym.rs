//! QSYM reuses existing directories, they are created ahead of time.
//!
//! Every test case QSYM keeps was derived from one that the receiver
//! imported, so `src` always refers to the sync table.

use super::{bad_name, classify_by_dir, decode_name, file_name, WatchPolicy, WatcherError};
use collab_core::{fuzzer::FuzzerType, ids::IdTables, test_case::TestCaseKind};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    sync::Arc,
};

const DIRS: [(&str, TestCaseKind); 3] = [
    ("queue", TestCaseKind::Normal),
    ("errors", TestCaseKind::Crash),
    ("hangs", TestCaseKind::Hang),
];

pub struct QsymWatch {
    dirs: Vec<PathBuf>,
    ids: Arc<IdTables>,
}

impl QsymWatch {
    pub fn new(output: &Path, ty: FuzzerType, ids: Arc<IdTables>) -> Result<Self, WatcherError> {
        let fuzzer_dir = output.join(ty.name());
        let dirs = DIRS
            .iter()
            .map(|(d, _)| fuzzer_dir.join(d))
            .collect::<Vec<_>>();
        for dir in &dirs {
            create_dir_all(dir)?;
        }
        Ok(Self { dirs, ids })
    }
}

impl WatchPolicy for QsymWatch {
    fn target_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn ignore(&self, path: &Path) -> bool {
        !file_name(path).map_or(false, |n| n.starts_with("id:"))
    }

    fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError> {
        classify_by_dir(path, &DIRS)
    }

    fn lineage(&self, path: &Path, kind: TestCaseKind) -> Result<Vec<String>, WatcherError> {
        if kind != TestCaseKind::Normal {
            return Ok(Vec::new());
        }
        let info = decode_name(path)?;
        if !info.contains("src") {
            return Ok(Vec::new());
        }
        let name = file_name(path)?;
        let src = info.number("src").map_err(|e| bad_name(name, e))?;
        match self.ids.sync(src) {
            Some(id) => Ok(vec![id]),
            None => {
                log::warn!("missing sync id: {}", src);
                Ok(Vec::new())
            }
        }
    }
}
