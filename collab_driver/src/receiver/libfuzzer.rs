//! libFuzzer picks new inputs up from its corpus directory, which the
//! watcher also observes.

use super::{ReceiverError, SyncWriter};
use crate::watcher::libfuzzer::IMPORT_PREFIX;
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

pub struct LibFuzzerSync {
    dir: PathBuf,
}

impl LibFuzzerSync {
    pub fn new(output: &Path) -> Result<Self, ReceiverError> {
        // shared with the seeds, whoever comes first creates it
        let dir = output.join("queue");
        create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl SyncWriter for LibFuzzerSync {
    fn target_dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&mut self, server_id: &str) -> String {
        format!("{}{}", IMPORT_PREFIX, server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::{libfuzzer::LibFuzzerWatch, WatchPolicy};
    use std::fs;

    #[test]
    fn imports_are_prefixed() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = tmp.path().join("queue");
        fs::create_dir_all(&queue).unwrap();
        fs::write(queue.join("seed"), b"s").unwrap();

        let mut w = LibFuzzerSync::new(tmp.path()).unwrap();
        assert!(queue.join("seed").is_file());
        let name = w.file_name("srv-1");
        assert_eq!(name, "framework-srv-1");
        assert!(LibFuzzerWatch::new(tmp.path()).ignore(&w.target_dir().join(name)));
    }
}
