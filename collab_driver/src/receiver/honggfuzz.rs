//! honggfuzz (patched) imports every file dropped into `<out>/sync`, names
//! do not matter.

use super::{reset_dir, ReceiverError, SyncWriter};
use std::path::{Path, PathBuf};

pub struct HonggfuzzSync {
    dir: PathBuf,
}

impl HonggfuzzSync {
    pub fn new(output: &Path) -> Result<Self, ReceiverError> {
        let dir = output.join("sync");
        reset_dir(&dir)?;
        Ok(Self { dir })
    }
}

impl SyncWriter for HonggfuzzSync {
    fn target_dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&mut self, server_id: &str) -> String {
        server_id.to_string()
    }
}
