//! AFL imports from `<out>/framework/queue` when launched with a sync dir.
//!
//! Only files following its `id:NNNNNN` naming are picked up, the sequence
//! number is what later shows up as `src` in the names of derived test cases.

use super::{reset_dir, ReceiverError, SyncWriter};
use collab_core::ids::IdTables;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Name of the fake fuzzer instance the receiver plays in the sync dir.
pub const SYNC_NAME: &str = "framework";

pub struct AflSync {
    dir: PathBuf,
    next_id: u64,
    ids: Arc<IdTables>,
}

impl AflSync {
    /// The queue is emptied so the server and the fuzzer start from a known state.
    pub fn new(output: &Path, ids: Arc<IdTables>) -> Result<Self, ReceiverError> {
        let dir = output.join(SYNC_NAME).join("queue");
        reset_dir(&dir)?;
        Ok(Self {
            dir,
            next_id: 0,
            ids,
        })
    }
}

impl SyncWriter for AflSync {
    fn target_dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&mut self, server_id: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert_sync(id, server_id.to_string());
        format!("id:{:06}", id)
    }
}
