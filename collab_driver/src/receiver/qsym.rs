//! QSYM pairs with an AFL instance and reads its `fuzzer_stats` to learn how
//! AFL runs the target. The receiver plays that instance.

use super::{afl::{AflSync, SYNC_NAME}, ReceiverError, SyncWriter};
use collab_core::ids::IdTables;
use std::{fs, path::Path, sync::Arc};

pub struct QsymSync {
    inner: AflSync,
}

impl QsymSync {
    pub fn new(
        output: &Path,
        afl_path: &Path,
        target_cmdline: &[String],
        ids: Arc<IdTables>,
    ) -> Result<Self, ReceiverError> {
        let inner = AflSync::new(output, ids)?;
        // qsym takes the target from after `--` and the afl dir from the binary path
        let stats = format!(
            "command_line: {}/afl-fuzz -- {}",
            afl_path.display(),
            target_cmdline.join(" ")
        );
        fs::write(output.join(SYNC_NAME).join("fuzzer_stats"), stats)?;
        Ok(Self { inner })
    }
}

impl SyncWriter for QsymSync {
    fn target_dir(&self) -> &Path {
        self.inner.target_dir()
    }

    fn file_name(&mut self, server_id: &str) -> String {
        self.inner.file_name(server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ids = Arc::new(IdTables::new());
        let cmdline = vec!["/bin/target".to_string(), "-f".to_string(), "@@".to_string()];
        let afl = Path::new("/opt/afl");
        let mut w = QsymSync::new(tmp.path(), afl, &cmdline, Arc::clone(&ids)).unwrap();
        let stats = fs::read_to_string(tmp.path().join("framework/fuzzer_stats")).unwrap();
        assert_eq!(stats, "command_line: /opt/afl/afl-fuzz -- /bin/target -f @@");

        assert_eq!(w.target_dir(), tmp.path().join("framework/queue"));
        assert_eq!(w.file_name("srv-q"), "id:000000");
        assert_eq!(ids.sync(0), Some("srv-q".to_string()));
    }
}
