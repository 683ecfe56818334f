//! AFL and its forks.
//!
//! AFL reuses its output directory but deletes and recreates `queue`,
//! `crashes` and `hangs` on startup, so only the fuzzer directory is created
//! here and the sub-directories are waited for.

use super::{bad_name, classify_by_dir, decode_name, file_name, WatchPolicy, WatcherError};
use collab_core::{fuzzer::FuzzerType, ids::IdTables, test_case::TestCaseKind};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    sync::Arc,
};

const DIRS: [(&str, TestCaseKind); 3] = [
    ("queue", TestCaseKind::Normal),
    ("crashes", TestCaseKind::Crash),
    ("hangs", TestCaseKind::Hang),
];

pub struct AflWatch {
    dirs: Vec<PathBuf>,
    ids: Arc<IdTables>,
}

impl AflWatch {
    pub fn new(output: &Path, ty: FuzzerType, ids: Arc<IdTables>) -> Result<Self, WatcherError> {
        let fuzzer_dir = output.join(ty.name());
        create_dir_all(&fuzzer_dir)?;
        let dirs = DIRS.iter().map(|(d, _)| fuzzer_dir.join(d)).collect();
        Ok(Self { dirs, ids })
    }
}

impl WatchPolicy for AflWatch {
    fn target_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn ignore(&self, path: &Path) -> bool {
        !file_name(path).map_or(false, |n| n.starts_with("id:"))
    }

    fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError> {
        classify_by_dir(path, &DIRS)
    }

    fn lineage(&self, path: &Path, _kind: TestCaseKind) -> Result<Vec<String>, WatcherError> {
        let info = decode_name(path)?;
        if info.contains("orig") {
            return Ok(Vec::new());
        }
        let name = file_name(path)?;
        let mut parents = Vec::new();
        if info.contains("sync") {
            // imported by the receiver, src is the sequence number it wrote
            let src = info.number("src").map_err(|e| bad_name(name, e))?;
            match self.ids.sync(src) {
                Some(id) => parents.push(id),
                None => log::warn!("missing sync id: {}", src),
            }
        } else {
            for src in info.sources().map_err(|e| bad_name(name, e))? {
                match self.ids.local(src) {
                    Some(id) => parents.push(id),
                    None => log::warn!("missing local id: {}", src),
                }
            }
        }
        Ok(parents)
    }

    fn record(
        &self,
        path: &Path,
        kind: TestCaseKind,
        server_id: &str,
    ) -> Result<(), WatcherError> {
        if kind == TestCaseKind::Normal {
            let name = file_name(path)?;
            let id = decode_name(path)?
                .number("id")
                .map_err(|e| bad_name(name, e))?;
            self.ids.insert_local(id, server_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::{wait_until, MockLink},
        watcher::Watcher,
    };
    use std::{fs, thread};

    fn afl_watch(out: &Path) -> (AflWatch, Arc<IdTables>) {
        let ids = Arc::new(IdTables::new());
        (AflWatch::new(out, FuzzerType::Afl, Arc::clone(&ids)).unwrap(), ids)
    }

    #[test]
    fn dirs_and_ignore() {
        let tmp = tempfile::tempdir().unwrap();
        let (w, _) = afl_watch(tmp.path());
        assert!(tmp.path().join("afl").is_dir());
        assert_eq!(w.target_dirs()[1], tmp.path().join("afl/crashes"));
        assert!(w.ignore(Path::new("/o/afl/crashes/README.txt")));
        let crash = Path::new("/o/afl/crashes/id:000000,sig:11,src:000001,op:havoc,rep:2");
        assert!(!w.ignore(crash));

        let ids = Arc::new(IdTables::new());
        let w = AflWatch::new(tmp.path(), FuzzerType::AflFast, ids).unwrap();
        assert_eq!(w.target_dirs()[0], tmp.path().join("aflfast/queue"));
    }

    #[test]
    fn lineage_orig_and_local() {
        let tmp = tempfile::tempdir().unwrap();
        let (w, ids) = afl_watch(tmp.path());
        let seed = Path::new("/o/afl/queue/id:000000,orig:seed");
        assert!(w.lineage(seed, TestCaseKind::Normal).unwrap().is_empty());

        ids.insert_local(40, "srv-40".to_string());
        ids.insert_local(88, "srv-88".to_string());
        let splice = Path::new("/o/afl/queue/id:000092,src:000040+000088,op:splice,rep:2");
        assert_eq!(
            w.lineage(splice, TestCaseKind::Normal).unwrap(),
            vec!["srv-40".to_string(), "srv-88".to_string()]
        );

        // unknown parents are dropped
        let partial = Path::new("/o/afl/queue/id:000093,src:000040+000077,op:splice,rep:2");
        assert_eq!(
            w.lineage(partial, TestCaseKind::Normal).unwrap(),
            vec!["srv-40".to_string()]
        );
    }

    #[test]
    fn lineage_sync() {
        let tmp = tempfile::tempdir().unwrap();
        let (w, ids) = afl_watch(tmp.path());
        let synced = Path::new("/o/afl/queue/id:000002,sync:framework,src:000042");
        assert!(w.lineage(synced, TestCaseKind::Normal).unwrap().is_empty());
        ids.insert_sync(42, "srv-seed-X".to_string());
        assert_eq!(
            w.lineage(synced, TestCaseKind::Normal).unwrap(),
            vec!["srv-seed-X".to_string()]
        );
        // the local table is not consulted for synced files
        ids.insert_local(42, "srv-local".to_string());
        assert_eq!(
            w.lineage(synced, TestCaseKind::Normal).unwrap(),
            vec!["srv-seed-X".to_string()]
        );
    }

    #[test]
    fn lineage_bad_names() {
        let tmp = tempfile::tempdir().unwrap();
        let (w, _) = afl_watch(tmp.path());
        let no_src = Path::new("/o/afl/queue/id:000003,op:havoc");
        assert!(matches!(
            w.lineage(no_src, TestCaseKind::Normal),
            Err(WatcherError::Name { .. })
        ));
        let bad = Path::new("/o/afl/queue/id:000003,a:b:c");
        assert!(w.lineage(bad, TestCaseKind::Normal).is_err());
    }

    #[test]
    fn record_normal_only() {
        let tmp = tempfile::tempdir().unwrap();
        let (w, ids) = afl_watch(tmp.path());
        w.record(
            Path::new("/o/afl/crashes/id:000001,sig:11,src:000000,op:flip1,pos:0"),
            TestCaseKind::Crash,
            "srv-c",
        )
        .unwrap();
        assert_eq!(ids.local_len(), 0);
        w.record(
            Path::new("/o/afl/queue/id:000007,src:000000,op:flip1,pos:0,+cov"),
            TestCaseKind::Normal,
            "srv-7",
        )
        .unwrap();
        assert_eq!(ids.local(7), Some("srv-7".to_string()));
    }

    #[test]
    fn synced_file_reported_with_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let (w, ids) = afl_watch(tmp.path());
        ids.insert_sync(42, "srv-seed-X".to_string());
        let fuzzer_dir = tmp.path().join("afl");

        let link = MockLink::new();
        let mut watcher = Watcher::new(Arc::new(w), link.clone());
        let dirs = fuzzer_dir.clone();
        // the fuzzer creates its directories after the driver started waiting
        let fuzzer = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(200));
            for d in &["queue", "crashes", "hangs"] {
                fs::create_dir(dirs.join(d)).unwrap();
            }
        });
        watcher.start(&|| false).unwrap();
        fuzzer.join().unwrap();

        let queue = fuzzer_dir.join("queue");
        fs::write(queue.join("id:000000,orig:seed"), b"seed").unwrap();
        assert!(wait_until(|| link.pushed().len() == 1));
        fs::write(queue.join("id:000002,sync:framework,src:000042"), b"synced").unwrap();
        assert!(wait_until(|| link.pushed().len() == 2));
        watcher.stop().unwrap();

        let pushed = link.pushed();
        assert!(pushed[0].parents.is_empty());
        assert_eq!(ids.local(0), Some("srv-0".to_string()));
        assert_eq!(pushed[1].id, "id:000002,sync:framework,src:000042");
        assert_eq!(pushed[1].content, b"synced");
        assert_eq!(pushed[1].kind, TestCaseKind::Normal);
        assert_eq!(pushed[1].parents, vec!["srv-seed-X".to_string()]);
    }
}
