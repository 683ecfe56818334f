//! Report test cases the fuzzer writes to its output directories.

pub mod afl;
pub mod angora;
pub mod honggfuzz;
pub mod libfuzzer;
pub mod qsym;

use crate::{config::Config, util::wait_for};
use collab_conn::{ConnError, Link};
use collab_core::{
    fuzzer::Backend,
    ids::IdTables,
    name::{self, DecodeError, NameInfo},
    test_case::{TestCase, TestCaseKind},
    HashSet,
};
use notify::{
    event::CreateKind, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _,
};
use std::{
    collections::VecDeque,
    fs::{self, read_dir},
    io::ErrorKind,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError},
        Arc,
    },
    thread::{self, sleep, JoinHandle},
    time::Duration,
};
use thiserror::Error;

pub const QUEUE_POLL: Duration = Duration::from_millis(500);
pub const WAIT_DIR_POLL: Duration = Duration::from_millis(500);
/// Delay before reading a just created file, the fuzzer may still be writing it.
pub const FILE_READ_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("notify: {0}")]
    Notify(#[from] notify::Error),
    #[error("connection: {0}")]
    Conn(#[from] ConnError),
    #[error("bad test case name '{name}': {source}")]
    Name { name: String, source: DecodeError },
    #[error("invalid file name: {}", .0.display())]
    InvalidFileName(PathBuf),
    #[error("unexpected test case directory: {}", .0.display())]
    UnknownDir(PathBuf),
    #[error("interrupted while waiting for {}", .0.display())]
    Interrupted(PathBuf),
    #[error("event source disconnected")]
    Disconnected,
    #[error("watcher thread panicked")]
    Panicked,
}

/// Backend specific part of the watcher.
pub trait WatchPolicy: Send + Sync + 'static {
    /// Directories to observe.
    fn target_dirs(&self) -> &[PathBuf];

    /// Make the target directories ready for observation. Returns once all
    /// of them exist, the default waits for the fuzzer to create them.
    fn prepare(&self, stop: &dyn Fn() -> bool) -> Result<(), WatcherError> {
        for dir in self.target_dirs() {
            wait_dir(dir, stop)?;
        }
        Ok(())
    }

    fn ignore(&self, _path: &Path) -> bool {
        false
    }

    fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError>;

    /// Server ids of the parents of the test case.
    fn lineage(&self, _path: &Path, _kind: TestCaseKind) -> Result<Vec<String>, WatcherError> {
        Ok(Vec::new())
    }

    /// Called with the id the server assigned to the test case.
    fn record(
        &self,
        _path: &Path,
        _kind: TestCaseKind,
        _server_id: &str,
    ) -> Result<(), WatcherError> {
        Ok(())
    }
}

pub struct Watcher {
    policy: Arc<dyn WatchPolicy>,
    link: Arc<dyn Link>,
    stopping: Arc<AtomicBool>,
    notifier: Option<RecommendedWatcher>,
    handle: Option<JoinHandle<Result<(), WatcherError>>>,
}

impl Watcher {
    pub fn new(policy: Arc<dyn WatchPolicy>, link: Arc<dyn Link>) -> Self {
        Self {
            policy,
            link,
            stopping: Arc::new(AtomicBool::new(false)),
            notifier: None,
            handle: None,
        }
    }

    /// Prepare directories and start observing, blocks until the directories
    /// are ready or `stop` returns true.
    pub fn start(&mut self, stop: &dyn Fn() -> bool) -> Result<(), WatcherError> {
        log::info!("starting watcher");
        log::debug!("preparing directories");
        self.policy.prepare(stop)?;

        let (tx, rx) = channel();
        let mut notifier = RecommendedWatcher::new(tx, notify::Config::default())?;
        for dir in self.policy.target_dirs() {
            log::debug!("observing directory: {}", dir.display());
            notifier.watch(dir, RecursiveMode::NonRecursive)?;
        }

        // files created before the notifier was installed
        let existing = scan(self.policy.target_dirs())?;
        log::debug!("existing test cases: {}", existing.len());
        let consumer = Consumer {
            policy: Arc::clone(&self.policy),
            link: Arc::clone(&self.link),
            events: rx,
            seen: existing.iter().cloned().collect(),
            queue: existing.into_iter().collect(),
            stopping: Arc::clone(&self.stopping),
        };
        let handle = thread::Builder::new()
            .name("watcher-thread".to_string())
            .spawn(move || {
                let ret = consumer.run();
                if let Err(e) = ret.as_ref() {
                    log::error!("watcher exits with error: {}", e);
                }
                ret
            })?;
        self.notifier = Some(notifier);
        self.handle = Some(handle);
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.notifier.is_some() && self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Stop observing and wait for the consumer thread, returns the error the
    /// thread exited with, if any.
    pub fn stop(&mut self) -> Result<(), WatcherError> {
        log::info!("stopping watcher");
        self.stopping.store(true, Ordering::Relaxed);
        self.notifier = None;
        match self.handle.take() {
            Some(h) => h.join().unwrap_or(Err(WatcherError::Panicked)),
            None => Ok(()),
        }
    }
}

struct Consumer {
    policy: Arc<dyn WatchPolicy>,
    link: Arc<dyn Link>,
    events: Receiver<notify::Result<Event>>,
    queue: VecDeque<PathBuf>,
    /// Paths found by the initial scan, never reported twice.
    seen: HashSet<PathBuf>,
    stopping: Arc<AtomicBool>,
}

impl Consumer {
    fn run(mut self) -> Result<(), WatcherError> {
        while !self.stopping.load(Ordering::Relaxed) {
            if self.queue.is_empty() {
                match self.events.recv_timeout(QUEUE_POLL) {
                    Ok(ev) => self.enqueue(ev),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        if self.stopping.load(Ordering::Relaxed) {
                            break;
                        }
                        return Err(WatcherError::Disconnected);
                    }
                }
            }
            while let Ok(ev) = self.events.try_recv() {
                self.enqueue(ev);
            }
            if let Some(path) = self.queue.pop_front() {
                self.process(&path)?;
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, ev: notify::Result<Event>) {
        let ev = match ev {
            Ok(ev) => ev,
            Err(e) => {
                log::warn!("watch error: {}", e);
                return;
            }
        };
        match ev.kind {
            EventKind::Create(CreateKind::Folder) => return,
            EventKind::Create(_) => (),
            _ => return,
        }
        for path in ev.paths {
            if self.seen.contains(&path) || path.is_dir() {
                continue;
            }
            log::debug!("found new test case: {}", path.display());
            self.queue.push_back(path);
        }
    }

    fn process(&self, path: &Path) -> Result<(), WatcherError> {
        log::debug!("processing test case: {}", path.display());
        if self.policy.ignore(path) {
            log::debug!("test case ignored: {}", path.display());
            return Ok(());
        }

        sleep(FILE_READ_DELAY);
        let content = match fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("test case vanished: {}", path.display());
                return Ok(());
            }
            Err(e) => return Err(WatcherError::Io(e)),
        };
        let kind = self.policy.classify(path)?;
        let parents = self.policy.lineage(path, kind)?;
        let tc = TestCase::new(file_name(path)?.to_string(), content, kind, parents);
        let server_id = self.link.push_test_case(&tc)?;
        log::debug!("{} test case {} reported as {}", kind, tc.id, server_id);
        self.policy.record(path, kind, &server_id)
    }
}

/// Existing files of `dirs`, oldest first.
fn scan(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, WatcherError> {
    let mut found = Vec::new();
    for dir in dirs {
        for entry in read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_file() {
                log::debug!("found existing test case: {}", entry.path().display());
                found.push(((meta.ctime(), meta.ctime_nsec()), entry.path()));
            }
        }
    }
    found.sort_by_key(|(ctime, _)| *ctime);
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

pub fn build(
    config: &Config,
    link: Arc<dyn Link>,
    ids: Arc<IdTables>,
) -> Result<Watcher, WatcherError> {
    let out = &config.output_dir;
    let policy: Arc<dyn WatchPolicy> = match config.fuzzer_type.backend() {
        Backend::AflFamily => Arc::new(afl::AflWatch::new(out, config.fuzzer_type, ids)?),
        Backend::Angora => Arc::new(angora::AngoraWatch::new(out, config.fuzzer_type)),
        Backend::Qsym => Arc::new(qsym::QsymWatch::new(out, config.fuzzer_type, ids)?),
        Backend::LibFuzzer => Arc::new(libfuzzer::LibFuzzerWatch::new(out)),
        Backend::Honggfuzz => Arc::new(honggfuzz::HonggfuzzWatch::new(out)?),
    };
    Ok(Watcher::new(policy, link))
}

pub(crate) fn wait_dir(dir: &Path, stop: &dyn Fn() -> bool) -> Result<(), WatcherError> {
    if !dir.is_dir() {
        log::debug!("waiting on directory: {}", dir.display());
    }
    if wait_for(WAIT_DIR_POLL, stop, || dir.is_dir()) {
        Ok(())
    } else {
        Err(WatcherError::Interrupted(dir.to_path_buf()))
    }
}

pub(crate) fn file_name(path: &Path) -> Result<&str, WatcherError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WatcherError::InvalidFileName(path.to_path_buf()))
}

pub(crate) fn decode_name(path: &Path) -> Result<NameInfo, WatcherError> {
    let name = file_name(path)?;
    name::decode(name).map_err(|e| bad_name(name, e))
}

pub(crate) fn bad_name(name: &str, source: DecodeError) -> WatcherError {
    WatcherError::Name {
        name: name.to_string(),
        source,
    }
}

/// Classify by the name of the directory holding the test case.
pub(crate) fn classify_by_dir(
    path: &Path,
    dirs: &[(&str, TestCaseKind)],
) -> Result<TestCaseKind, WatcherError> {
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str());
    dirs.iter()
        .find(|(d, _)| Some(*d) == parent)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| WatcherError::UnknownDir(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{wait_until, MockLink};
    use std::fs::create_dir_all;

    struct Flat {
        dirs: Vec<PathBuf>,
    }

    impl WatchPolicy for Flat {
        fn target_dirs(&self) -> &[PathBuf] {
            &self.dirs
        }

        fn ignore(&self, path: &Path) -> bool {
            file_name(path).map_or(true, |n| n.starts_with('.'))
        }

        fn classify(&self, path: &Path) -> Result<TestCaseKind, WatcherError> {
            classify_by_dir(path, &[("queue", TestCaseKind::Normal)])
        }
    }

    #[test]
    fn existing_then_new_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let queue = tmp.path().join("queue");
        create_dir_all(&queue).unwrap();
        fs::write(queue.join("a"), b"1").unwrap();
        sleep(Duration::from_millis(50));
        fs::write(queue.join("b"), b"2").unwrap();

        let link = MockLink::new();
        let policy = Flat {
            dirs: vec![queue.clone()],
        };
        let mut watcher = Watcher::new(Arc::new(policy), link.clone());
        assert!(!watcher.is_alive());
        watcher.start(&|| false).unwrap();
        assert!(watcher.is_alive());
        assert!(wait_until(|| link.pushed().len() == 2));

        fs::write(queue.join(".hidden"), b"x").unwrap();
        fs::write(queue.join("c"), b"3").unwrap();
        assert!(wait_until(|| link.pushed().len() == 3));
        watcher.stop().unwrap();
        assert!(!watcher.is_alive());

        let pushed = link.pushed();
        let ids = pushed.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(pushed[2].content, b"3");
        assert_eq!(pushed[2].kind, TestCaseKind::Normal);
    }

    #[test]
    fn unknown_dir_kills_thread() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tmp.path().join("other");
        create_dir_all(&other).unwrap();
        let link = MockLink::new();
        let policy = Flat {
            dirs: vec![other.clone()],
        };
        let mut watcher = Watcher::new(Arc::new(policy), link.clone());
        watcher.start(&|| false).unwrap();
        fs::write(other.join("x"), b"x").unwrap();
        assert!(wait_until(|| !watcher.is_alive()));
        assert!(matches!(watcher.stop(), Err(WatcherError::UnknownDir(_))));
        assert!(link.pushed().is_empty());
    }

    #[test]
    fn waiting_for_dirs_interrupted() {
        let tmp = tempfile::tempdir().unwrap();
        let link = MockLink::new();
        let mut watcher = Watcher::new(
            Arc::new(Flat {
                dirs: vec![tmp.path().join("queue")],
            }),
            link,
        );
        let err = watcher.start(&|| true).err().unwrap();
        assert!(matches!(err, WatcherError::Interrupted(_)));
        assert!(!watcher.is_alive());
    }

    #[test]
    fn classify_by_parent_dir() {
        let dirs = [("crashes", TestCaseKind::Crash), ("queue", TestCaseKind::Normal)];
        assert_eq!(
            classify_by_dir(Path::new("/o/crashes/id:1"), &dirs).unwrap(),
            TestCaseKind::Crash
        );
        assert!(classify_by_dir(Path::new("/o/hangs/id:1"), &dirs).is_err());
    }
}
