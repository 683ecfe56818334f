//! Import test cases and apply control commands sent by the server.

pub mod afl;
pub mod honggfuzz;
pub mod libfuzzer;
pub mod qsym;

use crate::{config::Config, util::wait_for};
use collab_conn::{ConnError, Inbound, Link};
use collab_container::{
    docker::{DockerConfig, DockerHandle},
    ContainerError, ManageContainer,
};
use collab_core::{
    fuzzer::{Backend, FuzzerType},
    ids::IdTables,
    test_case::{ControlCommand, ControlMsg, SeedJob},
    HashSet,
};
use std::{
    fs::{self, create_dir_all, remove_dir_all, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use thiserror::Error;

pub const PULL_TIMEOUT: Duration = Duration::from_secs(5);
pub const MARKER_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection: {0}")]
    Conn(#[from] ConnError),
    #[error("container: {0}")]
    Container(#[from] ContainerError),
    #[error("test case already exists: {}", .0.display())]
    Exists(PathBuf),
    #[error("invalid test case file name: {0:?}")]
    BadName(String),
    #[error("fuzzer type {0} does not import test cases")]
    Unsupported(FuzzerType),
    #[error("afl path is required")]
    MissingAflPath,
    #[error("receiver thread panicked")]
    Panicked,
}

/// Backend specific part of the receiver: where imported test cases go.
pub trait SyncWriter: Send + 'static {
    fn target_dir(&self) -> &Path;
    /// File name for the test case with server id `server_id`, called once
    /// per written test case.
    fn file_name(&mut self, server_id: &str) -> String;
}

pub type AttachFn =
    Box<dyn FnOnce(&str) -> Result<Box<dyn ManageContainer>, ContainerError> + Send>;

pub enum ContainerSource {
    /// Control commands are discarded.
    Disabled,
    /// Wait for `marker` to name the fuzzer container, then attach to it.
    Marker { marker: PathBuf, attach: AttachFn },
}

impl ContainerSource {
    pub fn docker(marker: PathBuf) -> Self {
        ContainerSource::Marker {
            marker,
            attach: Box::new(|name| {
                let handle = DockerHandle::attach(DockerConfig::default(), name)?;
                Ok(Box::new(handle) as Box<dyn ManageContainer>)
            }),
        }
    }
}

pub struct Receiver {
    worker: Option<Worker>,
    stopping: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), ReceiverError>>>,
}

impl Receiver {
    pub fn new(
        writer: Box<dyn SyncWriter>,
        link: Arc<dyn Link>,
        container: ContainerSource,
    ) -> Self {
        let stopping = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            writer,
            link,
            source: Some(container),
            container: None,
            received: HashSet::new(),
            stopping: Arc::clone(&stopping),
        };
        log::info!("receiver initialized");
        Self {
            worker: Some(worker),
            stopping,
            handle: None,
        }
    }

    pub fn start(&mut self) -> Result<(), ReceiverError> {
        let worker = match self.worker.take() {
            Some(w) => w,
            None => return Ok(()),
        };
        let handle = thread::Builder::new()
            .name("receiver-thread".to_string())
            .spawn(move || {
                let ret = worker.run();
                if let Err(e) = ret.as_ref() {
                    log::error!("killing receiver thread: {}", e);
                }
                ret
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Wait for the pending pull to finish, so the connection can be closed
    /// afterwards. Returns the error the thread exited with, if any.
    pub fn stop(&mut self) -> Result<(), ReceiverError> {
        self.stopping.store(true, Ordering::Relaxed);
        log::debug!("waiting for polling to finish");
        let ret = match self.handle.take() {
            Some(h) => h.join().unwrap_or(Err(ReceiverError::Panicked)),
            None => Ok(()),
        };
        log::info!("receiver stopped");
        ret
    }
}

struct Worker {
    writer: Box<dyn SyncWriter>,
    link: Arc<dyn Link>,
    source: Option<ContainerSource>,
    container: Option<Box<dyn ManageContainer>>,
    /// Server ids already written.
    received: HashSet<String>,
    stopping: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) -> Result<(), ReceiverError> {
        if let Some(ContainerSource::Marker { marker, attach }) = self.source.take() {
            let stopping = Arc::clone(&self.stopping);
            let stop = move || stopping.load(Ordering::Relaxed);
            if !wait_for(MARKER_POLL, &stop, || marker.is_file()) {
                return Ok(());
            }
            let name = fs::read_to_string(&marker)?.trim().to_string();
            log::info!("take control of container: {}", name);
            self.container = Some(attach(&name)?);
        }

        // credit for the first job
        self.link.report_ready()?;
        while !self.stopping.load(Ordering::Relaxed) {
            log::debug!("waiting for test cases or control messages");
            match self.link.pull(PULL_TIMEOUT)? {
                Some(Inbound::Control(msg)) => self.handle_ctrl(&msg),
                Some(Inbound::Job(job)) => self.handle_job(&job)?,
                None => continue,
            }
            self.link.report_ready()?;
        }
        Ok(())
    }

    fn handle_ctrl(&mut self, msg: &ControlMsg) {
        let container = match self.container.as_mut() {
            Some(c) => c,
            None => {
                log::warn!("container control disabled, {} discarded", msg.command);
                return;
            }
        };
        log::info!("executing control command: {}", msg.command);
        let ret = match msg.command {
            ControlCommand::Run => container.unpause(),
            ControlCommand::Pause => container.pause(),
            ControlCommand::Kill => container.kill(),
            ControlCommand::SetPriority(p) => container.set_cpu_shares(p),
        };
        if let Err(e) = ret {
            log::error!("failed to {} {}: {}", msg.command, container.name(), e);
        }
    }

    fn handle_job(&mut self, job: &SeedJob) -> Result<(), ReceiverError> {
        for seed in &job.seeds {
            if !self.received.insert(seed.id.clone()) {
                log::error!("test case already received: {}", seed.id);
                continue;
            }
            let name = self.writer.file_name(&seed.id);
            check_name(&name)?;
            let path = self.writer.target_dir().join(&name);
            let mut f = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(ReceiverError::Exists(path))
                }
                Err(e) => return Err(ReceiverError::Io(e)),
            };
            f.write_all(&seed.content)?;
            log::info!("writing test case {} to {}", seed.id, name);
        }
        Ok(())
    }
}

/// Server ids end up in file names, keep them inside the target directory.
fn check_name(name: &str) -> Result<(), ReceiverError> {
    let escapes = name == "." || name == "..";
    if name.is_empty() || escapes || name.contains('/') || name.contains('\0') {
        Err(ReceiverError::BadName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Remove `dir` if it exists and create it empty.
pub(crate) fn reset_dir(dir: &Path) -> Result<(), ReceiverError> {
    match remove_dir_all(dir) {
        Ok(()) => (),
        Err(e) if e.kind() == ErrorKind::NotFound => (),
        Err(e) => return Err(ReceiverError::Io(e)),
    }
    create_dir_all(dir)?;
    Ok(())
}

pub fn build(
    config: &Config,
    link: Arc<dyn Link>,
    ids: Arc<IdTables>,
) -> Result<Receiver, ReceiverError> {
    let out = &config.output_dir;
    let writer: Box<dyn SyncWriter> = match config.fuzzer_type.backend() {
        Backend::AflFamily => Box::new(afl::AflSync::new(out, ids)?),
        Backend::Qsym => {
            let afl_path = config
                .afl_path
                .as_deref()
                .ok_or(ReceiverError::MissingAflPath)?;
            Box::new(qsym::QsymSync::new(
                out,
                afl_path,
                &config.target_cmdline,
                ids,
            )?)
        }
        Backend::LibFuzzer => Box::new(libfuzzer::LibFuzzerSync::new(out)?),
        Backend::Honggfuzz => Box::new(honggfuzz::HonggfuzzSync::new(out)?),
        Backend::Angora => return Err(ReceiverError::Unsupported(config.fuzzer_type)),
    };
    let container = if config.docker_enabled {
        ContainerSource::docker(config.docker_marker())
    } else {
        ContainerSource::Disabled
    };
    Ok(Receiver::new(writer, link, container))
}
