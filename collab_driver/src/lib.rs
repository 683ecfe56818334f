//! Collab fuzzing driver

pub mod cmdline;
pub mod config;
pub mod receiver;
pub mod util;
pub mod watcher;

#[cfg(test)]
mod mock;

use crate::{
    config::Config,
    receiver::Receiver,
    util::{stop_req, stop_soon},
    watcher::{Watcher, WatcherError},
};
use anyhow::Context;
use collab_conn::{Connection, Link};
use collab_core::ids::IdTables;
use std::{os::raw::c_int, sync::Arc, thread::sleep, time::Duration};

/// Interval of the component liveness check.
pub const CRASH_POLL: Duration = Duration::from_secs(1);

pub fn boot(config: Config) -> anyhow::Result<()> {
    config.check().context("config error")?;
    setup_signal_handler().context("failed to setup signal handler")?;

    log::info!("attempting to contact server...");
    let conn = Connection::connect(&config.conn, &stop_soon)
        .context("registration with server failed")?;
    log::info!("registered as {}", conn.fuzzer_id());
    let conn = Arc::new(conn);

    let ret = supervise(&config, Arc::clone(&conn) as Arc<dyn Link>);
    if let Err(e) = conn.close() {
        log::warn!("failed to deregister: {}", e);
    }
    ret
}

fn supervise(config: &Config, link: Arc<dyn Link>) -> anyhow::Result<()> {
    let ids = Arc::new(IdTables::new());
    let mut watcher = watcher::build(config, Arc::clone(&link), Arc::clone(&ids))
        .context("failed to create watcher")?;
    let mut receiver =
        receiver::build(config, link, ids).context("failed to create receiver")?;
    receiver.start().context("failed to start receiver")?;

    println!(
        "Start your fuzzer using: \"{}\"",
        cmdline::suggestion(config)
    );
    log::info!("waiting for fuzzer...");
    if let Err(e) = watcher.start(&stop_soon) {
        shutdown(&mut watcher, &mut receiver);
        return match e {
            WatcherError::Interrupted(dir) => {
                log::info!("interrupted while waiting for {}", dir.display());
                Ok(())
            }
            e => Err(e).context("failed to start watcher"),
        };
    }

    log::info!("the driver is running, exit with ^C");
    watch_components(&mut watcher, &mut receiver, &stop_soon)
}

fn watch_components(
    watcher: &mut Watcher,
    receiver: &mut Receiver,
    stop: &dyn Fn() -> bool,
) -> anyhow::Result<()> {
    loop {
        if stop() {
            shutdown(watcher, receiver);
            log::info!("All done");
            return Ok(());
        }
        if !watcher.is_alive() {
            log::error!("the watcher crashed, killing the remaining components");
            let e = watcher.stop().err();
            if let Err(e) = receiver.stop() {
                log::warn!("receiver exited with: {}", e);
            }
            return Err(crashed("watcher", e.map(anyhow::Error::new)));
        }
        if !receiver.is_alive() {
            log::error!("the receiver crashed, killing the remaining components");
            if let Err(e) = watcher.stop() {
                log::warn!("watcher exited with: {}", e);
            }
            let e = receiver.stop().err();
            return Err(crashed("receiver", e.map(anyhow::Error::new)));
        }
        sleep(CRASH_POLL);
    }
}

/// Stop the watcher, then the receiver.
fn shutdown(watcher: &mut Watcher, receiver: &mut Receiver) {
    if let Err(e) = watcher.stop() {
        log::warn!("watcher exited with: {}", e);
    }
    if let Err(e) = receiver.stop() {
        log::warn!("receiver exited with: {}", e);
    }
}

fn crashed(component: &str, cause: Option<anyhow::Error>) -> anyhow::Error {
    match cause {
        Some(e) => e.context(format!("{} crashed", component)),
        None => anyhow::anyhow!("{} crashed", component),
    }
}

fn setup_signal_handler() -> anyhow::Result<()> {
    use signal_hook::consts::*;
    use signal_hook::iterator::exfiltrator::WithOrigin;
    use signal_hook::iterator::SignalsInfo;

    fn named_signal(sig: c_int) -> String {
        signal_hook::low_level::signal_name(sig)
            .map(|n| format!("{}({})", n, sig))
            .unwrap_or_else(|| sig.to_string())
    }

    let mut signals = SignalsInfo::<WithOrigin>::new(TERM_SIGNALS)?;
    std::thread::Builder::new()
        .name("signal-thread".to_string())
        .spawn(move || {
            for info in signals.forever() {
                let from = if let Some(p) = info.process {
                    format!("(pid: {}, uid: {})", p.pid, p.uid)
                } else {
                    "unknown".to_string()
                };
                log::info!(
                    "{} recved, from: {}, cause: {:?}",
                    named_signal(info.signal),
                    from,
                    info.cause
                );
                if stop_soon() {
                    log::warn!("second signal, exiting now");
                    std::process::exit(1);
                }
                println!("please waiting for components to exit...");
                stop_req();
            }
        })?;
    Ok(())
}
