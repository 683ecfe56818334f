use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread::sleep,
    time::Duration,
};

static STOP_SOON: AtomicBool = AtomicBool::new(false);

/// Stop requested by a signal.
pub fn stop_soon() -> bool {
    STOP_SOON.load(Ordering::Relaxed)
}

pub fn stop_req() {
    STOP_SOON.store(true, Ordering::Relaxed)
}

/// Poll `ready` every `interval` until it holds. Returns false if `stop`
/// fired first.
pub fn wait_for(
    interval: Duration,
    stop: &dyn Fn() -> bool,
    mut ready: impl FnMut() -> bool,
) -> bool {
    loop {
        if ready() {
            return true;
        }
        if stop() {
            return false;
        }
        sleep(interval);
    }
}
