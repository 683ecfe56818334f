//! Translation of local test case ids to server ids.

use crate::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    local_to_server: HashMap<u64, String>,
    sync_to_server: HashMap<u64, String>,
}

/// Both maps only grow for the lifetime of the driver.
#[derive(Debug, Default)]
pub struct IdTables {
    inner: Mutex<Tables>,
}

impl IdTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the server id of a test case the local fuzzer produced.
    pub fn insert_local(&self, local_id: u64, server_id: String) {
        let mut t = self.inner.lock().unwrap();
        t.local_to_server.insert(local_id, server_id);
    }

    /// Record the server id of a test case imported under sequence number `sync_id`.
    pub fn insert_sync(&self, sync_id: u64, server_id: String) {
        let mut t = self.inner.lock().unwrap();
        t.sync_to_server.insert(sync_id, server_id);
    }

    pub fn local(&self, local_id: u64) -> Option<String> {
        let t = self.inner.lock().unwrap();
        t.local_to_server.get(&local_id).cloned()
    }

    pub fn sync(&self, sync_id: u64) -> Option<String> {
        let t = self.inner.lock().unwrap();
        t.sync_to_server.get(&sync_id).cloned()
    }

    pub fn local_len(&self) -> usize {
        self.inner.lock().unwrap().local_to_server.len()
    }

    pub fn sync_len(&self) -> usize {
        self.inner.lock().unwrap().sync_to_server.len()
    }
}

#[cfg(test)]
mod tests {
    use super::IdTables;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn tables_are_independent() {
        let ids = IdTables::new();
        ids.insert_local(1, "srv-1".to_string());
        ids.insert_sync(1, "srv-sync-1".to_string());
        assert_eq!(ids.local(1).as_deref(), Some("srv-1"));
        assert_eq!(ids.sync(1).as_deref(), Some("srv-sync-1"));
        assert_eq!(ids.local(2), None);
        assert_eq!(ids.sync(2), None);
    }

    #[test]
    fn concurrent_writers() {
        let ids = Arc::new(IdTables::new());
        let handles = (0..4)
            .map(|t| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    for i in 0..256 {
                        let key = t * 256 + i;
                        ids.insert_sync(key, format!("srv-{}", key));
                        ids.insert_local(key, format!("loc-{}", key));
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ids.sync_len(), 1024);
        assert_eq!(ids.local_len(), 1024);
        assert_eq!(ids.sync(513).as_deref(), Some("srv-513"));
    }
}
