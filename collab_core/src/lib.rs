//! Core data structures of the collab driver

use ahash::{AHashMap, AHashSet};

pub mod fuzzer;
pub mod ids;
pub mod name;
pub mod test_case;

pub type HashMap<K, V> = AHashMap<K, V>;
pub type HashSet<V> = AHashSet<V>;
