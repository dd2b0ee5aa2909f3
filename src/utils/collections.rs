//! Shared collection constructors.
//!
//! The `extra` channel and related maps use `rustc_hash::FxHashMap`
//! rather than the stdlib hasher throughout the runtime; this module
//! gives every call site a single place to build one from.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Build an empty extra-channel map with the runtime's hasher.
pub fn new_extra_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}
