//! Versioned channel storage backing `state::VersionedState`.
//!
//! Each channel wraps a single collection (messages, extra metadata,
//! errors) together with a version counter that the barrier phase bumps
//! only when the collection's content actually changed.

pub mod errors;

pub use errors::ErrorEvent;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::message::Message;

/// Common interface over a versioned channel's stored collection.
pub trait Channel {
    type Item: Clone;

    fn version(&self) -> u32;
    fn set_version(&mut self, version: u32);
    fn snapshot(&self) -> Self::Item;
    fn get_mut(&mut self) -> &mut Self::Item;
}

/// Versioned channel holding the conversation's message history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagesChannel {
    items: Vec<Message>,
    version: u32,
}

impl MessagesChannel {
    pub fn new(items: Vec<Message>, version: u32) -> Self {
        Self { items, version }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for MessagesChannel {
    fn default() -> Self {
        Self::new(Vec::new(), 1)
    }
}

impl Channel for MessagesChannel {
    type Item = Vec<Message>;

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn snapshot(&self) -> Vec<Message> {
        self.items.clone()
    }

    fn get_mut(&mut self) -> &mut Vec<Message> {
        &mut self.items
    }
}

/// Versioned channel holding arbitrary key/value metadata produced by nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtrasChannel {
    map: FxHashMap<String, Value>,
    version: u32,
}

impl ExtrasChannel {
    pub fn new(map: FxHashMap<String, Value>, version: u32) -> Self {
        Self { map, version }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for ExtrasChannel {
    fn default() -> Self {
        Self::new(FxHashMap::default(), 1)
    }
}

impl Channel for ExtrasChannel {
    type Item = FxHashMap<String, Value>;

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn snapshot(&self) -> FxHashMap<String, Value> {
        self.map.clone()
    }

    fn get_mut(&mut self) -> &mut FxHashMap<String, Value> {
        &mut self.map
    }
}

/// Versioned channel holding accumulated `ErrorEvent`s for the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorsChannel {
    items: Vec<ErrorEvent>,
    version: u32,
}

impl ErrorsChannel {
    pub fn new(items: Vec<ErrorEvent>, version: u32) -> Self {
        Self { items, version }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ErrorsChannel {
    fn default() -> Self {
        Self::new(Vec::new(), 1)
    }
}

impl Channel for ErrorsChannel {
    type Item = Vec<ErrorEvent>;

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn snapshot(&self) -> Vec<ErrorEvent> {
        self.items.clone()
    }

    fn get_mut(&mut self) -> &mut Vec<ErrorEvent> {
        &mut self.items
    }
}
