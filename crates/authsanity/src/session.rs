//! In-memory session.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use authsanity_api::{Session, SharedSession};
use serde_json::Value;

use crate::ticket::new_ticket;

/// A [`Session`] that lives in process memory. Useful for tests and for
/// hosts that keep sessions elsewhere and copy them in per request.
#[derive(Debug, Clone)]
pub struct MemorySession {
    id: String,
    csrf_token: String,
    data: BTreeMap<String, Value>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            id: new_ticket(),
            csrf_token: new_ticket(),
            data: BTreeMap::new(),
        }
    }

    /// Wrap into the shared form carried by a request.
    pub fn shared(self) -> Arc<Mutex<MemorySession>> {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: Value) {
        self.data.insert(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    fn items(&self) -> BTreeMap<String, Value> {
        self.data.clone()
    }

    fn update(&mut self, data: BTreeMap<String, Value>) {
        self.data.extend(data);
    }

    fn invalidate(&mut self) {
        self.data.clear();
        self.id = new_ticket();
        self.csrf_token = new_ticket();
    }

    fn rotate_token(&mut self) -> String {
        self.csrf_token = new_ticket();
        self.csrf_token.clone()
    }
}

/// Erase the concrete session type.
pub fn share(session: &Arc<Mutex<MemorySession>>) -> SharedSession {
    session.clone()
}
