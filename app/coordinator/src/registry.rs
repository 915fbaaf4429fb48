//! Name-keyed registry of agent connections.

use crate::connection::AgentConnection;
use compact_str::CompactString;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Live agent connections keyed by the name sent in `INIT`.
///
/// Safe to share between the acceptor, the pipeline worker and shutdown.
/// Readers never block each other.
#[derive(Debug, Default)]
pub struct Registry {
    agents: RwLock<BTreeMap<CompactString, Arc<AgentConnection>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the connection for `name`.
    ///
    /// Returns the displaced connection, which the caller should close.
    pub fn put(
        &self,
        name: impl Into<CompactString>,
        conn: Arc<AgentConnection>,
    ) -> Option<Arc<AgentConnection>> {
        self.agents.write().insert(name.into(), conn)
    }

    /// Look up the connection for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<AgentConnection>> {
        self.agents.read().get(name).cloned()
    }

    /// Remove the connection for `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<AgentConnection>> {
        self.agents.write().remove(name)
    }

    /// Remove `name` only while it still maps to `conn`.
    ///
    /// Leaves a newer registration under the same name untouched.
    pub fn remove_if(&self, name: &str, conn: &Arc<AgentConnection>) -> bool {
        let mut agents = self.agents.write();
        match agents.get(name) {
            Some(current) if Arc::ptr_eq(current, conn) => {
                agents.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Visit every entry in name order under the read lock.
    ///
    /// `f` must not call back into the registry's mutating methods.
    pub fn for_each(&self, mut f: impl FnMut(&str, &Arc<AgentConnection>)) {
        for (name, conn) in self.agents.read().iter() {
            f(name, conn);
        }
    }

    /// Registered names in order.
    pub fn names(&self) -> Vec<CompactString> {
        self.agents.read().keys().cloned().collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    /// Close and drop every connection, returning how many there were.
    pub fn close_all(&self) -> usize {
        let agents = std::mem::take(&mut *self.agents.write());
        for (name, conn) in &agents {
            tracing::debug!("closing connection of agent '{name}'");
            conn.close();
        }
        agents.len()
    }
}
