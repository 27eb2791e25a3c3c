//! # Server Pool
//!
//! An ordered set of backend descriptors plus the bookkeeping selectors need to
//! notice topology edits.
//!
//! ## Invalidation model
//!
//! Every effective membership, weight or status mutation bumps the pool's
//! `version`. Each materialized pool also carries a process-unique `generation`;
//! replacing the contents wholesale (reset, fresh clone, bulk replace) hands out a
//! new one. Selectors cache the [`SyncKey`] they last built their active view from
//! and rebuild when it differs, so a stale cursor can never outlive an edit.
//!
//! Load bookkeeping (`current_load` / `active_connections`) is *not* a topology
//! change and never bumps the version. Deferred load releases carry a
//! [`LoadTicket`] naming the pool generation and the exact server incarnation
//! they were issued against; a ticket that outlived either is dropped.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::core::error::{SimError, SimResult};
use crate::core::types::{parse_weight, NewServer, Server, ServerPatch, ServerSpec};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Pool shared between a session, its tick loop and deferred load releases
pub type SharedPool = Arc<Mutex<Pool>>;

/// Cache key identifying one exact topology of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub generation: u64,
    pub version: u64,
}

/// Handle to one in-flight request, redeemed by [`Pool::release`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadTicket {
    generation: u64,
    server_id: String,
    incarnation: u64,
}

/// A topology edit applied to a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PoolMutation {
    /// Append a fully specified server
    Add { server: ServerSpec },
    /// Patch weight and/or status of an existing server
    Patch { id: String, patch: ServerPatch },
    /// Remove a server by id
    Remove { id: String },
    /// Replace the whole server list
    Replace { servers: Vec<ServerSpec> },
}

#[derive(Debug, Clone)]
pub struct Pool {
    servers: Vec<Server>,
    version: u64,
    generation: u64,
}

impl Pool {
    /// Materialize a pool from specs without validating them
    pub fn from_specs(specs: &[ServerSpec]) -> Self {
        Self {
            servers: specs.iter().map(Server::from_spec).collect(),
            version: 0,
            generation: next_generation(),
        }
    }

    /// Materialize a pool, rejecting invalid or duplicate specs
    pub fn try_from_specs(specs: &[ServerSpec]) -> SimResult<Self> {
        validate_specs(specs)?;
        Ok(Self::from_specs(specs))
    }

    /// Wrap the pool for sharing with the tick loop and release tasks
    pub fn shared(self) -> SharedPool {
        Arc::new(Mutex::new(self))
    }

    /// Copy of this pool's topology with idle runtime counters and a new generation
    pub fn fresh_clone(&self) -> Self {
        let servers = self
            .servers
            .iter()
            .map(|server| Server {
                current_load: 0,
                active_connections: 0,
                ..server.clone()
            })
            .collect();
        Self {
            servers,
            version: 0,
            generation: next_generation(),
        }
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn get(&self, index: usize) -> Option<&Server> {
        self.servers.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Server> {
        self.servers.iter().find(|server| server.id == id)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sync_key(&self) -> SyncKey {
        SyncKey {
            generation: self.generation,
            version: self.version,
        }
    }

    /// Indices of selectable servers, in pool order
    pub fn active_indices(&self) -> Vec<usize> {
        self.servers
            .iter()
            .enumerate()
            .filter(|(_, server)| server.is_active())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.servers.iter().filter(|server| server.is_active()).count()
    }

    /// Apply a topology edit; on error the pool is left unchanged
    pub fn apply(&mut self, mutation: PoolMutation) -> SimResult<()> {
        match mutation {
            PoolMutation::Add { server } => self.add(server),
            PoolMutation::Patch { id, patch } => self.patch(&id, &patch).map(|_| ()),
            PoolMutation::Remove { id } => self.remove(&id).map(|_| ()),
            PoolMutation::Replace { servers } => self.replace(&servers),
        }
    }

    /// Append a server
    pub fn add(&mut self, spec: ServerSpec) -> SimResult<()> {
        spec.validate()?;
        if self.find(&spec.id).is_some() {
            return Err(SimError::bad_input(
                "id",
                format!("server '{}' already exists", spec.id),
            ));
        }
        debug!(server_id = %spec.id, weight = spec.weight, "Adding server to pool");
        self.servers.push(Server::from_spec(&spec));
        self.bump();
        Ok(())
    }

    /// Add a server from a runtime request, deriving its id from the label
    pub fn add_new(&mut self, request: NewServer) -> SimResult<ServerSpec> {
        let id = self.allocate_id(&request.label);
        let spec = request.into_spec(id)?;
        self.add(spec.clone())?;
        Ok(spec)
    }

    /// Patch weight and/or status
    ///
    /// Returns whether anything changed. The version only moves on an effective
    /// change, so re-applying the same weight keeps selector cursors intact.
    pub fn patch(&mut self, id: &str, patch: &ServerPatch) -> SimResult<bool> {
        // Validate before touching anything.
        let weight = patch.weight.map(parse_weight).transpose()?;

        let server = self
            .servers
            .iter_mut()
            .find(|server| server.id == id)
            .ok_or_else(|| SimError::server_not_found(id))?;

        let mut changed = false;
        if let Some(weight) = weight {
            if server.weight != weight {
                server.weight = weight;
                changed = true;
            }
        }
        if let Some(status) = patch.status {
            if server.status != status {
                server.status = status;
                changed = true;
            }
        }

        if changed {
            debug!(
                server_id = %id,
                weight = server.weight,
                status = %server.status,
                "Patched server"
            );
            self.bump();
        }
        Ok(changed)
    }

    /// Remove a server by id, returning its last descriptor
    pub fn remove(&mut self, id: &str) -> SimResult<Server> {
        let index = self
            .servers
            .iter()
            .position(|server| server.id == id)
            .ok_or_else(|| SimError::server_not_found(id))?;
        let removed = self.servers.remove(index);
        debug!(server_id = %id, "Removed server from pool");
        self.bump();
        Ok(removed)
    }

    /// Replace every server; runtime counters start idle under a new generation
    pub fn replace(&mut self, specs: &[ServerSpec]) -> SimResult<()> {
        validate_specs(specs)?;
        self.servers = specs.iter().map(Server::from_spec).collect();
        self.generation = next_generation();
        self.bump();
        Ok(())
    }

    /// Mark one request in flight on the server at `index`
    pub(crate) fn acquire(&mut self, index: usize) -> Option<LoadTicket> {
        let generation = self.generation;
        self.servers.get_mut(index).map(|server| {
            server.acquire();
            LoadTicket {
                generation,
                server_id: server.id.clone(),
                incarnation: server.incarnation,
            }
        })
    }

    /// Release the in-flight request a ticket was issued for
    ///
    /// Ignored when the pool was replaced or the server removed since, including
    /// a remove followed by a re-add under the same id. Returns whether a counter
    /// was decremented.
    pub(crate) fn release(&mut self, ticket: &LoadTicket) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        match self.servers.iter_mut().find(|server| {
            server.id == ticket.server_id && server.incarnation == ticket.incarnation
        }) {
            Some(server) => {
                server.release();
                true
            }
            None => false,
        }
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Slug of the label plus a base-36 timestamp, unique within this pool
    fn allocate_id(&self, label: &str) -> String {
        let slug = label
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        let stamp = to_base36(chrono::Utc::now().timestamp_millis().max(0) as u64);
        let base = format!("{}-{}", slug, stamp);

        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.find(&candidate).is_some() {
            suffix += 1;
            candidate = format!("{}-{}", base, suffix);
        }
        candidate
    }
}

fn validate_specs(specs: &[ServerSpec]) -> SimResult<()> {
    let mut seen = std::collections::HashSet::new();
    for spec in specs {
        spec.validate()?;
        if !seen.insert(spec.id.as_str()) {
            return Err(SimError::bad_input(
                "id",
                format!("duplicate server id '{}'", spec.id),
            ));
        }
    }
    Ok(())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
