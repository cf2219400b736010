/*
 * Created on Mon Apr 05 2021
 *
 * This file is a part of Sable
 * Sable is a free and open-source in-memory data structure store that
 * speaks the Redis RESP2 protocol, written by Sayan Nandan ("the Author")
 * with the vision to provide a fast and reliable caching and data
 * structure layer without compromising on simplicity
 *
 * Copyright (c) 2021, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # The core in-memory store
//!
//! [`Corestore`] is the shared handle every connection holds: an atomic
//! reference to the keyspace behind a readers-writer lock, the pub/sub
//! tables, and the bookkeeping counters used by persistence. The
//! [`Keyspace`] itself is a plain typed key -> value table with per-key
//! expiration.
//!
//! Expired keys are treated as absent by every accessor. Read paths never
//! mutate (they just refuse to see expired entries); write paths evict the
//! carcass before acting, and the expiry service sweeps whatever is left
//! over.

use crate::config::ConfigSet;
use crate::diskstore::{self, SnapshotFile};
use crate::pubsub::PubSub;
use crate::util;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub mod data;
pub mod glob;
pub mod value;
pub mod zset;
#[cfg(test)]
mod tests;

pub use data::Data;
pub use glob::glob_matches;
pub use value::{Tag, Value};

/// An entry in the keyspace: the typed value plus its optional expiration
/// instant in milliseconds since the epoch
#[derive(Debug, Clone)]
pub struct KeyspaceEntry {
    pub value: Value,
    pub expires_at: Option<u64>,
}

impl KeyspaceEntry {
    pub fn new(value: Value) -> Self {
        KeyspaceEntry {
            value,
            expires_at: None,
        }
    }
    pub fn with_expiry(value: Value, expires_at: Option<u64>) -> Self {
        KeyspaceEntry { value, expires_at }
    }
    fn is_expired(&self, now: u64) -> bool {
        match self.expires_at {
            Some(at) => now >= at,
            None => false,
        }
    }
}

/// The remaining lifetime of a key as seen by `TTL`/`PTTL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// the key does not exist (`-2`)
    Missing,
    /// the key exists but carries no expiration (`-1`)
    NoExpiry,
    /// milliseconds left to live
    Remaining(u64),
}

/// The typed key -> value table. All methods take `now` explicitly so the
/// expiry rules stay testable without clock games
#[derive(Debug, Default)]
pub struct Keyspace {
    table: HashMap<Data, KeyspaceEntry>,
}

impl Keyspace {
    pub fn new() -> Self {
        Keyspace {
            table: HashMap::new(),
        }
    }
    /// Look up a live value
    pub fn get(&self, key: &[u8], now: u64) -> Option<&Value> {
        self.get_entry(key, now).map(|e| &e.value)
    }
    pub fn get_entry(&self, key: &[u8], now: u64) -> Option<&KeyspaceEntry> {
        self.table.get(key).filter(|e| !e.is_expired(now))
    }
    /// Look up a live value for mutation, evicting it first if it has
    /// already expired
    pub fn get_mut(&mut self, key: &[u8], now: u64) -> Option<&mut Value> {
        self.get_entry_mut(key, now).map(|e| &mut e.value)
    }
    pub fn get_entry_mut(&mut self, key: &[u8], now: u64) -> Option<&mut KeyspaceEntry> {
        self.evict_if_expired(key, now);
        self.table.get_mut(key)
    }
    /// Drop the stored entry if it has expired
    pub fn evict_if_expired(&mut self, key: &[u8], now: u64) {
        let expired = self
            .table
            .get(key)
            .map(|e| e.is_expired(now))
            .unwrap_or(false);
        if expired {
            self.table.remove(key);
        }
    }
    /// Unconditionally store a value, replacing whatever was there. The
    /// entry's TTL is whatever the caller passes (usually `None`:
    /// replacement semantics clear the TTL)
    pub fn insert(&mut self, key: Data, value: Value, expires_at: Option<u64>) {
        self.table
            .insert(key, KeyspaceEntry::with_expiry(value, expires_at));
    }
    /// Remove a live key, returning its entry
    pub fn remove(&mut self, key: &[u8], now: u64) -> Option<KeyspaceEntry> {
        self.evict_if_expired(key, now);
        self.table.remove(key)
    }
    pub fn contains(&self, key: &[u8], now: u64) -> bool {
        self.get_entry(key, now).is_some()
    }
    /// The `TYPE` of a live key, if any
    pub fn type_name(&self, key: &[u8], now: u64) -> Option<&'static str> {
        self.get_entry(key, now).map(|e| e.value.tag().name())
    }
    /// Number of live keys
    pub fn len(&self, now: u64) -> usize {
        self.table.values().filter(|e| !e.is_expired(now)).count()
    }
    /// Number of live keys carrying an expiration
    pub fn expiring_len(&self, now: u64) -> usize {
        self.table
            .values()
            .filter(|e| !e.is_expired(now) && e.expires_at.is_some())
            .count()
    }
    /// Drop everything. Returns the number of entries removed
    pub fn clear(&mut self) -> usize {
        let len = self.table.len();
        self.table.clear();
        len
    }
    /// Move `src` to `dst`, carrying value and TTL. Returns false if `src`
    /// is not alive
    pub fn rename(&mut self, src: &[u8], dst: Data, now: u64) -> bool {
        match self.remove(src, now) {
            Some(entry) => {
                self.table.insert(dst, entry);
                true
            }
            None => false,
        }
    }
    /// A uniformly chosen live key
    pub fn random_key(&self, now: u64) -> Option<Data> {
        let live: Vec<&Data> = self
            .table
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k)
            .collect();
        if live.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..live.len());
        Some(live[idx].clone())
    }
    /// All live keys matching a glob pattern
    pub fn keys_matching(&self, pattern: &[u8], now: u64) -> Vec<Data> {
        self.table
            .iter()
            .filter(|(k, e)| !e.is_expired(now) && glob_matches(pattern, k.as_ref()))
            .map(|(k, _)| k.clone())
            .collect()
    }
    /// All live keys in byte order. This is the snapshot the `SCAN` cursor
    /// pages over
    pub fn sorted_keys(&self, now: u64) -> Vec<Data> {
        let mut keys: Vec<Data> = self
            .table
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        keys
    }
    /// Set the absolute expiration of a live key. An instant in the past
    /// deletes the key right away (and still counts as success)
    pub fn expire_at(&mut self, key: &[u8], at_ms: u64, now: u64) -> bool {
        match self.get_entry_mut(key, now) {
            Some(entry) => {
                if at_ms <= now {
                    self.table.remove(key);
                } else {
                    entry.expires_at = Some(at_ms);
                }
                true
            }
            None => false,
        }
    }
    pub fn ttl_ms(&self, key: &[u8], now: u64) -> TtlState {
        match self.get_entry(key, now) {
            None => TtlState::Missing,
            Some(entry) => match entry.expires_at {
                None => TtlState::NoExpiry,
                Some(at) => TtlState::Remaining(at - now),
            },
        }
    }
    /// Drop the expiration of a live key. Returns true only if there was
    /// one to drop
    pub fn persist(&mut self, key: &[u8], now: u64) -> bool {
        match self.get_entry_mut(key, now) {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        }
    }
    /// Fetch a container for mutation, creating an empty one (without TTL)
    /// if the key is absent. Returns `None` if the key is alive with a
    /// different type
    pub fn get_or_create(&mut self, key: &Data, tag: Tag, now: u64) -> Option<&mut Value> {
        self.evict_if_expired(key.as_ref(), now);
        let entry = self
            .table
            .entry(key.clone())
            .or_insert_with(|| KeyspaceEntry::new(tag.empty_value()));
        if entry.value.tag() == tag {
            Some(&mut entry.value)
        } else {
            None
        }
    }
    /// Enforce the empty-container rule: containers emptied by a removal
    /// operation delete their key
    pub fn remove_if_drained(&mut self, key: &[u8]) {
        let drained = self
            .table
            .get(key)
            .map(|e| e.value.is_drained_container())
            .unwrap_or(false);
        if drained {
            self.table.remove(key);
        }
    }
    /// Eagerly reclaim expired keys, visiting at most `limit` expired
    /// entries per call. Returns the number reclaimed
    pub fn sweep_expired(&mut self, now: u64, limit: usize) -> usize {
        let victims: Vec<Data> = self
            .table
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            self.table.remove(key.as_ref());
        }
        victims.len()
    }
    /// Iterate live entries
    pub fn iter_live(&self, now: u64) -> impl Iterator<Item = (&Data, &KeyspaceEntry)> {
        self.table.iter().filter(move |(_, e)| !e.is_expired(now))
    }
}

struct Shared {
    keyspace: RwLock<Keyspace>,
    pubsub: PubSub,
    config: ConfigSet,
    rdb_path: PathBuf,
    rdb_tmp_path: PathBuf,
    /// write operations since the last successful save
    dirty: AtomicUsize,
    /// wall-clock ms of the last successful save (boot time until then)
    last_save: AtomicU64,
    commands_processed: AtomicU64,
    connected_clients: AtomicUsize,
    /// set by `SHUTDOWN NOSAVE`
    skip_final_save: AtomicBool,
    boot_time: u64,
}

/// The top level abstraction for the in-memory store. This is free to be
/// shared across threads and cloned: clones observe the same keyspace
#[derive(Clone)]
pub struct Corestore {
    shared: Arc<Shared>,
}

impl Corestore {
    /// A fresh store with an empty keyspace
    pub fn new(config: ConfigSet) -> Self {
        Self::with_keyspace(config, Keyspace::new())
    }
    /// A store wrapping an existing keyspace (used when restoring a
    /// snapshot on startup)
    pub fn with_keyspace(config: ConfigSet, keyspace: Keyspace) -> Self {
        let now = util::time_now_ms();
        let rdb_path = config.rdb_path();
        let rdb_tmp_path = config.rdb_tmp_path();
        Corestore {
            shared: Arc::new(Shared {
                keyspace: RwLock::new(keyspace),
                pubsub: PubSub::new(),
                config,
                rdb_path,
                rdb_tmp_path,
                dirty: AtomicUsize::new(0),
                last_save: AtomicU64::new(now),
                commands_processed: AtomicU64::new(0),
                connected_clients: AtomicUsize::new(0),
                skip_final_save: AtomicBool::new(false),
                boot_time: now,
            }),
        }
    }
    pub fn keyspace(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.shared.keyspace.read()
    }
    pub fn keyspace_mut(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.shared.keyspace.write()
    }
    pub fn pubsub(&self) -> &PubSub {
        &self.shared.pubsub
    }
    pub fn config(&self) -> &ConfigSet {
        &self.shared.config
    }
    pub fn rdb_path(&self) -> &Path {
        &self.shared.rdb_path
    }
    pub fn rdb_tmp_path(&self) -> &Path {
        &self.shared.rdb_tmp_path
    }
    pub fn mark_dirty(&self, changes: usize) {
        if changes != 0 {
            self.shared.dirty.fetch_add(changes, Ordering::Release);
        }
    }
    pub fn dirty_count(&self) -> usize {
        self.shared.dirty.load(Ordering::Acquire)
    }
    /// Account for a successful save: subtract the changes that were
    /// captured by the snapshot (writes racing the file write survive into
    /// the next cycle) and stamp the save time
    pub fn after_save(&self, captured_dirty: usize, saved_on: u64) {
        let _ = self
            .shared
            .dirty
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_sub(captured_dirty))
            });
        self.shared.last_save.store(saved_on, Ordering::Release);
    }
    pub fn last_save_ms(&self) -> u64 {
        self.shared.last_save.load(Ordering::Acquire)
    }
    pub fn incr_commands_processed(&self) {
        self.shared
            .commands_processed
            .fetch_add(1, Ordering::Relaxed);
    }
    pub fn commands_processed(&self) -> u64 {
        self.shared.commands_processed.load(Ordering::Relaxed)
    }
    pub fn client_connected(&self) {
        self.shared
            .connected_clients
            .fetch_add(1, Ordering::Relaxed);
    }
    pub fn client_disconnected(&self) {
        self.shared
            .connected_clients
            .fetch_sub(1, Ordering::Relaxed);
    }
    pub fn connected_clients(&self) -> usize {
        self.shared.connected_clients.load(Ordering::Relaxed)
    }
    pub fn set_skip_final_save(&self) {
        self.shared.skip_final_save.store(true, Ordering::Release);
    }
    pub fn skip_final_save(&self) -> bool {
        self.shared.skip_final_save.load(Ordering::Acquire)
    }
    pub fn boot_time_ms(&self) -> u64 {
        self.shared.boot_time
    }
    /// Serialize a point-in-time snapshot of the keyspace under the read
    /// lock. Expired keys are left behind
    pub fn make_snapshot(&self) -> SnapshotFile {
        let now = util::time_now_ms();
        let guard = self.keyspace();
        diskstore::snapshot_from_keyspace(&guard, now)
    }
}
