/*
 * Created on Fri Jul 16 2021
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

//! # Persistent snapshot storage
//!
//! The on-disk format is a versioned bincode blob: format version, the
//! save timestamp and one entry per key carrying the type-tagged value
//! plus the optional expiration instant. Writes go to a sibling `.tmp`
//! file which is fsynced and then renamed over the real one, so a crash
//! mid-save leaves the previous snapshot intact.

use crate::corestore::zset::SortedSet;
use crate::corestore::{Data, Keyspace, Value};
use crate::util::error::{Error, SableResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A serialized value, one variant per supported type. Sorted sets keep
/// their `(member, score)` pairs in rank order so a restore rebuilds the
/// identical ordering
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum SnapshotValue {
    Str(Vec<u8>),
    List(Vec<Vec<u8>>),
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    Set(Vec<Vec<u8>>),
    Zset(Vec<(Vec<u8>, f64)>),
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEntry {
    pub key: Vec<u8>,
    pub value: SnapshotValue,
    pub expires_at: Option<u64>,
}

/// The whole point-in-time snapshot
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SnapshotFile {
    pub version: u32,
    /// wall-clock ms at serialization time
    pub saved_on: u64,
    pub entries: Vec<SnapshotEntry>,
}

fn value_to_snapshot(value: &Value) -> SnapshotValue {
    match value {
        Value::Str(data) => SnapshotValue::Str(data.as_ref().to_vec()),
        Value::List(list) => {
            SnapshotValue::List(list.iter().map(|e| e.as_ref().to_vec()).collect())
        }
        Value::Hash(hash) => SnapshotValue::Hash(
            hash.iter()
                .map(|(f, v)| (f.as_ref().to_vec(), v.as_ref().to_vec()))
                .collect(),
        ),
        Value::Set(set) => {
            SnapshotValue::Set(set.iter().map(|m| m.as_ref().to_vec()).collect())
        }
        Value::Zset(zs) => {
            SnapshotValue::Zset(zs.iter().map(|(m, s)| (m.as_ref().to_vec(), s)).collect())
        }
    }
}

fn value_from_snapshot(value: SnapshotValue) -> Value {
    match value {
        SnapshotValue::Str(data) => Value::Str(Data::from(data)),
        SnapshotValue::List(list) => {
            Value::List(list.into_iter().map(Data::from).collect::<VecDeque<_>>())
        }
        SnapshotValue::Hash(hash) => Value::Hash(
            hash.into_iter()
                .map(|(f, v)| (Data::from(f), Data::from(v)))
                .collect::<HashMap<_, _>>(),
        ),
        SnapshotValue::Set(set) => {
            Value::Set(set.into_iter().map(Data::from).collect::<HashSet<_>>())
        }
        SnapshotValue::Zset(entries) => Value::Zset(SortedSet::from_entries(
            entries
                .into_iter()
                .map(|(m, s)| (Data::from(m), s))
                .collect(),
        )),
    }
}

/// Export every live entry of a keyspace
pub fn snapshot_from_keyspace(keyspace: &Keyspace, now: u64) -> SnapshotFile {
    let entries = keyspace
        .iter_live(now)
        .map(|(key, entry)| SnapshotEntry {
            key: key.as_ref().to_vec(),
            value: value_to_snapshot(&entry.value),
            expires_at: entry.expires_at,
        })
        .collect();
    SnapshotFile {
        version: SNAPSHOT_VERSION,
        saved_on: now,
        entries,
    }
}

/// Rebuild a keyspace, discarding entries that expired while the snapshot
/// sat on disk
pub fn keyspace_from_snapshot(snapshot: SnapshotFile, now: u64) -> Keyspace {
    let mut keyspace = Keyspace::new();
    for entry in snapshot.entries {
        if let Some(at) = entry.expires_at {
            if now >= at {
                continue;
            }
        }
        keyspace.insert(
            Data::from(entry.key),
            value_from_snapshot(entry.value),
            entry.expires_at,
        );
    }
    keyspace
}

/// Atomically flush a snapshot: serialize, write the `.tmp` sibling,
/// fsync, rename over the real file
pub fn flush_data(path: &Path, tmp_path: &Path, snapshot: &SnapshotFile) -> SableResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::ioerror_extra(e, "creating the data directory"))?;
        }
    }
    let encoded = bincode::serialize(snapshot)?;
    let mut file = fs::File::create(tmp_path)
        .map_err(|e| Error::ioerror_extra(e, "creating the temporary snapshot file"))?;
    file.write_all(&encoded)
        .map_err(|e| Error::ioerror_extra(e, "writing the snapshot"))?;
    file.sync_all()
        .map_err(|e| Error::ioerror_extra(e, "syncing the snapshot"))?;
    drop(file);
    fs::rename(tmp_path, path)
        .map_err(|e| Error::ioerror_extra(e, "renaming the snapshot into place"))?;
    Ok(())
}

/// Try to get the saved data from disk. Returns `None` if there is no
/// snapshot file; a version mismatch or decode failure is an error the
/// caller is expected to log before proceeding with an empty keyspace
pub fn get_saved(path: &Path) -> SableResult<Option<SnapshotFile>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) => match e.kind() {
            ErrorKind::NotFound => return Ok(None),
            _ => return Err(Error::ioerror_extra(e, "reading the snapshot file")),
        },
    };
    let snapshot: SnapshotFile =
        bincode::deserialize(&raw).map_err(|e| Error::DecodeError(e.to_string()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::DecodeError(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corestore::Tag;

    fn sample_keyspace(now: u64) -> Keyspace {
        let mut ks = Keyspace::new();
        ks.insert(Data::from("str"), Value::Str(Data::from("value")), None);
        ks.insert(
            Data::from("volatile"),
            Value::Str(Data::from("v")),
            Some(now + 60_000),
        );
        let mut list = VecDeque::new();
        list.push_back(Data::from("a"));
        list.push_back(Data::from("b"));
        ks.insert(Data::from("list"), Value::List(list), None);
        let mut hash = HashMap::new();
        hash.insert(Data::from("f"), Data::from("v"));
        ks.insert(Data::from("hash"), Value::Hash(hash), None);
        let mut set = HashSet::new();
        set.insert(Data::from("m"));
        ks.insert(Data::from("set"), Value::Set(set), None);
        let mut zs = SortedSet::new();
        zs.insert(Data::from("one"), 1.0);
        zs.insert(Data::from("two"), 2.0);
        ks.insert(Data::from("zset"), Value::Zset(zs), None);
        ks
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let now = 1_000_000;
        let ks = sample_keyspace(now);
        let snapshot = snapshot_from_keyspace(&ks, now);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.entries.len(), 6);
        let restored = keyspace_from_snapshot(snapshot, now);
        assert_eq!(restored.len(now), 6);
        assert_eq!(
            restored.get(b"str", now).and_then(Value::as_str),
            Some(&Data::from("value"))
        );
        match restored.get(b"zset", now) {
            Some(Value::Zset(zs)) => {
                assert_eq!(zs.rank(b"one", false), Some(0));
                assert_eq!(zs.rank(b"two", false), Some(1));
            }
            other => panic!("expected a zset, got {:?}", other),
        }
        match restored.ttl_ms(b"volatile", now) {
            crate::corestore::TtlState::Remaining(ms) => assert_eq!(ms, 60_000),
            other => panic!("unexpected ttl state: {:?}", other),
        }
    }

    #[test]
    fn test_expired_entries_are_dropped_on_restore() {
        let now = 1_000_000;
        let ks = sample_keyspace(now);
        let snapshot = snapshot_from_keyspace(&ks, now);
        // pretend two minutes passed on disk
        let restored = keyspace_from_snapshot(snapshot, now + 120_000);
        assert_eq!(restored.len(now + 120_000), 5);
        assert!(restored.get(b"volatile", now + 120_000).is_none());
    }

    #[test]
    fn test_file_roundtrip_and_missing_file() {
        let dir = std::env::temp_dir().join(format!("sable-dstest-{}", std::process::id()));
        let path = dir.join("dump.rdb");
        let tmp = dir.join("dump.rdb.tmp");
        let now = 42;
        let mut ks = Keyspace::new();
        let _ = ks.get_or_create(&Data::from("k"), Tag::Set, now);
        if let Some(Value::Set(set)) = ks.get_mut(b"k", now) {
            set.insert(Data::from("member"));
        }
        let snapshot = snapshot_from_keyspace(&ks, now);
        flush_data(&path, &tmp, &snapshot).unwrap();
        // the tmp file must be gone after the rename
        assert!(!tmp.exists());
        let loaded = get_saved(&path).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(get_saved(&dir.join("nope.rdb")).unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }
}
