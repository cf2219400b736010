/*
 * Created on Tue Jul 20 2021
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

use super::*;

fn str_entry(ks: &mut Keyspace, key: &str, value: &str, expires_at: Option<u64>) {
    ks.insert(Data::from(key), Value::Str(Data::from(value)), expires_at);
}

#[test]
fn test_expired_key_is_invisible() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "k", "v", Some(1_000));
    // alive strictly before the deadline
    assert!(ks.get(b"k", 999).is_some());
    // dead at and after the deadline
    assert!(ks.get(b"k", 1_000).is_none());
    assert!(!ks.contains(b"k", 1_001));
    assert_eq!(ks.type_name(b"k", 1_001), None);
    assert_eq!(ks.ttl_ms(b"k", 1_001), TtlState::Missing);
    assert_eq!(ks.len(1_001), 0);
}

#[test]
fn test_write_path_evicts_expired_entry() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "k", "v", Some(1_000));
    assert!(ks.get_mut(b"k", 2_000).is_none());
    // the carcass is really gone, not just hidden
    assert!(ks.get(b"k", 0).is_none());
}

#[test]
fn test_ttl_states() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "forever", "v", None);
    str_entry(&mut ks, "volatile", "v", Some(5_000));
    assert_eq!(ks.ttl_ms(b"missing", 0), TtlState::Missing);
    assert_eq!(ks.ttl_ms(b"forever", 0), TtlState::NoExpiry);
    assert_eq!(ks.ttl_ms(b"volatile", 2_000), TtlState::Remaining(3_000));
}

#[test]
fn test_expire_at_in_the_past_deletes() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "k", "v", None);
    assert!(ks.expire_at(b"k", 500, 1_000));
    assert!(!ks.contains(b"k", 1_000));
    // missing keys refuse an expiry
    assert!(!ks.expire_at(b"gone", 5_000, 1_000));
}

#[test]
fn test_persist() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "k", "v", Some(10_000));
    assert!(ks.persist(b"k", 0));
    assert_eq!(ks.ttl_ms(b"k", 0), TtlState::NoExpiry);
    // nothing left to drop
    assert!(!ks.persist(b"k", 0));
}

#[test]
fn test_rename_carries_value_and_ttl() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "src", "v", Some(9_000));
    assert!(ks.rename(b"src", Data::from("dst"), 0));
    assert!(ks.get(b"src", 0).is_none());
    assert_eq!(ks.ttl_ms(b"dst", 0), TtlState::Remaining(9_000));
    // renaming something expired fails like a missing key
    str_entry(&mut ks, "old", "v", Some(1));
    assert!(!ks.rename(b"old", Data::from("new"), 5_000));
}

#[test]
fn test_get_or_create_enforces_the_type_tag() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "s", "v", None);
    assert!(ks.get_or_create(&Data::from("s"), Tag::List, 0).is_none());
    assert!(ks.get_or_create(&Data::from("fresh"), Tag::List, 0).is_some());
    assert_eq!(ks.type_name(b"fresh", 0), Some("list"));
}

#[test]
fn test_get_or_create_replaces_expired_entry() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "k", "v", Some(100));
    // at t=200 the string is dead, so a list may take the name
    assert!(ks.get_or_create(&Data::from("k"), Tag::List, 200).is_some());
    assert_eq!(ks.type_name(b"k", 200), Some("list"));
    assert_eq!(ks.ttl_ms(b"k", 200), TtlState::NoExpiry);
}

#[test]
fn test_remove_if_drained() {
    let mut ks = Keyspace::new();
    if let Some(Value::Set(set)) = ks.get_or_create(&Data::from("s"), Tag::Set, 0) {
        set.insert(Data::from("m"));
    }
    if let Some(Value::Set(set)) = ks.get_mut(b"s", 0) {
        set.remove(b"m".as_ref());
    }
    ks.remove_if_drained(b"s");
    assert!(!ks.contains(b"s", 0));
    // strings are never "drained"
    str_entry(&mut ks, "empty", "", None);
    ks.remove_if_drained(b"empty");
    assert!(ks.contains(b"empty", 0));
}

#[test]
fn test_sweep_expired_respects_the_limit() {
    let mut ks = Keyspace::new();
    for i in 0..10 {
        str_entry(&mut ks, &format!("dead{}", i), "v", Some(1));
    }
    str_entry(&mut ks, "alive", "v", None);
    let removed = ks.sweep_expired(1_000, 4);
    assert_eq!(removed, 4);
    let removed = ks.sweep_expired(1_000, 100);
    assert_eq!(removed, 6);
    assert_eq!(ks.len(1_000), 1);
}

#[test]
fn test_keys_matching_and_sorted_keys() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "user:1", "a", None);
    str_entry(&mut ks, "user:2", "b", None);
    str_entry(&mut ks, "session:1", "c", None);
    str_entry(&mut ks, "expired:user:3", "d", Some(1));
    let mut matched = ks.keys_matching(b"user:*", 1_000);
    matched.sort_unstable();
    assert_eq!(matched, vec![Data::from("user:1"), Data::from("user:2")]);
    let sorted = ks.sorted_keys(1_000);
    assert_eq!(
        sorted,
        vec![
            Data::from("session:1"),
            Data::from("user:1"),
            Data::from("user:2")
        ]
    );
}

#[test]
fn test_clear_and_len() {
    let mut ks = Keyspace::new();
    str_entry(&mut ks, "a", "1", None);
    str_entry(&mut ks, "b", "2", None);
    assert_eq!(ks.len(0), 2);
    assert_eq!(ks.clear(), 2);
    assert_eq!(ks.len(0), 0);
}

#[test]
fn test_random_key_only_sees_live_keys() {
    let mut ks = Keyspace::new();
    assert!(ks.random_key(0).is_none());
    str_entry(&mut ks, "dead", "v", Some(1));
    str_entry(&mut ks, "alive", "v", None);
    for _ in 0..16 {
        assert_eq!(ks.random_key(1_000), Some(Data::from("alive")));
    }
}
