/*
 * Created on Fri Jul 23 2021
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

//! End-to-end command semantics, driven through the dispatcher against a
//! fresh store per test

use crate::actions::ActionError;
use crate::config::ConfigSet;
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::queryengine;
use crate::resp::Response;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

fn setup() -> (Corestore, ClientContext) {
    let (tx, _rx) = mpsc::unbounded_channel();
    (
        Corestore::new(ConfigSet::default()),
        ClientContext::new(1, tx),
    )
}

fn run(db: &Corestore, con: &mut ClientContext, parts: &[&str]) -> Response {
    queryengine::execute(db, con, parts.iter().map(|p| Data::from(*p)).collect())
        .unwrap_or_else(|e| panic!("{:?} failed: {:?}", parts, e))
}

fn run_err(db: &Corestore, con: &mut ClientContext, parts: &[&str]) -> String {
    match queryengine::execute(db, con, parts.iter().map(|p| Data::from(*p)).collect()) {
        Err(ActionError::ActionError(e)) => e,
        other => panic!("{:?} should have failed, got {:?}", parts, other),
    }
}

fn bulk(s: &str) -> Response {
    Response::Bulk(Data::from(s))
}

fn bulks(items: &[&str]) -> Response {
    Response::Array(items.iter().map(|s| bulk(s)).collect())
}

fn int(i: i64) -> Response {
    Response::Integer(i)
}

#[test]
fn test_set_get_roundtrip() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["SET", "foo", "bar"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["GET", "foo"]), bulk("bar"));
    assert_eq!(run(&db, &mut con, &["STRLEN", "foo"]), int(3));
    assert_eq!(run(&db, &mut con, &["APPEND", "foo", "baz"]), int(6));
    assert_eq!(run(&db, &mut con, &["GET", "foo"]), bulk("barbaz"));
    assert_eq!(run(&db, &mut con, &["GET", "nosuchkey"]), Response::NullBulk);
}

#[test]
fn test_set_conditions_and_ttl_options() {
    let (db, mut con) = setup();
    // NX on a fresh key works, on an existing one it doesn't
    assert_eq!(run(&db, &mut con, &["SET", "k", "1", "NX"]), Response::Okay);
    assert_eq!(
        run(&db, &mut con, &["SET", "k", "2", "NX"]),
        Response::NullBulk
    );
    assert_eq!(run(&db, &mut con, &["GET", "k"]), bulk("1"));
    // XX needs the key to exist
    assert_eq!(
        run(&db, &mut con, &["SET", "other", "x", "XX"]),
        Response::NullBulk
    );
    // GET returns the prior value whatever happens
    assert_eq!(run(&db, &mut con, &["SET", "k", "3", "GET"]), bulk("1"));
    assert_eq!(
        run(&db, &mut con, &["SET", "fresh", "v", "GET"]),
        Response::NullBulk
    );
    // a plain SET clears the TTL, KEEPTTL preserves it
    assert_eq!(
        run(&db, &mut con, &["SET", "k", "4", "EX", "100"]),
        Response::Okay
    );
    assert_eq!(run(&db, &mut con, &["TTL", "k"]), int(100));
    assert_eq!(
        run(&db, &mut con, &["SET", "k", "5", "KEEPTTL"]),
        Response::Okay
    );
    assert_eq!(run(&db, &mut con, &["TTL", "k"]), int(100));
    assert_eq!(run(&db, &mut con, &["SET", "k", "6"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["TTL", "k"]), int(-1));
    // invalid expire
    assert_eq!(
        run_err(&db, &mut con, &["SET", "k", "v", "EX", "0"]),
        "ERR invalid expire time in 'set' command"
    );
    assert_eq!(run_err(&db, &mut con, &["SET", "k", "v", "BOGUS"]), responses::ERR_SYNTAX);
}

#[test]
fn test_ttl_expiry_end_to_end() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["SET", "k", "v", "PX", "40"]),
        Response::Okay
    );
    assert_eq!(run(&db, &mut con, &["EXISTS", "k"]), int(1));
    thread::sleep(Duration::from_millis(80));
    assert_eq!(run(&db, &mut con, &["GET", "k"]), Response::NullBulk);
    assert_eq!(run(&db, &mut con, &["TTL", "k"]), int(-2));
    assert_eq!(run(&db, &mut con, &["EXISTS", "k"]), int(0));
    assert_eq!(
        run(&db, &mut con, &["TYPE", "k"]),
        Response::Simple("none".to_owned())
    );
}

#[test]
fn test_ttl_rounds_up_to_full_seconds() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["SET", "k", "v", "EX", "1"]),
        Response::Okay
    );
    assert_eq!(run(&db, &mut con, &["TTL", "k"]), int(1));
}

#[test]
fn test_wrongtype_is_signalled() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["SET", "x", "1"]), Response::Okay);
    assert_eq!(
        run_err(&db, &mut con, &["LPUSH", "x", "a"]),
        responses::WRONGTYPE_ERR
    );
    assert_eq!(
        run_err(&db, &mut con, &["SADD", "x", "a"]),
        responses::WRONGTYPE_ERR
    );
    run(&db, &mut con, &["RPUSH", "list", "a"]);
    assert_eq!(
        run_err(&db, &mut con, &["GET", "list"]),
        responses::WRONGTYPE_ERR
    );
}

#[test]
fn test_counters() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["INCR", "n"]), int(1));
    assert_eq!(run(&db, &mut con, &["INCRBY", "n", "41"]), int(42));
    assert_eq!(run(&db, &mut con, &["DECRBY", "n", "2"]), int(40));
    assert_eq!(run(&db, &mut con, &["DECR", "n"]), int(39));
    assert_eq!(run(&db, &mut con, &["SET", "s", "notanumber"]), Response::Okay);
    assert_eq!(
        run_err(&db, &mut con, &["INCR", "s"]),
        responses::ERR_NOT_INTEGER
    );
    assert_eq!(
        run(&db, &mut con, &["SET", "big", &i64::MAX.to_string()]),
        Response::Okay
    );
    assert_eq!(
        run_err(&db, &mut con, &["INCR", "big"]),
        responses::ERR_OVERFLOW
    );
    // float increments format as shortest round-trip decimals
    assert_eq!(run(&db, &mut con, &["INCRBYFLOAT", "f", "10.5"]), bulk("10.5"));
    assert_eq!(run(&db, &mut con, &["INCRBYFLOAT", "f", "0.1"]), bulk("10.6"));
    assert_eq!(run(&db, &mut con, &["INCRBYFLOAT", "g", "3"]), bulk("3"));
}

#[test]
fn test_getrange_setrange() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["SET", "s", "Hello World"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["GETRANGE", "s", "0", "4"]), bulk("Hello"));
    assert_eq!(run(&db, &mut con, &["GETRANGE", "s", "-5", "-1"]), bulk("World"));
    assert_eq!(run(&db, &mut con, &["GETRANGE", "s", "9", "2"]), bulk(""));
    assert_eq!(run(&db, &mut con, &["SETRANGE", "s", "6", "Redis"]), int(11));
    assert_eq!(run(&db, &mut con, &["GET", "s"]), bulk("Hello Redis"));
    // padding with zero bytes
    assert_eq!(run(&db, &mut con, &["SETRANGE", "pad", "3", "x"]), int(4));
    assert_eq!(
        run(&db, &mut con, &["GET", "pad"]),
        Response::Bulk(Data::copy_from_slice(b"\x00\x00\x00x"))
    );
}

#[test]
fn test_mset_msetnx() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["MSET", "a", "1", "b", "2"]),
        Response::Okay
    );
    assert_eq!(
        run(&db, &mut con, &["MGET", "a", "b", "missing"]),
        Response::Array(vec![bulk("1"), bulk("2"), Response::NullBulk])
    );
    // all-or-nothing
    assert_eq!(
        run(&db, &mut con, &["MSETNX", "b", "x", "c", "y"]),
        int(0)
    );
    assert_eq!(run(&db, &mut con, &["EXISTS", "c"]), int(0));
    assert_eq!(
        run(&db, &mut con, &["MSETNX", "c", "3", "d", "4"]),
        int(1)
    );
    assert_eq!(run(&db, &mut con, &["GET", "d"]), bulk("4"));
}

#[test]
fn test_getdel_getset_getex() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["SET", "k", "v"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["GETSET", "k", "w"]), bulk("v"));
    assert_eq!(run(&db, &mut con, &["GETDEL", "k"]), bulk("w"));
    assert_eq!(run(&db, &mut con, &["EXISTS", "k"]), int(0));
    assert_eq!(run(&db, &mut con, &["GETDEL", "k"]), Response::NullBulk);
    assert_eq!(run(&db, &mut con, &["SET", "e", "v"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["GETEX", "e", "EX", "50"]), bulk("v"));
    assert_eq!(run(&db, &mut con, &["TTL", "e"]), int(50));
    assert_eq!(run(&db, &mut con, &["GETEX", "e", "PERSIST"]), bulk("v"));
    assert_eq!(run(&db, &mut con, &["TTL", "e"]), int(-1));
}

#[test]
fn test_list_push_pop_and_ranges() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["RPUSH", "L", "a", "b", "c"]), int(3));
    assert_eq!(run(&db, &mut con, &["LPUSH", "L", "z"]), int(4));
    assert_eq!(run(&db, &mut con, &["LLEN", "L"]), int(4));
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L", "0", "-1"]),
        bulks(&["z", "a", "b", "c"])
    );
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L", "-2", "-1"]),
        bulks(&["b", "c"])
    );
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L", "7", "9"]),
        Response::Array(Vec::new())
    );
    assert_eq!(run(&db, &mut con, &["LPOP", "L"]), bulk("z"));
    assert_eq!(run(&db, &mut con, &["RPOP", "L", "2"]), bulks(&["c", "b"]));
    // popping the last element removes the key
    assert_eq!(run(&db, &mut con, &["RPOP", "L"]), bulk("a"));
    assert_eq!(run(&db, &mut con, &["EXISTS", "L"]), int(0));
    // pushx on a missing key does nothing
    assert_eq!(run(&db, &mut con, &["LPUSHX", "L", "x"]), int(0));
    assert_eq!(run(&db, &mut con, &["EXISTS", "L"]), int(0));
}

#[test]
fn test_list_index_set_insert_rem_trim() {
    let (db, mut con) = setup();
    run(&db, &mut con, &["RPUSH", "L", "a", "b", "c", "b", "a"]);
    assert_eq!(run(&db, &mut con, &["LINDEX", "L", "1"]), bulk("b"));
    assert_eq!(run(&db, &mut con, &["LINDEX", "L", "-1"]), bulk("a"));
    assert_eq!(run(&db, &mut con, &["LINDEX", "L", "9"]), Response::NullBulk);
    assert_eq!(run(&db, &mut con, &["LSET", "L", "2", "C"]), Response::Okay);
    assert_eq!(
        run_err(&db, &mut con, &["LSET", "L", "9", "x"]),
        responses::ERR_INDEX_OUT_OF_RANGE
    );
    assert_eq!(
        run_err(&db, &mut con, &["LSET", "missing", "0", "x"]),
        responses::ERR_NO_SUCH_KEY
    );
    assert_eq!(
        run(&db, &mut con, &["LINSERT", "L", "BEFORE", "C", "mid"]),
        int(6)
    );
    assert_eq!(
        run(&db, &mut con, &["LINSERT", "L", "AFTER", "ghost", "x"]),
        int(-1)
    );
    assert_eq!(
        run(&db, &mut con, &["LINSERT", "missing", "BEFORE", "a", "x"]),
        int(0)
    );
    // LREM from the head, then from the tail
    assert_eq!(run(&db, &mut con, &["LREM", "L", "1", "a"]), int(1));
    assert_eq!(run(&db, &mut con, &["LREM", "L", "-1", "a"]), int(1));
    assert_eq!(run(&db, &mut con, &["LREM", "L", "0", "b"]), int(2));
    assert_eq!(run(&db, &mut con, &["LTRIM", "L", "0", "0"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["LRANGE", "L", "0", "-1"]), bulks(&["mid"]));
    // trimming everything away deletes the key
    assert_eq!(run(&db, &mut con, &["LTRIM", "L", "5", "9"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["EXISTS", "L"]), int(0));
}

#[test]
fn test_rpoplpush_is_atomic_rotation() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["RPUSH", "L1", "x", "y", "z"]), int(3));
    assert_eq!(run(&db, &mut con, &["RPOPLPUSH", "L1", "L2"]), bulk("z"));
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L1", "0", "-1"]),
        bulks(&["x", "y"])
    );
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L2", "0", "-1"]),
        bulks(&["z"])
    );
    // same-key rotation
    assert_eq!(run(&db, &mut con, &["RPOPLPUSH", "L1", "L1"]), bulk("y"));
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L1", "0", "-1"]),
        bulks(&["y", "x"])
    );
    assert_eq!(
        run(&db, &mut con, &["LMOVE", "L1", "L2", "RIGHT", "RIGHT"]),
        bulk("x")
    );
    assert_eq!(
        run(&db, &mut con, &["LRANGE", "L2", "0", "-1"]),
        bulks(&["z", "x"])
    );
    assert_eq!(
        run(&db, &mut con, &["RPOPLPUSH", "missing", "L2"]),
        Response::NullBulk
    );
}

#[test]
fn test_lpos() {
    let (db, mut con) = setup();
    run(&db, &mut con, &["RPUSH", "L", "a", "b", "c", "1", "2", "3", "c", "c"]);
    assert_eq!(run(&db, &mut con, &["LPOS", "L", "c"]), int(2));
    assert_eq!(run(&db, &mut con, &["LPOS", "L", "c", "RANK", "2"]), int(6));
    assert_eq!(run(&db, &mut con, &["LPOS", "L", "c", "RANK", "-1"]), int(7));
    assert_eq!(
        run(&db, &mut con, &["LPOS", "L", "c", "COUNT", "2"]),
        Response::Array(vec![int(2), int(6)])
    );
    assert_eq!(
        run(&db, &mut con, &["LPOS", "L", "c", "COUNT", "0"]),
        Response::Array(vec![int(2), int(6), int(7)])
    );
    assert_eq!(run(&db, &mut con, &["LPOS", "L", "ghost"]), Response::NullBulk);
    assert_eq!(
        run_err(&db, &mut con, &["LPOS", "L", "c", "RANK", "0"]),
        responses::ERR_RANK_ZERO
    );
}

#[test]
fn test_blocking_variants_degrade() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["BLPOP", "nope", "0.5"]),
        Response::NullArray
    );
    run(&db, &mut con, &["RPUSH", "L", "v"]);
    assert_eq!(
        run(&db, &mut con, &["BLPOP", "nope", "L", "5"]),
        bulks(&["L", "v"])
    );
    assert_eq!(
        run_err(&db, &mut con, &["BLPOP", "L", "never"]),
        responses::ERR_TIMEOUT_NOT_FLOAT
    );
    assert_eq!(
        run(&db, &mut con, &["BRPOPLPUSH", "empty", "dst", "1"]),
        Response::NullBulk
    );
    assert_eq!(
        run(&db, &mut con, &["BZPOPMIN", "nozset", "1"]),
        Response::NullArray
    );
}

#[test]
fn test_hashes() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["HSET", "h", "f1", "v1", "f2", "v2"]),
        int(2)
    );
    // updating an existing field is not a new field
    assert_eq!(run(&db, &mut con, &["HSET", "h", "f1", "v1b"]), int(0));
    assert_eq!(run(&db, &mut con, &["HGET", "h", "f1"]), bulk("v1b"));
    assert_eq!(run(&db, &mut con, &["HLEN", "h"]), int(2));
    assert_eq!(run(&db, &mut con, &["HEXISTS", "h", "f2"]), int(1));
    assert_eq!(run(&db, &mut con, &["HSTRLEN", "h", "f2"]), int(2));
    assert_eq!(
        run(&db, &mut con, &["HMGET", "h", "f2", "ghost"]),
        Response::Array(vec![bulk("v2"), Response::NullBulk])
    );
    assert_eq!(run(&db, &mut con, &["HSETNX", "h", "f1", "x"]), int(0));
    assert_eq!(run(&db, &mut con, &["HSETNX", "h", "f3", "x"]), int(1));
    assert_eq!(run(&db, &mut con, &["HINCRBY", "h", "count", "5"]), int(5));
    assert_eq!(run(&db, &mut con, &["HINCRBY", "h", "count", "-2"]), int(3));
    assert_eq!(
        run_err(&db, &mut con, &["HINCRBY", "h", "f1", "1"]),
        responses::ERR_HASH_NOT_INTEGER
    );
    assert_eq!(
        run(&db, &mut con, &["HINCRBYFLOAT", "h", "fl", "1.5"]),
        bulk("1.5")
    );
    // deleting the last fields removes the key
    assert_eq!(
        run(&db, &mut con, &["HDEL", "h", "f1", "f2", "f3", "count", "fl"]),
        int(5)
    );
    assert_eq!(run(&db, &mut con, &["EXISTS", "h"]), int(0));
}

#[test]
fn test_sets_and_algebra() {
    let (db, mut con) = setup();
    assert_eq!(run(&db, &mut con, &["SADD", "s1", "a", "b", "c"]), int(3));
    assert_eq!(run(&db, &mut con, &["SADD", "s1", "a", "d"]), int(1));
    assert_eq!(run(&db, &mut con, &["SCARD", "s1"]), int(4));
    assert_eq!(run(&db, &mut con, &["SISMEMBER", "s1", "a"]), int(1));
    assert_eq!(run(&db, &mut con, &["SISMEMBER", "s1", "z"]), int(0));
    assert_eq!(
        run(&db, &mut con, &["SMISMEMBER", "s1", "a", "z"]),
        Response::Array(vec![int(1), int(0)])
    );
    run(&db, &mut con, &["SADD", "s2", "b", "c", "e"]);
    let sorted = |resp: Response| -> Vec<Data> {
        match resp {
            Response::Array(items) => {
                let mut out: Vec<Data> = items
                    .into_iter()
                    .map(|r| match r {
                        Response::Bulk(d) => d,
                        other => panic!("unexpected element {:?}", other),
                    })
                    .collect();
                out.sort_unstable();
                out
            }
            other => panic!("expected array, got {:?}", other),
        }
    };
    assert_eq!(
        sorted(run(&db, &mut con, &["SINTER", "s1", "s2"])),
        vec![Data::from("b"), Data::from("c")]
    );
    assert_eq!(
        sorted(run(&db, &mut con, &["SDIFF", "s1", "s2"])),
        vec![Data::from("a"), Data::from("d")]
    );
    assert_eq!(
        sorted(run(&db, &mut con, &["SUNION", "s1", "s2"])).len(),
        5
    );
    assert_eq!(run(&db, &mut con, &["SINTERCARD", "2", "s1", "s2"]), int(2));
    assert_eq!(
        run(&db, &mut con, &["SINTERCARD", "2", "s1", "s2", "LIMIT", "1"]),
        int(1)
    );
    assert_eq!(
        run(&db, &mut con, &["SINTERSTORE", "dst", "s1", "s2"]),
        int(2)
    );
    assert_eq!(run(&db, &mut con, &["SCARD", "dst"]), int(2));
    // an empty result deletes the destination
    run(&db, &mut con, &["SADD", "s3", "zz"]);
    assert_eq!(
        run(&db, &mut con, &["SINTERSTORE", "dst", "s1", "s3"]),
        int(0)
    );
    assert_eq!(run(&db, &mut con, &["EXISTS", "dst"]), int(0));
    // SMOVE and the empty-container rule
    run(&db, &mut con, &["SADD", "one", "only"]);
    assert_eq!(run(&db, &mut con, &["SMOVE", "one", "two", "only"]), int(1));
    assert_eq!(run(&db, &mut con, &["EXISTS", "one"]), int(0));
    assert_eq!(run(&db, &mut con, &["SISMEMBER", "two", "only"]), int(1));
    // SREM down to empty removes the key
    assert_eq!(run(&db, &mut con, &["SREM", "two", "only"]), int(1));
    assert_eq!(run(&db, &mut con, &["EXISTS", "two"]), int(0));
}

#[test]
fn test_spop_srandmember() {
    let (db, mut con) = setup();
    run(&db, &mut con, &["SADD", "s", "a", "b", "c"]);
    match run(&db, &mut con, &["SRANDMEMBER", "s"]) {
        Response::Bulk(_) => {}
        other => panic!("expected a member, got {:?}", other),
    }
    // negative count samples with replacement, so it can exceed the card
    match run(&db, &mut con, &["SRANDMEMBER", "s", "-10"]) {
        Response::Array(items) => assert_eq!(items.len(), 10),
        other => panic!("expected an array, got {:?}", other),
    }
    assert_eq!(run(&db, &mut con, &["SCARD", "s"]), int(3));
    match run(&db, &mut con, &["SPOP", "s", "2"]) {
        Response::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("expected an array, got {:?}", other),
    }
    assert_eq!(run(&db, &mut con, &["SCARD", "s"]), int(1));
    match run(&db, &mut con, &["SPOP", "s"]) {
        Response::Bulk(_) => {}
        other => panic!("expected a member, got {:?}", other),
    }
    // fully popped: key is gone
    assert_eq!(run(&db, &mut con, &["EXISTS", "s"]), int(0));
    assert_eq!(run(&db, &mut con, &["SPOP", "s"]), Response::NullBulk);
}

#[test]
fn test_zset_ranking_scenario() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]),
        int(3)
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]),
        bulks(&["a", "1", "b", "2", "c", "3"])
    );
    assert_eq!(run(&db, &mut con, &["ZRANK", "z", "b"]), int(1));
    assert_eq!(run(&db, &mut con, &["ZREVRANK", "z", "b"]), int(1));
    assert_eq!(run(&db, &mut con, &["ZRANK", "z", "nope"]), Response::NullBulk);
    assert_eq!(
        run(&db, &mut con, &["ZRANGEBYSCORE", "z", "(1", "3"]),
        bulks(&["b", "c"])
    );
    assert_eq!(run(&db, &mut con, &["ZINCRBY", "z", "10", "a"]), bulk("11"));
    assert_eq!(
        run(&db, &mut con, &["ZRANGE", "z", "0", "-1"]),
        bulks(&["b", "c", "a"])
    );
    assert_eq!(run(&db, &mut con, &["ZCARD", "z"]), int(3));
    assert_eq!(run(&db, &mut con, &["ZCOUNT", "z", "2", "11"]), int(3));
    assert_eq!(run(&db, &mut con, &["ZCOUNT", "z", "(2", "(11"]), int(1));
    assert_eq!(run(&db, &mut con, &["ZSCORE", "z", "a"]), bulk("11"));
    assert_eq!(
        run(&db, &mut con, &["ZMSCORE", "z", "a", "ghost"]),
        Response::Array(vec![bulk("11"), Response::NullBulk])
    );
}

#[test]
fn test_zadd_flag_matrix() {
    let (db, mut con) = setup();
    run(&db, &mut con, &["ZADD", "z", "5", "m"]);
    // NX never updates
    assert_eq!(run(&db, &mut con, &["ZADD", "z", "NX", "9", "m"]), int(0));
    assert_eq!(run(&db, &mut con, &["ZSCORE", "z", "m"]), bulk("5"));
    // XX never creates
    assert_eq!(run(&db, &mut con, &["ZADD", "z", "XX", "1", "new"]), int(0));
    assert_eq!(run(&db, &mut con, &["ZCARD", "z"]), int(1));
    // GT only raises
    assert_eq!(run(&db, &mut con, &["ZADD", "z", "GT", "3", "m"]), int(0));
    assert_eq!(run(&db, &mut con, &["ZSCORE", "z", "m"]), bulk("5"));
    assert_eq!(
        run(&db, &mut con, &["ZADD", "z", "GT", "CH", "8", "m"]),
        int(1)
    );
    // CH counts changes, the default counts additions
    assert_eq!(
        run(&db, &mut con, &["ZADD", "z", "CH", "9", "m", "1", "n"]),
        int(2)
    );
    assert_eq!(run(&db, &mut con, &["ZADD", "z", "2", "n"]), int(0));
    // INCR returns the new score, or null when gated
    assert_eq!(
        run(&db, &mut con, &["ZADD", "z", "INCR", "1", "n"]),
        bulk("3")
    );
    assert_eq!(
        run(&db, &mut con, &["ZADD", "z", "NX", "INCR", "1", "n"]),
        Response::NullBulk
    );
    // parse-time rejections
    assert_eq!(
        run_err(&db, &mut con, &["ZADD", "z", "NX", "XX", "1", "m"]),
        responses::ERR_ZADD_NX_XX
    );
    assert_eq!(
        run_err(&db, &mut con, &["ZADD", "z", "NX", "GT", "1", "m"]),
        responses::ERR_ZADD_GT_LT_NX
    );
    assert_eq!(
        run_err(&db, &mut con, &["ZADD", "z", "INCR", "1", "a", "2", "b"]),
        responses::ERR_ZADD_INCR_PAIRS
    );
    assert_eq!(
        run_err(&db, &mut con, &["ZADD", "z", "notascore", "m"]),
        responses::ERR_NOT_FLOAT
    );
}

#[test]
fn test_zset_ranges_and_pop() {
    let (db, mut con) = setup();
    run(
        &db,
        &mut con,
        &["ZADD", "z", "1", "a", "2", "b", "3", "c", "4", "d"],
    );
    assert_eq!(
        run(&db, &mut con, &["ZREVRANGE", "z", "0", "1", "WITHSCORES"]),
        bulks(&["d", "4", "c", "3"])
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGE", "z", "(1", "3", "BYSCORE"]),
        bulks(&["b", "c"])
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGE", "z", "3", "1", "BYSCORE", "REV"]),
        bulks(&["c", "b", "a"])
    );
    assert_eq!(
        run(
            &db,
            &mut con,
            &["ZRANGE", "z", "-inf", "+inf", "BYSCORE", "LIMIT", "1", "2"]
        ),
        bulks(&["b", "c"])
    );
    assert_eq!(
        run_err(&db, &mut con, &["ZRANGE", "z", "0", "-1", "LIMIT", "0", "1"]),
        responses::ERR_LIMIT_NEEDS_BY
    );
    assert_eq!(
        run(&db, &mut con, &["ZPOPMIN", "z"]),
        bulks(&["a", "1"])
    );
    assert_eq!(
        run(&db, &mut con, &["ZPOPMAX", "z", "2"]),
        bulks(&["d", "4", "c", "3"])
    );
    // popping the rest deletes the key
    assert_eq!(run(&db, &mut con, &["ZPOPMIN", "z", "5"]), bulks(&["b", "2"]));
    assert_eq!(run(&db, &mut con, &["EXISTS", "z"]), int(0));
}

#[test]
fn test_zrangestore_and_lex() {
    let (db, mut con) = setup();
    run(
        &db,
        &mut con,
        &["ZADD", "src", "1", "a", "2", "b", "3", "c"],
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGESTORE", "dst", "src", "0", "1"]),
        int(2)
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGE", "dst", "0", "-1"]),
        bulks(&["a", "b"])
    );
    // an empty range deletes the destination
    assert_eq!(
        run(&db, &mut con, &["ZRANGESTORE", "dst", "missing", "0", "-1"]),
        int(0)
    );
    assert_eq!(run(&db, &mut con, &["EXISTS", "dst"]), int(0));
    // lex ranges over an equal-score set
    run(
        &db,
        &mut con,
        &["ZADD", "lex", "0", "a", "0", "b", "0", "c", "0", "d"],
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGEBYLEX", "lex", "[b", "(d"]),
        bulks(&["b", "c"])
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGEBYLEX", "lex", "-", "+"]),
        bulks(&["a", "b", "c", "d"])
    );
    assert_eq!(
        run(&db, &mut con, &["ZRANGE", "lex", "-", "(c", "BYLEX"]),
        bulks(&["a", "b"])
    );
    assert_eq!(
        run_err(&db, &mut con, &["ZRANGEBYLEX", "lex", "b", "+"]),
        responses::ERR_MIN_MAX_NOT_LEX
    );
}

#[test]
fn test_key_management() {
    let (db, mut con) = setup();
    run(&db, &mut con, &["MSET", "a", "1", "b", "2", "c", "3"]);
    assert_eq!(run(&db, &mut con, &["DEL", "a", "b", "ghost"]), int(2));
    assert_eq!(run(&db, &mut con, &["EXISTS", "c", "c", "ghost"]), int(2));
    assert_eq!(run(&db, &mut con, &["RENAME", "c", "d"]), Response::Okay);
    assert_eq!(
        run_err(&db, &mut con, &["RENAME", "ghost", "x"]),
        responses::ERR_NO_SUCH_KEY
    );
    run(&db, &mut con, &["SET", "e", "1"]);
    assert_eq!(run(&db, &mut con, &["RENAMENX", "d", "e"]), int(0));
    assert_eq!(run(&db, &mut con, &["RENAMENX", "d", "f"]), int(1));
    assert_eq!(
        run(&db, &mut con, &["TYPE", "f"]),
        Response::Simple("string".to_owned())
    );
    assert_eq!(run(&db, &mut con, &["DBSIZE"]), int(2));
    assert_eq!(run(&db, &mut con, &["FLUSHDB"]), Response::Okay);
    assert_eq!(run(&db, &mut con, &["DBSIZE"]), int(0));
}

#[test]
fn test_keys_glob_and_scan_pagination() {
    let (db, mut con) = setup();
    for key in ["user:1", "user:2", "user:3", "other"] {
        run(&db, &mut con, &["SET", key, "x"]);
    }
    match run(&db, &mut con, &["KEYS", "user:?"]) {
        Response::Array(items) => assert_eq!(items.len(), 3),
        other => panic!("expected array, got {:?}", other),
    }
    // drive the cursor until it returns 0
    let mut cursor = "0".to_owned();
    let mut seen = Vec::new();
    loop {
        let reply = run(&db, &mut con, &["SCAN", &cursor, "COUNT", "2"]);
        let (next, batch) = match reply {
            Response::Array(mut parts) => {
                let batch = parts.pop().unwrap();
                let next = parts.pop().unwrap();
                (next, batch)
            }
            other => panic!("expected array, got {:?}", other),
        };
        if let Response::Array(items) = batch {
            for item in items {
                if let Response::Bulk(d) = item {
                    seen.push(d);
                }
            }
        }
        match next {
            Response::Bulk(d) => {
                cursor = String::from_utf8_lossy(d.as_ref()).to_string();
            }
            other => panic!("expected bulk cursor, got {:?}", other),
        }
        if cursor == "0" {
            break;
        }
    }
    seen.sort_unstable();
    assert_eq!(seen.len(), 4);
    // MATCH filters the returned batch
    let reply = run(&db, &mut con, &["SCAN", "0", "MATCH", "user:*", "COUNT", "100"]);
    if let Response::Array(parts) = reply {
        if let Response::Array(items) = &parts[1] {
            assert_eq!(items.len(), 3);
        } else {
            panic!("bad scan shape");
        }
    }
}

#[test]
fn test_pexpire_keeps_millisecond_precision() {
    let (db, mut con) = setup();
    run(&db, &mut con, &["SET", "k", "v"]);
    assert_eq!(run(&db, &mut con, &["PEXPIRE", "k", "1500"]), int(1));
    match run(&db, &mut con, &["PTTL", "k"]) {
        Response::Integer(ms) => assert!(ms > 1000 && ms <= 1500, "pttl was {}", ms),
        other => panic!("expected integer, got {:?}", other),
    }
    assert_eq!(run(&db, &mut con, &["PERSIST", "k"]), int(1));
    assert_eq!(run(&db, &mut con, &["PTTL", "k"]), int(-1));
    // negative lifetime deletes immediately
    assert_eq!(run(&db, &mut con, &["EXPIRE", "k", "-1"]), int(1));
    assert_eq!(run(&db, &mut con, &["EXISTS", "k"]), int(0));
}

#[test]
fn test_server_commands() {
    let (db, mut con) = setup();
    assert_eq!(
        run(&db, &mut con, &["PING"]),
        Response::Simple("PONG".to_owned())
    );
    assert_eq!(run(&db, &mut con, &["PING", "hello"]), bulk("hello"));
    assert_eq!(run(&db, &mut con, &["ECHO", "echoed"]), bulk("echoed"));
    assert_eq!(run(&db, &mut con, &["SELECT", "0"]), Response::Okay);
    assert_eq!(
        run_err(&db, &mut con, &["SELECT", "99"]),
        responses::ERR_DB_INDEX
    );
    match run(&db, &mut con, &["INFO"]) {
        Response::Bulk(d) => {
            let text = String::from_utf8_lossy(d.as_ref()).to_string();
            assert!(text.contains("sable_version:"));
            assert!(text.contains("role:master"));
        }
        other => panic!("expected bulk, got {:?}", other),
    }
    // CONFIG GET with a glob
    match run(&db, &mut con, &["CONFIG", "GET", "max*"]) {
        Response::Array(items) => assert_eq!(items.len(), 4), // max_clients + maxmemory
        other => panic!("expected array, got {:?}", other),
    }
    assert_eq!(
        run(&db, &mut con, &["LASTSAVE"]),
        Response::Integer((db.last_save_ms() / 1000) as i64)
    );
    // QUIT flags the connection
    assert_eq!(run(&db, &mut con, &["QUIT"]), Response::Okay);
    assert!(con.quit);
}

#[test]
fn test_pubsub_acks_and_publish() {
    let db = Corestore::new(ConfigSet::default());
    // keep the receiving half alive so deliveries land somewhere
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut con = ClientContext::new(1, tx);
    let reply = run(&db, &mut con, &["SUBSCRIBE", "a", "b"]);
    match reply {
        Response::Multiple(frames) => {
            assert_eq!(frames.len(), 2);
            assert_eq!(
                frames[0],
                Response::Array(vec![bulk("subscribe"), bulk("a"), int(1)])
            );
            assert_eq!(
                frames[1],
                Response::Array(vec![bulk("subscribe"), bulk("b"), int(2)])
            );
        }
        other => panic!("expected multiple frames, got {:?}", other),
    }
    // a second client publishes
    let (db2, mut con2) = (db.clone(), {
        let (tx, _rx) = mpsc::unbounded_channel();
        ClientContext::new(2, tx)
    });
    assert_eq!(run(&db2, &mut con2, &["PUBLISH", "a", "msg"]), int(1));
    let delivered = rx.try_recv().unwrap();
    assert!(delivered.as_ref().starts_with(b"*3\r\n$7\r\nmessage\r\n"));
    assert_eq!(run(&db2, &mut con2, &["PUBLISH", "nosub", "msg"]), int(0));
    assert_eq!(
        run(&db2, &mut con2, &["PUBSUB", "NUMSUB", "a"]),
        Response::Array(vec![bulk("a"), int(1)])
    );
    assert_eq!(run(&db2, &mut con2, &["PUBSUB", "NUMPAT"]), int(0));
    // unsubscribe everything
    match run(&db, &mut con, &["UNSUBSCRIBE"]) {
        Response::Multiple(frames) => assert_eq!(frames.len(), 2),
        other => panic!("expected multiple frames, got {:?}", other),
    }
    assert_eq!(con.subscription_count(), 0);
}
