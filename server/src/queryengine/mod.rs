/*
 * Created on Tue Jul 13 2021
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

//! # The Query Engine
//!
//! One registry maps the uppercased command name to its handler, arity
//! bounds and a short description. Execution per frame: look the name up,
//! validate the argument count, apply the subscriber-mode gate, invoke.
//! Handlers never see the socket; they only see the store and the client
//! state.

use crate::actions::{self, err, ActionResult};
use crate::admin::{mksnap, sys};
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::ClientContext;
use crate::resp::Response;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// The canonical handler signature
pub type HandlerFn = fn(&Corestore, &mut ClientContext, &[Data]) -> ActionResult<Response>;

/// One registry row. `max_args == -1` means unbounded. Arities exclude the
/// command name itself
pub struct CommandSpec {
    pub handler: HandlerFn,
    pub min_args: usize,
    pub max_args: i64,
    pub description: &'static str,
}

/// The only commands a connection in subscriber mode may run
const SUBSCRIBER_ALLOWED: [&str; 6] = [
    "SUBSCRIBE",
    "UNSUBSCRIBE",
    "PSUBSCRIBE",
    "PUNSUBSCRIBE",
    "PING",
    "QUIT",
];

macro_rules! registry {
    ($($name:literal => ($handler:path, $min:expr, $max:expr, $desc:literal)),* $(,)?) => {{
        let mut table: HashMap<&'static str, CommandSpec> = HashMap::new();
        $(
            table.insert($name, CommandSpec {
                handler: $handler,
                min_args: $min,
                max_args: $max,
                description: $desc,
            });
        )*
        table
    }};
}

lazy_static! {
    static ref COMMANDS: HashMap<&'static str, CommandSpec> = registry! {
        // connection & server
        "PING" => (sys::ping, 0, 1, "Test the connection"),
        "ECHO" => (sys::echo, 1, 1, "Echo the given string"),
        "QUIT" => (sys::quit, 0, 0, "Close the connection"),
        "SELECT" => (sys::select, 1, 1, "Select a logical database"),
        "DBSIZE" => (sys::dbsize, 0, 0, "Number of keys in the keyspace"),
        "FLUSHDB" => (sys::flushdb, 0, 1, "Remove all keys"),
        "FLUSHALL" => (sys::flushall, 0, 1, "Remove all keys in all databases"),
        "INFO" => (sys::info, 0, -1, "Server information and statistics"),
        "TIME" => (sys::time, 0, 0, "The server time"),
        "CONFIG" => (sys::config, 1, -1, "Read or rewrite configuration parameters"),
        "COMMAND" => (sys::command, 0, -1, "Details about the command table"),
        "CLIENT" => (sys::client, 1, -1, "Client connection management"),
        "DEBUG" => (sys::debug, 1, -1, "Debugging helpers"),
        "MEMORY" => (sys::memory, 1, -1, "Memory introspection"),
        "OBJECT" => (sys::object, 1, -1, "Inspect value internals"),
        "SHUTDOWN" => (sys::shutdown, 0, 1, "Shut the server down"),
        "SAVE" => (mksnap::save, 0, 0, "Synchronously snapshot the keyspace to disk"),
        "BGSAVE" => (mksnap::bgsave, 0, 1, "Snapshot the keyspace in the background"),
        "LASTSAVE" => (mksnap::lastsave, 0, 0, "Unix time of the last successful save"),
        // key management
        "DEL" => (actions::keys::del, 1, -1, "Delete keys"),
        "UNLINK" => (actions::keys::del, 1, -1, "Delete keys (lazy-free variant)"),
        "EXISTS" => (actions::keys::exists, 1, -1, "Count how many of the given keys exist"),
        "TOUCH" => (actions::keys::exists, 1, -1, "Touch keys, reporting how many exist"),
        "TYPE" => (actions::keys::type_of, 1, 1, "Type of the value stored at a key"),
        "KEYS" => (actions::keys::keys, 0, 1, "Keys matching a glob pattern"),
        "SCAN" => (actions::keys::scan, 1, -1, "Incrementally iterate the keyspace"),
        "RENAME" => (actions::keys::rename, 2, 2, "Rename a key"),
        "RENAMENX" => (actions::keys::renamenx, 2, 2, "Rename a key unless the target exists"),
        "RANDOMKEY" => (actions::keys::randomkey, 0, 0, "A random key"),
        "EXPIRE" => (actions::keys::expire, 2, 2, "Set a key's time to live in seconds"),
        "PEXPIRE" => (actions::keys::pexpire, 2, 2, "Set a key's time to live in milliseconds"),
        "EXPIREAT" => (actions::keys::expireat, 2, 2, "Expire at a unix timestamp"),
        "PEXPIREAT" => (actions::keys::pexpireat, 2, 2, "Expire at a unix timestamp in ms"),
        "TTL" => (actions::keys::ttl, 1, 1, "Remaining time to live in seconds"),
        "PTTL" => (actions::keys::pttl, 1, 1, "Remaining time to live in milliseconds"),
        "PERSIST" => (actions::keys::persist, 1, 1, "Drop a key's expiration"),
        // strings
        "SET" => (actions::strings::set, 2, -1, "Set a key to a string value"),
        "GET" => (actions::strings::get, 1, 1, "Value of a string key"),
        "GETDEL" => (actions::strings::getdel, 1, 1, "Get and delete"),
        "GETSET" => (actions::strings::getset, 2, 2, "Set and return the old value"),
        "GETEX" => (actions::strings::getex, 1, 3, "Get with a TTL side effect"),
        "APPEND" => (actions::strings::append, 2, 2, "Append to a string"),
        "STRLEN" => (actions::strings::strlen, 1, 1, "Length of a string value"),
        "GETRANGE" => (actions::strings::getrange, 3, 3, "Substring by inclusive offsets"),
        "SUBSTR" => (actions::strings::getrange, 3, 3, "Deprecated alias of GETRANGE"),
        "SETRANGE" => (actions::strings::setrange, 3, 3, "Overwrite part of a string"),
        "INCR" => (actions::strings::incr, 1, 1, "Increment the integer value by one"),
        "DECR" => (actions::strings::decr, 1, 1, "Decrement the integer value by one"),
        "INCRBY" => (actions::strings::incrby, 2, 2, "Increment by the given amount"),
        "DECRBY" => (actions::strings::decrby, 2, 2, "Decrement by the given amount"),
        "INCRBYFLOAT" => (actions::strings::incrbyfloat, 2, 2, "Increment by a float"),
        "MGET" => (actions::strings::mget, 1, -1, "Values of multiple keys"),
        "MSET" => (actions::strings::mset, 2, -1, "Set multiple keys"),
        "MSETNX" => (actions::strings::msetnx, 2, -1, "Set multiple keys, all or nothing"),
        "SETNX" => (actions::strings::setnx, 2, 2, "Set unless the key exists"),
        "SETEX" => (actions::strings::setex, 3, 3, "Set with a TTL in seconds"),
        "PSETEX" => (actions::strings::psetex, 3, 3, "Set with a TTL in milliseconds"),
        // lists
        "LPUSH" => (actions::lists::lpush, 2, -1, "Prepend elements to a list"),
        "RPUSH" => (actions::lists::rpush, 2, -1, "Append elements to a list"),
        "LPUSHX" => (actions::lists::lpushx, 2, -1, "Prepend only if the list exists"),
        "RPUSHX" => (actions::lists::rpushx, 2, -1, "Append only if the list exists"),
        "LPOP" => (actions::lists::lpop, 1, 2, "Pop from the head"),
        "RPOP" => (actions::lists::rpop, 1, 2, "Pop from the tail"),
        "LLEN" => (actions::lists::llen, 1, 1, "Length of a list"),
        "LRANGE" => (actions::lists::lrange, 3, 3, "Elements within inclusive offsets"),
        "LINDEX" => (actions::lists::lindex, 2, 2, "Element at an index"),
        "LSET" => (actions::lists::lset, 3, 3, "Replace the element at an index"),
        "LINSERT" => (actions::lists::linsert, 4, 4, "Insert before or after a pivot"),
        "LREM" => (actions::lists::lrem, 3, 3, "Remove matching elements"),
        "LTRIM" => (actions::lists::ltrim, 3, 3, "Trim to the given range"),
        "RPOPLPUSH" => (actions::lists::rpoplpush, 2, 2, "Atomically rotate between lists"),
        "LMOVE" => (actions::lists::lmove, 4, 4, "Atomically move an element between lists"),
        "LPOS" => (actions::lists::lpos, 2, -1, "Index of matching elements"),
        "BLPOP" => (actions::lists::blpop, 2, -1, "LPOP, degraded non-blocking variant"),
        "BRPOP" => (actions::lists::brpop, 2, -1, "RPOP, degraded non-blocking variant"),
        "BRPOPLPUSH" => (actions::lists::brpoplpush, 3, 3, "RPOPLPUSH, degraded variant"),
        "BLMOVE" => (actions::lists::blmove, 5, 5, "LMOVE, degraded non-blocking variant"),
        // hashes
        "HSET" => (actions::hashes::hset, 3, -1, "Set hash fields"),
        "HMSET" => (actions::hashes::hmset, 3, -1, "Deprecated multi-field set"),
        "HSETNX" => (actions::hashes::hsetnx, 3, 3, "Set a field unless it exists"),
        "HGET" => (actions::hashes::hget, 2, 2, "Value of a hash field"),
        "HMGET" => (actions::hashes::hmget, 2, -1, "Values of multiple hash fields"),
        "HDEL" => (actions::hashes::hdel, 2, -1, "Delete hash fields"),
        "HEXISTS" => (actions::hashes::hexists, 2, 2, "Does a field exist?"),
        "HLEN" => (actions::hashes::hlen, 1, 1, "Number of fields"),
        "HKEYS" => (actions::hashes::hkeys, 1, 1, "All field names"),
        "HVALS" => (actions::hashes::hvals, 1, 1, "All field values"),
        "HGETALL" => (actions::hashes::hgetall, 1, 1, "All fields and values, flattened"),
        "HSTRLEN" => (actions::hashes::hstrlen, 2, 2, "Length of a field's value"),
        "HINCRBY" => (actions::hashes::hincrby, 3, 3, "Increment an integer field"),
        "HINCRBYFLOAT" => (actions::hashes::hincrbyfloat, 3, 3, "Increment a float field"),
        "HRANDFIELD" => (actions::hashes::hrandfield, 1, 3, "Random fields"),
        "HSCAN" => (actions::hashes::hscan, 2, -1, "Incrementally iterate a hash"),
        // sets
        "SADD" => (actions::sets::sadd, 2, -1, "Add members to a set"),
        "SREM" => (actions::sets::srem, 2, -1, "Remove members from a set"),
        "SISMEMBER" => (actions::sets::sismember, 2, 2, "Is the member in the set?"),
        "SMISMEMBER" => (actions::sets::smismember, 2, -1, "Membership of multiple members"),
        "SMEMBERS" => (actions::sets::smembers, 1, 1, "All members"),
        "SCARD" => (actions::sets::scard, 1, 1, "Cardinality of a set"),
        "SMOVE" => (actions::sets::smove, 3, 3, "Atomically move a member between sets"),
        "SPOP" => (actions::sets::spop, 1, 2, "Remove random members"),
        "SRANDMEMBER" => (actions::sets::srandmember, 1, 2, "Random members, non-destructive"),
        "SUNION" => (actions::sets::sunion, 1, -1, "Union of sets"),
        "SINTER" => (actions::sets::sinter, 1, -1, "Intersection of sets"),
        "SDIFF" => (actions::sets::sdiff, 1, -1, "Difference of sets"),
        "SUNIONSTORE" => (actions::sets::sunionstore, 2, -1, "Union stored at a destination"),
        "SINTERSTORE" => (actions::sets::sinterstore, 2, -1, "Intersection stored at a destination"),
        "SDIFFSTORE" => (actions::sets::sdiffstore, 2, -1, "Difference stored at a destination"),
        "SINTERCARD" => (actions::sets::sintercard, 2, -1, "Intersection cardinality"),
        "SSCAN" => (actions::sets::sscan, 2, -1, "Incrementally iterate a set"),
        // sorted sets
        "ZADD" => (actions::zsets::zadd, 3, -1, "Add members with scores"),
        "ZREM" => (actions::zsets::zrem, 2, -1, "Remove members"),
        "ZSCORE" => (actions::zsets::zscore, 2, 2, "Score of a member"),
        "ZMSCORE" => (actions::zsets::zmscore, 2, -1, "Scores of multiple members"),
        "ZCARD" => (actions::zsets::zcard, 1, 1, "Cardinality of a sorted set"),
        "ZCOUNT" => (actions::zsets::zcount, 3, 3, "Members within a score range"),
        "ZINCRBY" => (actions::zsets::zincrby, 3, 3, "Increment a member's score"),
        "ZRANK" => (actions::zsets::zrank, 2, 3, "Ascending rank of a member"),
        "ZREVRANK" => (actions::zsets::zrevrank, 2, 3, "Descending rank of a member"),
        "ZRANGE" => (actions::zsets::zrange, 3, -1, "Unified range query"),
        "ZREVRANGE" => (actions::zsets::zrevrange, 3, 4, "Range by rank, high to low"),
        "ZRANGEBYSCORE" => (actions::zsets::zrangebyscore, 3, -1, "Range by score"),
        "ZREVRANGEBYSCORE" => (actions::zsets::zrevrangebyscore, 3, -1, "Range by score, reversed"),
        "ZRANGEBYLEX" => (actions::zsets::zrangebylex, 3, -1, "Lexicographical range"),
        "ZREVRANGEBYLEX" => (actions::zsets::zrevrangebylex, 3, -1, "Lexicographical range, reversed"),
        "ZPOPMIN" => (actions::zsets::zpopmin, 1, 2, "Pop the lowest scored members"),
        "ZPOPMAX" => (actions::zsets::zpopmax, 1, 2, "Pop the highest scored members"),
        "BZPOPMIN" => (actions::zsets::bzpopmin, 2, -1, "ZPOPMIN, degraded non-blocking variant"),
        "BZPOPMAX" => (actions::zsets::bzpopmax, 2, -1, "ZPOPMAX, degraded non-blocking variant"),
        "ZRANGESTORE" => (actions::zsets::zrangestore, 4, -1, "Store a range at a destination"),
        "ZSCAN" => (actions::zsets::zscan, 2, -1, "Incrementally iterate a sorted set"),
        // pub/sub
        "SUBSCRIBE" => (actions::pubsub::subscribe, 1, -1, "Subscribe to channels"),
        "UNSUBSCRIBE" => (actions::pubsub::unsubscribe, 0, -1, "Unsubscribe from channels"),
        "PSUBSCRIBE" => (actions::pubsub::psubscribe, 1, -1, "Subscribe to patterns"),
        "PUNSUBSCRIBE" => (actions::pubsub::punsubscribe, 0, -1, "Unsubscribe from patterns"),
        "PUBLISH" => (actions::pubsub::publish, 2, 2, "Publish a message to a channel"),
        "PUBSUB" => (actions::pubsub::pubsub, 1, -1, "Introspect the pub/sub state"),
    };
}

/// Execute one parsed command frame against the store
pub fn execute(
    db: &Corestore,
    con: &mut ClientContext,
    cmd: Vec<Data>,
) -> ActionResult<Response> {
    if cmd.is_empty() {
        return err("ERR empty command");
    }
    db.incr_commands_processed();
    let name = String::from_utf8_lossy(cmd[0].as_ref()).to_uppercase();
    let spec = match COMMANDS.get(name.as_str()) {
        Some(spec) => spec,
        None => {
            return err(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(cmd[0].as_ref())
            ))
        }
    };
    let argc = cmd.len() - 1;
    if argc < spec.min_args || (spec.max_args >= 0 && argc as i64 > spec.max_args) {
        return err(format!(
            "ERR wrong number of arguments for '{}' command",
            name.to_lowercase()
        ));
    }
    if con.in_subscriber_mode() && !SUBSCRIBER_ALLOWED.contains(&name.as_str()) {
        return err(format!(
            "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context",
            name.to_lowercase()
        ));
    }
    (spec.handler)(db, con, &cmd[1..])
}

/// All registered command names in sorted order (`COMMAND LIST`)
pub fn command_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = COMMANDS.keys().copied().collect();
    names.sort_unstable();
    names
}

pub fn command_count() -> usize {
    COMMANDS.len()
}

/// A command's one-line description, if it is registered
pub fn describe(name: &str) -> Option<&'static str> {
    COMMANDS.get(name).map(|spec| spec.description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSet;
    use tokio::sync::mpsc;

    fn setup() -> (Corestore, ClientContext) {
        let (tx, _rx) = mpsc::unbounded_channel();
        (
            Corestore::new(ConfigSet::default()),
            ClientContext::new(1, tx),
        )
    }

    fn run(db: &Corestore, con: &mut ClientContext, parts: &[&str]) -> ActionResult<Response> {
        execute(db, con, parts.iter().map(|p| Data::from(*p)).collect())
    }

    #[test]
    fn test_unknown_command() {
        let (db, mut con) = setup();
        let ret = run(&db, &mut con, &["FROBNICATE", "x"]).unwrap_err();
        assert_eq!(
            ret,
            crate::actions::ActionError::ActionError("ERR unknown command 'FROBNICATE'".to_owned())
        );
    }

    #[test]
    fn test_arity_validation() {
        let (db, mut con) = setup();
        let ret = run(&db, &mut con, &["GET"]).unwrap_err();
        assert_eq!(
            ret,
            crate::actions::ActionError::ActionError(
                "ERR wrong number of arguments for 'get' command".to_owned()
            )
        );
        let ret = run(&db, &mut con, &["GET", "a", "b"]).unwrap_err();
        assert_eq!(
            ret,
            crate::actions::ActionError::ActionError(
                "ERR wrong number of arguments for 'get' command".to_owned()
            )
        );
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let (db, mut con) = setup();
        assert_eq!(run(&db, &mut con, &["set", "k", "v"]).unwrap(), Response::Okay);
        assert_eq!(
            run(&db, &mut con, &["GeT", "k"]).unwrap(),
            Response::Bulk(Data::from("v"))
        );
    }

    #[test]
    fn test_subscriber_mode_gate() {
        let (db, mut con) = setup();
        run(&db, &mut con, &["SUBSCRIBE", "news"]).unwrap();
        assert!(run(&db, &mut con, &["SET", "k", "v"]).is_err());
        // PING stays allowed
        assert!(run(&db, &mut con, &["PING"]).is_ok());
        run(&db, &mut con, &["UNSUBSCRIBE"]).unwrap();
        assert!(run(&db, &mut con, &["SET", "k", "v"]).is_ok());
    }

    #[test]
    fn test_registry_is_populated() {
        assert!(command_count() > 100);
        assert!(command_names().contains(&"ZADD"));
        assert!(describe("SET").is_some());
    }
}
