/*
 * Created on Fri May 21 2021
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

//! Key management: lifecycle, TTLs and keyspace iteration

use crate::actions::{err, parse_i64, ActionResult};
use crate::corestore::{glob_matches, Corestore, Data, TtlState};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::util;

/// Default `SCAN` batch size
const SCAN_DEFAULT_COUNT: usize = 10;

/// Parsed `[MATCH pattern] [COUNT n]` tail shared by the whole `SCAN`
/// family
pub(super) struct ScanOpts {
    pub pattern: Option<Data>,
    pub count: usize,
}

pub(super) fn parse_cursor(raw: &Data) -> ActionResult<usize> {
    match std::str::from_utf8(raw.as_ref())
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        Some(cursor) => Ok(cursor as usize),
        None => err("ERR invalid cursor"),
    }
}

pub(super) fn parse_scan_opts(rest: &[Data]) -> ActionResult<ScanOpts> {
    let mut opts = ScanOpts {
        pattern: None,
        count: SCAN_DEFAULT_COUNT,
    };
    let mut i = 0;
    while i < rest.len() {
        let opt = rest[i].to_ascii_uppercase();
        match opt.as_slice() {
            b"MATCH" => {
                i += 1;
                match rest.get(i) {
                    Some(pattern) => opts.pattern = Some(pattern.clone()),
                    None => return err(responses::ERR_SYNTAX),
                }
            }
            b"COUNT" => {
                i += 1;
                let count = match rest.get(i) {
                    Some(raw) => parse_i64(raw.as_ref())?,
                    None => return err(responses::ERR_SYNTAX),
                };
                if count < 1 {
                    return err(responses::ERR_SYNTAX);
                }
                opts.count = count as usize;
            }
            _ => return err(responses::ERR_SYNTAX),
        }
        i += 1;
    }
    Ok(opts)
}

/// Page over a sorted item snapshot: the cursor is a plain offset, `0`
/// terminates the iteration. The `MATCH` filter applies to the returned
/// batch, so a batch may come back smaller than `COUNT`
pub(super) fn scan_page<T, F>(
    items: Vec<T>,
    cursor: usize,
    count: usize,
    mut keep: F,
) -> (usize, Vec<T>)
where
    F: FnMut(&T) -> bool,
{
    let total = items.len();
    let end = cursor.saturating_add(count).min(total);
    let next = if end >= total { 0 } else { end };
    let batch = items
        .into_iter()
        .skip(cursor)
        .take(count)
        .filter(|item| keep(item))
        .collect();
    (next, batch)
}

pub(super) fn scan_reply(next: usize, batch: Vec<Response>) -> Response {
    Response::Array(vec![
        Response::Bulk(Data::from(next.to_string())),
        Response::Array(batch),
    ])
}

action! {
    /// `DEL key [key ...]`
    fn del(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let removed = act
            .iter()
            .filter(|key| ks.remove(key.as_ref(), now).is_some())
            .count();
        drop(ks);
        handle.mark_dirty(removed);
        Ok(Response::Integer(removed as i64))
    }

    /// `EXISTS key [key ...]`: keys are counted as often as they appear
    fn exists(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let count = act
            .iter()
            .filter(|key| ks.contains(key.as_ref(), now))
            .count();
        Ok(Response::Integer(count as i64))
    }

    /// `TYPE key`
    fn type_of(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let name = ks.type_name(act[0].as_ref(), now).unwrap_or("none");
        Ok(Response::Simple(name.to_owned()))
    }

    /// `KEYS [pattern]`
    fn keys(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let pattern: &[u8] = act.first().map(|p| p.as_ref()).unwrap_or(b"*");
        let ks = handle.keyspace();
        Ok(Response::str_array(ks.keys_matching(pattern, now)))
    }

    /// `SCAN cursor [MATCH pattern] [COUNT n]`
    fn scan(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let cursor = parse_cursor(&act[0])?;
        let opts = parse_scan_opts(&act[1..])?;
        let ks = handle.keyspace();
        let keys = ks.sorted_keys(now);
        drop(ks);
        let (next, batch) = scan_page(keys, cursor, opts.count, |key| match &opts.pattern {
            Some(pattern) => glob_matches(pattern.as_ref(), key.as_ref()),
            None => true,
        });
        Ok(scan_reply(
            next,
            batch.into_iter().map(Response::Bulk).collect(),
        ))
    }

    /// `RENAME key newkey`: carries value and TTL
    fn rename(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        if !ks.rename(act[0].as_ref(), act[1].clone(), now) {
            return err(responses::ERR_NO_SUCH_KEY);
        }
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Okay)
    }

    /// `RENAMENX key newkey`
    fn renamenx(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        if ks.contains(act[1].as_ref(), now) {
            return Ok(Response::Integer(0));
        }
        if !ks.rename(act[0].as_ref(), act[1].clone(), now) {
            return err(responses::ERR_NO_SUCH_KEY);
        }
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(1))
    }

    /// `RANDOMKEY`
    fn randomkey(handle: &Corestore, _con: &mut ClientContext, _act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        Ok(Response::bulk_or_null(ks.random_key(now)))
    }

    /// `EXPIRE key seconds`
    fn expire(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let lifetime = parse_i64(act[1].as_ref())?;
        set_relative_expiry(handle, &act[0], lifetime, 1000)
    }

    /// `PEXPIRE key milliseconds` (millisecond precision is kept, never
    /// rounded to seconds)
    fn pexpire(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let lifetime = parse_i64(act[1].as_ref())?;
        set_relative_expiry(handle, &act[0], lifetime, 1)
    }

    /// `EXPIREAT key unix-seconds`
    fn expireat(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let at = parse_i64(act[1].as_ref())?;
        set_absolute_expiry(handle, &act[0], at.saturating_mul(1000))
    }

    /// `PEXPIREAT key unix-milliseconds`
    fn pexpireat(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let at = parse_i64(act[1].as_ref())?;
        set_absolute_expiry(handle, &act[0], at)
    }

    /// `TTL key`: remaining seconds, -1 without expiry, -2 if missing
    fn ttl(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let reply = match ks.ttl_ms(act[0].as_ref(), now) {
            TtlState::Missing => -2,
            TtlState::NoExpiry => -1,
            // round up so a freshly set `EX 1` reads back as 1
            TtlState::Remaining(ms) => ((ms + 999) / 1000) as i64,
        };
        Ok(Response::Integer(reply))
    }

    /// `PTTL key`
    fn pttl(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let reply = match ks.ttl_ms(act[0].as_ref(), now) {
            TtlState::Missing => -2,
            TtlState::NoExpiry => -1,
            TtlState::Remaining(ms) => ms as i64,
        };
        Ok(Response::Integer(reply))
    }

    /// `PERSIST key`
    fn persist(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let dropped = ks.persist(act[0].as_ref(), now);
        drop(ks);
        if dropped {
            handle.mark_dirty(1);
        }
        Ok(Response::Integer(dropped as i64))
    }
}

fn set_relative_expiry(
    handle: &Corestore,
    key: &Data,
    lifetime: i64,
    unit_ms: i64,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let at = (now as i64).saturating_add(lifetime.saturating_mul(unit_ms));
    set_absolute_expiry_at(handle, key, at, now)
}

fn set_absolute_expiry(handle: &Corestore, key: &Data, at_ms: i64) -> ActionResult<Response> {
    let now = util::time_now_ms();
    set_absolute_expiry_at(handle, key, at_ms, now)
}

fn set_absolute_expiry_at(
    handle: &Corestore,
    key: &Data,
    at_ms: i64,
    now: u64,
) -> ActionResult<Response> {
    let at_ms = at_ms.max(0) as u64;
    let mut ks = handle.keyspace_mut();
    let applied = ks.expire_at(key.as_ref(), at_ms, now);
    drop(ks);
    if applied {
        handle.mark_dirty(1);
    }
    Ok(Response::Integer(applied as i64))
}
