/*
 * Created on Tue May 25 2021
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

//! The hash engine: field -> value maps

use crate::actions::keys::{parse_cursor, scan_page, scan_reply};
use crate::actions::{err, fmt_f64, parse_f64, parse_i64, ActionError};
use crate::corestore::{glob_matches, Corestore, Data, Tag, Value};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::util;
use rand::seq::SliceRandom;
use rand::Rng;

action! {
    /// `HSET key field value [field value ...]`: returns the number of new
    /// fields (updates do not count)
    fn hset(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        if (act.len() - 1) % 2 != 0 {
            return err("ERR wrong number of arguments for 'hset' command");
        }
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let added = match ks.get_or_create(&act[0], Tag::Hash, now) {
            Some(Value::Hash(hash)) => {
                let mut added = 0;
                for pair in act[1..].chunks_exact(2) {
                    if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                added
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty((act.len() - 1) / 2);
        Ok(Response::Integer(added))
    }

    /// `HMSET key field value [field value ...]` (legacy alias, replies OK)
    fn hmset(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        if (act.len() - 1) % 2 != 0 {
            return err("ERR wrong number of arguments for 'hmset' command");
        }
        hset(handle, con, act).map(|_| Response::Okay)
    }

    /// `HSETNX key field value`
    fn hsetnx(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let added = match ks.get_or_create(&act[0], Tag::Hash, now) {
            Some(Value::Hash(hash)) => {
                if hash.contains_key(act[1].as_ref()) {
                    false
                } else {
                    hash.insert(act[1].clone(), act[2].clone());
                    true
                }
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        if added {
            handle.mark_dirty(1);
        }
        Ok(Response::Integer(added as i64))
    }

    /// `HGET key field`
    fn hget(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let value = get_typed!(ks, act[0], now, Hash)
            .and_then(|hash| hash.get(act[1].as_ref()).cloned());
        Ok(Response::bulk_or_null(value))
    }

    /// `HMGET key field [field ...]`
    fn hmget(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let hash = get_typed!(ks, act[0], now, Hash);
        let values = act[1..]
            .iter()
            .map(|field| {
                let value = hash.and_then(|h| h.get(field.as_ref()).cloned());
                Response::bulk_or_null(value)
            })
            .collect();
        Ok(Response::Array(values))
    }

    /// `HDEL key field [field ...]`
    fn hdel(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let removed = match get_typed_mut!(ks, act[0], now, Hash) {
            Some(hash) => act[1..]
                .iter()
                .filter(|field| hash.remove(field.as_ref()).is_some())
                .count(),
            None => 0,
        };
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(removed);
        Ok(Response::Integer(removed as i64))
    }

    /// `HEXISTS key field`
    fn hexists(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let exists = get_typed!(ks, act[0], now, Hash)
            .map(|hash| hash.contains_key(act[1].as_ref()))
            .unwrap_or(false);
        Ok(Response::Integer(exists as i64))
    }

    /// `HLEN key`
    fn hlen(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let len = get_typed!(ks, act[0], now, Hash).map(|h| h.len()).unwrap_or(0);
        Ok(Response::Integer(len as i64))
    }

    /// `HKEYS key`
    fn hkeys(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let fields = get_typed!(ks, act[0], now, Hash)
            .map(|hash| hash.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Response::str_array(fields))
    }

    /// `HVALS key`
    fn hvals(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let values = get_typed!(ks, act[0], now, Hash)
            .map(|hash| hash.values().cloned().collect())
            .unwrap_or_default();
        Ok(Response::str_array(values))
    }

    /// `HGETALL key`: a flat `[field, value, field, value, ...]` array
    fn hgetall(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let mut flat = Vec::new();
        if let Some(hash) = get_typed!(ks, act[0], now, Hash) {
            flat.reserve(hash.len() * 2);
            for (field, value) in hash {
                flat.push(Response::Bulk(field.clone()));
                flat.push(Response::Bulk(value.clone()));
            }
        }
        Ok(Response::Array(flat))
    }

    /// `HSTRLEN key field`
    fn hstrlen(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let len = get_typed!(ks, act[0], now, Hash)
            .and_then(|hash| hash.get(act[1].as_ref()))
            .map(|value| value.len())
            .unwrap_or(0);
        Ok(Response::Integer(len as i64))
    }

    /// `HINCRBY key field n`
    fn hincrby(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let delta = parse_i64(act[2].as_ref())?;
        let mut ks = handle.keyspace_mut();
        let new = match ks.get_or_create(&act[0], Tag::Hash, now) {
            Some(Value::Hash(hash)) => {
                let cur = match hash.get(act[1].as_ref()) {
                    Some(raw) => std::str::from_utf8(raw.as_ref())
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| ActionError::from(responses::ERR_HASH_NOT_INTEGER))?,
                    None => 0,
                };
                let new = cur
                    .checked_add(delta)
                    .ok_or_else(|| ActionError::from(responses::ERR_OVERFLOW))?;
                hash.insert(act[1].clone(), Data::from(new.to_string()));
                new
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(new))
    }

    /// `HINCRBYFLOAT key field f`
    fn hincrbyfloat(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let delta = parse_f64(act[2].as_ref(), responses::ERR_NOT_FLOAT)?;
        let mut ks = handle.keyspace_mut();
        let formatted = match ks.get_or_create(&act[0], Tag::Hash, now) {
            Some(Value::Hash(hash)) => {
                let cur = match hash.get(act[1].as_ref()) {
                    Some(raw) => parse_f64(raw.as_ref(), responses::ERR_HASH_NOT_FLOAT)?,
                    None => 0.0,
                };
                let new = cur + delta;
                if !new.is_finite() {
                    return err(responses::ERR_FLOAT_NAN_OR_INF);
                }
                let formatted = fmt_f64(new);
                hash.insert(act[1].clone(), Data::from(formatted.as_str()));
                formatted
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Bulk(Data::from(formatted)))
    }

    /// `HRANDFIELD key [count [WITHVALUES]]`: a positive count samples
    /// without replacement, a negative one with replacement
    fn hrandfield(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let count = match act.get(1) {
            Some(raw) => Some(parse_i64(raw.as_ref())?),
            None => None,
        };
        let withvalues = match act.get(2) {
            Some(raw) => {
                if raw.to_ascii_uppercase().as_slice() == b"WITHVALUES" {
                    true
                } else {
                    return err(responses::ERR_SYNTAX);
                }
            }
            None => false,
        };
        let ks = handle.keyspace();
        let hash = match get_typed!(ks, act[0], now, Hash) {
            Some(hash) => hash,
            None => {
                return Ok(match count {
                    Some(_) => Response::Array(Vec::new()),
                    None => Response::NullBulk,
                })
            }
        };
        let pool: Vec<(&Data, &Data)> = hash.iter().collect();
        let mut rng = rand::thread_rng();
        let picks: Vec<(&Data, &Data)> = match count {
            None => {
                let pick = pool[rng.gen_range(0..pool.len())];
                return Ok(Response::Bulk(pick.0.clone()));
            }
            Some(count) if count >= 0 => pool
                .choose_multiple(&mut rng, count as usize)
                .copied()
                .collect(),
            Some(count) => (0..count.unsigned_abs() as usize)
                .map(|_| pool[rng.gen_range(0..pool.len())])
                .collect(),
        };
        let mut out = Vec::with_capacity(picks.len() * 2);
        for (field, value) in picks {
            out.push(Response::Bulk(field.clone()));
            if withvalues {
                out.push(Response::Bulk(value.clone()));
            }
        }
        Ok(Response::Array(out))
    }

    /// `HSCAN key cursor [MATCH pattern] [COUNT n] [NOVALUES]`
    fn hscan(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let cursor = parse_cursor(&act[1])?;
        let mut pattern: Option<Data> = None;
        let mut count = 10usize;
        let mut novalues = false;
        let mut i = 2;
        while i < act.len() {
            match act[i].to_ascii_uppercase().as_slice() {
                b"MATCH" => {
                    i += 1;
                    match act.get(i) {
                        Some(p) => pattern = Some(p.clone()),
                        None => return err(responses::ERR_SYNTAX),
                    }
                }
                b"COUNT" => {
                    i += 1;
                    let parsed = match act.get(i) {
                        Some(raw) => parse_i64(raw.as_ref())?,
                        None => return err(responses::ERR_SYNTAX),
                    };
                    if parsed < 1 {
                        return err(responses::ERR_SYNTAX);
                    }
                    count = parsed as usize;
                }
                b"NOVALUES" => novalues = true,
                _ => return err(responses::ERR_SYNTAX),
            }
            i += 1;
        }
        let ks = handle.keyspace();
        let mut fields: Vec<(Data, Data)> = get_typed!(ks, act[0], now, Hash)
            .map(|hash| hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default();
        drop(ks);
        fields.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let (next, batch) = scan_page(fields, cursor, count, |(field, _)| match &pattern {
            Some(pattern) => glob_matches(pattern.as_ref(), field.as_ref()),
            None => true,
        });
        let mut flat = Vec::with_capacity(batch.len() * 2);
        for (field, value) in batch {
            flat.push(Response::Bulk(field));
            if !novalues {
                flat.push(Response::Bulk(value));
            }
        }
        Ok(scan_reply(next, flat))
    }
}
