/*
 * Created on Thu May 27 2021
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

//! The set engine: unordered collections of unique byte strings

use crate::actions::keys::{parse_cursor, parse_scan_opts, scan_page, scan_reply};
use crate::actions::{err, parse_i64, ActionResult};
use crate::corestore::{glob_matches, Corestore, Data, Keyspace, Tag, Value};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::util;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// What to build out of the gathered input sets
#[derive(Clone, Copy, PartialEq)]
enum Algebra {
    Union,
    Intersection,
    Difference,
}

action! {
    /// `SADD key member [member ...]`
    fn sadd(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let added = match ks.get_or_create(&act[0], Tag::Set, now) {
            Some(Value::Set(set)) => act[1..]
                .iter()
                .filter(|member| set.insert((*member).clone()))
                .count(),
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty(added);
        Ok(Response::Integer(added as i64))
    }

    /// `SREM key member [member ...]`
    fn srem(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let removed = match get_typed_mut!(ks, act[0], now, Set) {
            Some(set) => act[1..]
                .iter()
                .filter(|member| set.remove(member.as_ref()))
                .count(),
            None => 0,
        };
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(removed);
        Ok(Response::Integer(removed as i64))
    }

    /// `SISMEMBER key member`
    fn sismember(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let hit = get_typed!(ks, act[0], now, Set)
            .map(|set| set.contains(act[1].as_ref()))
            .unwrap_or(false);
        Ok(Response::Integer(hit as i64))
    }

    /// `SMISMEMBER key member [member ...]`: an array of 0/1
    fn smismember(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let set = get_typed!(ks, act[0], now, Set);
        let hits = act[1..]
            .iter()
            .map(|member| {
                let hit = set.map(|s| s.contains(member.as_ref())).unwrap_or(false);
                Response::Integer(hit as i64)
            })
            .collect();
        Ok(Response::Array(hits))
    }

    /// `SMEMBERS key`
    fn smembers(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let members = get_typed!(ks, act[0], now, Set)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        Ok(Response::str_array(members))
    }

    /// `SCARD key`
    fn scard(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let card = get_typed!(ks, act[0], now, Set).map(|s| s.len()).unwrap_or(0);
        Ok(Response::Integer(card as i64))
    }

    /// `SMOVE source destination member`: atomic across both sides
    fn smove(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        match ks.get(act[0].as_ref(), now) {
            None => return Ok(Response::Integer(0)),
            Some(Value::Set(_)) => {}
            Some(_) => return err(responses::WRONGTYPE_ERR),
        }
        match ks.get(act[1].as_ref(), now) {
            None | Some(Value::Set(_)) => {}
            Some(_) => return err(responses::WRONGTYPE_ERR),
        }
        let moved = match ks.get_mut(act[0].as_ref(), now).and_then(Value::as_set_mut) {
            Some(set) => set.remove(act[2].as_ref()),
            None => false,
        };
        if !moved {
            return Ok(Response::Integer(0));
        }
        ks.remove_if_drained(act[0].as_ref());
        match ks.get_or_create(&act[1], Tag::Set, now) {
            Some(Value::Set(set)) => {
                set.insert(act[2].clone());
            }
            _ => return err(responses::WRONGTYPE_ERR),
        }
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(1))
    }

    /// `SPOP key [count]`: random removal
    fn spop(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let count = match act.get(1) {
            Some(raw) => {
                let count = parse_i64(raw.as_ref())?;
                if count < 0 {
                    return err(responses::ERR_VALUE_MUST_BE_POSITIVE);
                }
                Some(count as usize)
            }
            None => None,
        };
        let mut ks = handle.keyspace_mut();
        let set = match get_typed_mut!(ks, act[0], now, Set) {
            Some(set) => set,
            None => {
                return Ok(match count {
                    Some(_) => Response::Array(Vec::new()),
                    None => Response::NullBulk,
                })
            }
        };
        let take = count.unwrap_or(1).min(set.len());
        let mut rng = rand::thread_rng();
        let pool: Vec<Data> = set.iter().cloned().collect();
        let victims: Vec<Data> = pool.choose_multiple(&mut rng, take).cloned().collect();
        for victim in &victims {
            set.remove(victim.as_ref());
        }
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(victims.len());
        Ok(match count {
            Some(_) => Response::str_array(victims),
            None => Response::bulk_or_null(victims.into_iter().next()),
        })
    }

    /// `SRANDMEMBER key [count]`: like `SPOP` but non-destructive; a
    /// negative count samples with replacement
    fn srandmember(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let count = match act.get(1) {
            Some(raw) => Some(parse_i64(raw.as_ref())?),
            None => None,
        };
        let ks = handle.keyspace();
        let set = match get_typed!(ks, act[0], now, Set) {
            Some(set) => set,
            None => {
                return Ok(match count {
                    Some(_) => Response::Array(Vec::new()),
                    None => Response::NullBulk,
                })
            }
        };
        let pool: Vec<&Data> = set.iter().collect();
        let mut rng = rand::thread_rng();
        match count {
            None => Ok(Response::Bulk(pool[rng.gen_range(0..pool.len())].clone())),
            Some(count) if count >= 0 => {
                let picks = pool
                    .choose_multiple(&mut rng, count as usize)
                    .map(|member| Response::Bulk((*member).clone()))
                    .collect();
                Ok(Response::Array(picks))
            }
            Some(count) => {
                let picks = (0..count.unsigned_abs() as usize)
                    .map(|_| Response::Bulk(pool[rng.gen_range(0..pool.len())].clone()))
                    .collect();
                Ok(Response::Array(picks))
            }
        }
    }

    /// `SUNION key [key ...]`
    fn sunion(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let result = combine(&ks, act, now, Algebra::Union)?;
        Ok(Response::str_array(result.into_iter().collect()))
    }

    /// `SINTER key [key ...]`
    fn sinter(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let result = combine(&ks, act, now, Algebra::Intersection)?;
        Ok(Response::str_array(result.into_iter().collect()))
    }

    /// `SDIFF key [key ...]`
    fn sdiff(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let result = combine(&ks, act, now, Algebra::Difference)?;
        Ok(Response::str_array(result.into_iter().collect()))
    }

    /// `SUNIONSTORE destination key [key ...]`
    fn sunionstore(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        combine_store(handle, act, Algebra::Union)
    }

    /// `SINTERSTORE destination key [key ...]`
    fn sinterstore(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        combine_store(handle, act, Algebra::Intersection)
    }

    /// `SDIFFSTORE destination key [key ...]`
    fn sdiffstore(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        combine_store(handle, act, Algebra::Difference)
    }

    /// `SINTERCARD numkeys key [key ...] [LIMIT n]`: intersection size,
    /// optionally short-circuited once the cap is reached
    fn sintercard(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let numkeys = parse_i64(act[0].as_ref())?;
        if numkeys <= 0 {
            return err(responses::ERR_NEGATIVE_NUMKEYS);
        }
        let numkeys = numkeys as usize;
        if act.len() < 1 + numkeys {
            return err(responses::ERR_SYNTAX);
        }
        let keys = &act[1..1 + numkeys];
        let mut limit = 0usize; // 0 = unlimited
        let rest = &act[1 + numkeys..];
        match rest.len() {
            0 => {}
            2 if rest[0].to_ascii_uppercase().as_slice() == b"LIMIT" => {
                let parsed = parse_i64(rest[1].as_ref())?;
                if parsed < 0 {
                    return err(responses::ERR_LIMIT_NEGATIVE);
                }
                limit = parsed as usize;
            }
            _ => return err(responses::ERR_SYNTAX),
        }
        let ks = handle.keyspace();
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match get_typed!(ks, key, now, Set) {
                Some(set) => sets.push(set),
                None => return Ok(Response::Integer(0)),
            }
        }
        // probe from the smallest input so the cap kicks in early
        sets.sort_unstable_by_key(|set| set.len());
        let (first, rest) = match sets.split_first() {
            Some(split) => split,
            None => return Ok(Response::Integer(0)),
        };
        let mut card = 0usize;
        for member in first.iter() {
            if rest.iter().all(|set| set.contains(member.as_ref())) {
                card += 1;
                if limit != 0 && card >= limit {
                    break;
                }
            }
        }
        Ok(Response::Integer(card as i64))
    }

    /// `SSCAN key cursor [MATCH pattern] [COUNT n]`
    fn sscan(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let cursor = parse_cursor(&act[1])?;
        let opts = parse_scan_opts(&act[2..])?;
        let ks = handle.keyspace();
        let mut members: Vec<Data> = get_typed!(ks, act[0], now, Set)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        drop(ks);
        members.sort_unstable();
        let (next, batch) = scan_page(members, cursor, opts.count, |member| {
            match &opts.pattern {
                Some(pattern) => glob_matches(pattern.as_ref(), member.as_ref()),
                None => true,
            }
        });
        Ok(scan_reply(
            next,
            batch.into_iter().map(Response::Bulk).collect(),
        ))
    }
}

/// Gather the input sets (an absent key is an empty set) and combine them.
/// Intersection iterates the smallest input and probes the rest
fn combine(
    ks: &Keyspace,
    keys: &[Data],
    now: u64,
    op: Algebra,
) -> ActionResult<HashSet<Data>> {
    let mut sets: Vec<Option<&HashSet<Data>>> = Vec::with_capacity(keys.len());
    for key in keys {
        match ks.get(key.as_ref(), now) {
            Some(Value::Set(set)) => sets.push(Some(set)),
            Some(_) => return err(responses::WRONGTYPE_ERR),
            None => sets.push(None),
        }
    }
    let result = match op {
        Algebra::Union => {
            let mut out = HashSet::new();
            for set in sets.into_iter().flatten() {
                out.extend(set.iter().cloned());
            }
            out
        }
        Algebra::Intersection => {
            if sets.iter().any(|set| set.is_none()) {
                return Ok(HashSet::new());
            }
            let mut sets: Vec<&HashSet<Data>> = sets.into_iter().flatten().collect();
            sets.sort_unstable_by_key(|set| set.len());
            let (first, rest) = match sets.split_first() {
                Some(split) => split,
                None => return Ok(HashSet::new()),
            };
            first
                .iter()
                .filter(|member| rest.iter().all(|set| set.contains(member.as_ref())))
                .cloned()
                .collect()
        }
        Algebra::Difference => {
            let mut iter = sets.into_iter();
            let mut out: HashSet<Data> = match iter.next().flatten() {
                Some(first) => first.clone(),
                None => return Ok(HashSet::new()),
            };
            for set in iter.flatten() {
                for member in set {
                    out.remove(member.as_ref());
                }
            }
            out
        }
    };
    Ok(result)
}

/// The `...STORE` variants: the whole read-combine-write runs under one
/// write guard. An empty result deletes the destination
fn combine_store(handle: &Corestore, act: &[Data], op: Algebra) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let mut ks = handle.keyspace_mut();
    let result = combine(&ks, &act[1..], now, op)?;
    let card = result.len();
    if result.is_empty() {
        let _ = ks.remove(act[0].as_ref(), now);
    } else {
        ks.insert(act[0].clone(), Value::Set(result), None);
    }
    drop(ks);
    handle.mark_dirty(1);
    Ok(Response::Integer(card as i64))
}
