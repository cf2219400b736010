/*
 * Created on Sat May 22 2021
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

//! The list engine: a double-ended sequence with O(1) push/pop at both
//! ends. The blocking variants (`BLPOP` and friends) degrade to their
//! non-blocking forms: the timeout is validated and then ignored.

use crate::actions::{err, parse_f64, parse_i64, resolve_index, normalize_range, ActionResult};
use crate::corestore::{Corestore, Data, Tag, Value};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::util;

action! {
    /// `LPUSH key element [element ...]`
    fn lpush(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        push(handle, act, true, false)
    }

    /// `RPUSH key element [element ...]`
    fn rpush(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        push(handle, act, false, false)
    }

    /// `LPUSHX key element [element ...]`: only if the list exists
    fn lpushx(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        push(handle, act, true, true)
    }

    /// `RPUSHX key element [element ...]`
    fn rpushx(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        push(handle, act, false, true)
    }

    /// `LPOP key [count]`
    fn lpop(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        pop(handle, act, true)
    }

    /// `RPOP key [count]`
    fn rpop(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        pop(handle, act, false)
    }

    /// `LLEN key`
    fn llen(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let len = get_typed!(ks, act[0], now, List).map(|l| l.len()).unwrap_or(0);
        Ok(Response::Integer(len as i64))
    }

    /// `LRANGE key start stop`: inclusive, negative offsets from the end,
    /// out-of-range yields an empty array
    fn lrange(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let start = parse_i64(act[1].as_ref())?;
        let stop = parse_i64(act[2].as_ref())?;
        let ks = handle.keyspace();
        let list = match get_typed!(ks, act[0], now, List) {
            Some(list) => list,
            None => return Ok(Response::Array(Vec::new())),
        };
        match normalize_range(start, stop, list.len()) {
            Some((start, stop)) => Ok(Response::Array(
                list.iter()
                    .skip(start)
                    .take(stop - start + 1)
                    .map(|e| Response::Bulk(e.clone()))
                    .collect(),
            )),
            None => Ok(Response::Array(Vec::new())),
        }
    }

    /// `LINDEX key index`
    fn lindex(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let idx = parse_i64(act[1].as_ref())?;
        let ks = handle.keyspace();
        let list = match get_typed!(ks, act[0], now, List) {
            Some(list) => list,
            None => return Ok(Response::NullBulk),
        };
        match resolve_index(idx, list.len()) {
            Some(idx) => Ok(Response::Bulk(list[idx].clone())),
            None => Ok(Response::NullBulk),
        }
    }

    /// `LSET key index element`
    fn lset(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let idx = parse_i64(act[1].as_ref())?;
        let mut ks = handle.keyspace_mut();
        let list = match get_typed_mut!(ks, act[0], now, List) {
            Some(list) => list,
            None => return err(responses::ERR_NO_SUCH_KEY),
        };
        match resolve_index(idx, list.len()) {
            Some(idx) => {
                list[idx] = act[2].clone();
            }
            None => return err(responses::ERR_INDEX_OUT_OF_RANGE),
        }
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Okay)
    }

    /// `LINSERT key BEFORE|AFTER pivot element`: -1 if the pivot is
    /// missing, 0 if the key is missing, else the new length
    fn linsert(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let before = match act[1].to_ascii_uppercase().as_slice() {
            b"BEFORE" => true,
            b"AFTER" => false,
            _ => return err(responses::ERR_SYNTAX),
        };
        let mut ks = handle.keyspace_mut();
        let list = match get_typed_mut!(ks, act[0], now, List) {
            Some(list) => list,
            None => return Ok(Response::Integer(0)),
        };
        let pos = list.iter().position(|e| e == &act[2]);
        let newlen = match pos {
            Some(pos) => {
                let at = if before { pos } else { pos + 1 };
                list.insert(at, act[3].clone());
                list.len() as i64
            }
            None => -1,
        };
        drop(ks);
        if newlen >= 0 {
            handle.mark_dirty(1);
        }
        Ok(Response::Integer(newlen))
    }

    /// `LREM key count element`: positive count removes from the head,
    /// negative from the tail, zero removes all
    fn lrem(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let count = parse_i64(act[1].as_ref())?;
        let mut ks = handle.keyspace_mut();
        let list = match get_typed_mut!(ks, act[0], now, List) {
            Some(list) => list,
            None => return Ok(Response::Integer(0)),
        };
        let mut removed = 0usize;
        if count >= 0 {
            let limit = if count == 0 { usize::MAX } else { count as usize };
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == act[2] {
                    let _ = list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let limit = count.unsigned_abs() as usize;
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == act[2] {
                    let _ = list.remove(i);
                    removed += 1;
                }
            }
        }
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(removed);
        Ok(Response::Integer(removed as i64))
    }

    /// `LTRIM key start stop`
    fn ltrim(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let start = parse_i64(act[1].as_ref())?;
        let stop = parse_i64(act[2].as_ref())?;
        let mut ks = handle.keyspace_mut();
        let list = match get_typed_mut!(ks, act[0], now, List) {
            Some(list) => list,
            None => return Ok(Response::Okay),
        };
        match normalize_range(start, stop, list.len()) {
            Some((start, stop)) => {
                list.truncate(stop + 1);
                for _ in 0..start {
                    let _ = list.pop_front();
                }
            }
            None => {
                // the range selects nothing: the list goes away entirely
                list.clear();
            }
        }
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Okay)
    }

    /// `RPOPLPUSH source destination`
    fn rpoplpush(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        move_element(handle, &act[0], &act[1], false, true)
    }

    /// `LMOVE source destination LEFT|RIGHT LEFT|RIGHT`
    fn lmove(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let from_front = parse_side(&act[2])?;
        let to_front = parse_side(&act[3])?;
        move_element(handle, &act[0], &act[1], from_front, to_front)
    }

    /// `LPOS key element [RANK r] [COUNT c] [MAXLEN m]`
    fn lpos(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut rank: i64 = 1;
        let mut count: Option<usize> = None;
        let mut maxlen: usize = 0;
        let mut i = 2;
        while i < act.len() {
            let opt = act[i].to_ascii_uppercase();
            i += 1;
            let raw = match act.get(i) {
                Some(raw) => raw,
                None => return err(responses::ERR_SYNTAX),
            };
            match opt.as_slice() {
                b"RANK" => {
                    rank = parse_i64(raw.as_ref())?;
                    if rank == 0 {
                        return err(responses::ERR_RANK_ZERO);
                    }
                }
                b"COUNT" => {
                    let c = parse_i64(raw.as_ref())?;
                    if c < 0 {
                        return err("ERR COUNT can't be negative");
                    }
                    count = Some(c as usize);
                }
                b"MAXLEN" => {
                    let m = parse_i64(raw.as_ref())?;
                    if m < 0 {
                        return err("ERR MAXLEN can't be negative");
                    }
                    maxlen = m as usize;
                }
                _ => return err(responses::ERR_SYNTAX),
            }
            i += 1;
        }
        let ks = handle.keyspace();
        let list = match get_typed!(ks, act[0], now, List) {
            Some(list) => list,
            None => {
                return Ok(if count.is_some() {
                    Response::Array(Vec::new())
                } else {
                    Response::NullBulk
                })
            }
        };
        let mut indexes: Vec<i64> = Vec::new();
        let skip_matches = rank.unsigned_abs() as usize - 1;
        let mut compared = 0usize;
        let mut found = 0usize;
        let forward = rank > 0;
        let positions: Vec<usize> = if forward {
            (0..list.len()).collect()
        } else {
            (0..list.len()).rev().collect()
        };
        for idx in positions {
            if maxlen != 0 && compared >= maxlen {
                break;
            }
            compared += 1;
            if list[idx] == act[1] {
                found += 1;
                if found > skip_matches {
                    indexes.push(idx as i64);
                    match count {
                        Some(0) => {}
                        Some(c) => {
                            if indexes.len() >= c {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        Ok(match count {
            Some(_) => Response::Array(indexes.into_iter().map(Response::Integer).collect()),
            None => match indexes.first() {
                Some(&idx) => Response::Integer(idx),
                None => Response::NullBulk,
            },
        })
    }

    /// `BLPOP key [key ...] timeout`: degraded to a non-blocking poll
    fn blpop(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        blocking_pop(handle, con, act, true)
    }

    /// `BRPOP key [key ...] timeout`
    fn brpop(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        blocking_pop(handle, con, act, false)
    }

    /// `BRPOPLPUSH source destination timeout`
    fn brpoplpush(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        parse_timeout(&act[2])?;
        move_element(handle, &act[0], &act[1], false, true)
    }

    /// `BLMOVE source destination LEFT|RIGHT LEFT|RIGHT timeout`
    fn blmove(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let from_front = parse_side(&act[2])?;
        let to_front = parse_side(&act[3])?;
        parse_timeout(&act[4])?;
        move_element(handle, &act[0], &act[1], from_front, to_front)
    }
}

fn parse_side(raw: &Data) -> ActionResult<bool> {
    match raw.to_ascii_uppercase().as_slice() {
        b"LEFT" => Ok(true),
        b"RIGHT" => Ok(false),
        _ => err(responses::ERR_SYNTAX),
    }
}

fn parse_timeout(raw: &Data) -> ActionResult<f64> {
    let timeout = parse_f64(raw.as_ref(), responses::ERR_TIMEOUT_NOT_FLOAT)?;
    if !timeout.is_finite() || timeout < 0.0 {
        return err(responses::ERR_TIMEOUT_NOT_FLOAT);
    }
    Ok(timeout)
}

fn push(handle: &Corestore, act: &[Data], front: bool, only_existing: bool) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let mut ks = handle.keyspace_mut();
    if only_existing {
        match ks.get(act[0].as_ref(), now) {
            Some(Value::List(_)) => {}
            Some(_) => return err(responses::WRONGTYPE_ERR),
            None => return Ok(Response::Integer(0)),
        }
    }
    let newlen = match ks.get_or_create(&act[0], Tag::List, now) {
        Some(Value::List(list)) => {
            for element in &act[1..] {
                if front {
                    list.push_front(element.clone());
                } else {
                    list.push_back(element.clone());
                }
            }
            list.len()
        }
        _ => return err(responses::WRONGTYPE_ERR),
    };
    drop(ks);
    handle.mark_dirty(act.len() - 1);
    Ok(Response::Integer(newlen as i64))
}

fn pop(handle: &Corestore, act: &[Data], front: bool) -> ActionResult<Response> {
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
    let list = match get_typed_mut!(ks, act[0], now, List) {
        Some(list) => list,
        None => {
            return Ok(match count {
                Some(_) => Response::NullArray,
                None => Response::NullBulk,
            })
        }
    };
    let take = count.unwrap_or(1).min(list.len());
    let mut popped = Vec::with_capacity(take);
    for _ in 0..take {
        let element = if front {
            list.pop_front()
        } else {
            list.pop_back()
        };
        match element {
            Some(element) => popped.push(element),
            None => break,
        }
    }
    ks.remove_if_drained(act[0].as_ref());
    drop(ks);
    handle.mark_dirty(popped.len());
    Ok(match count {
        Some(_) => Response::str_array(popped),
        None => Response::bulk_or_null(popped.into_iter().next()),
    })
}

/// The atomic pop-one-push-one at the heart of `RPOPLPUSH`/`LMOVE`. Both
/// sides happen under a single write guard
fn move_element(
    handle: &Corestore,
    src: &Data,
    dst: &Data,
    from_front: bool,
    to_front: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let mut ks = handle.keyspace_mut();
    match ks.get(src.as_ref(), now) {
        Some(Value::List(_)) => {}
        Some(_) => return err(responses::WRONGTYPE_ERR),
        None => return Ok(Response::NullBulk),
    }
    match ks.get(dst.as_ref(), now) {
        None | Some(Value::List(_)) => {}
        Some(_) => return err(responses::WRONGTYPE_ERR),
    }
    let element = if src == dst {
        // rotation within a single list
        match ks.get_mut(src.as_ref(), now).and_then(Value::as_list_mut) {
            Some(list) => {
                let element = if from_front {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                match element {
                    Some(element) => {
                        if to_front {
                            list.push_front(element.clone());
                        } else {
                            list.push_back(element.clone());
                        }
                        element
                    }
                    None => return Ok(Response::NullBulk),
                }
            }
            None => return Ok(Response::NullBulk),
        }
    } else {
        let element = match ks.get_mut(src.as_ref(), now).and_then(Value::as_list_mut) {
            Some(list) => {
                let element = if from_front {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                match element {
                    Some(element) => element,
                    None => return Ok(Response::NullBulk),
                }
            }
            None => return Ok(Response::NullBulk),
        };
        ks.remove_if_drained(src.as_ref());
        match ks.get_or_create(dst, Tag::List, now) {
            Some(Value::List(list)) => {
                if to_front {
                    list.push_front(element.clone());
                } else {
                    list.push_back(element.clone());
                }
            }
            _ => return err(responses::WRONGTYPE_ERR),
        }
        element
    };
    drop(ks);
    handle.mark_dirty(1);
    Ok(Response::Bulk(element))
}

fn blocking_pop(
    handle: &Corestore,
    _con: &mut ClientContext,
    act: &[Data],
    front: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let (keys, timeout) = act.split_at(act.len() - 1);
    parse_timeout(&timeout[0])?;
    let mut ks = handle.keyspace_mut();
    for key in keys {
        let list = match ks.get_mut(key.as_ref(), now) {
            Some(Value::List(list)) => list,
            Some(_) => return err(responses::WRONGTYPE_ERR),
            None => continue,
        };
        let element = if front {
            list.pop_front()
        } else {
            list.pop_back()
        };
        if let Some(element) = element {
            ks.remove_if_drained(key.as_ref());
            drop(ks);
            handle.mark_dirty(1);
            return Ok(Response::Array(vec![
                Response::Bulk(key.clone()),
                Response::Bulk(element),
            ]));
        }
    }
    Ok(Response::NullArray)
}
