/*
 * Created on Thu May 20 2021
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

//! The string engine: byte strings with numeric overlays

use crate::actions::{
    err, fmt_f64, normalize_range, parse_f64, parse_i64, ActionError, ActionResult,
};
use crate::corestore::{Corestore, Data, Tag, Value};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::util;

/// How `GETEX` treats the TTL of the touched key
enum TtlDirective {
    /// `PERSIST`: drop any TTL
    Clear,
    /// an absolute instant in ms
    At(u64),
}

/// Parse one `EX s|PX ms|EXAT s|PXAT ms` option value into an absolute
/// instant. `cmd` only feeds the error line
fn expiry_to_instant(opt: &[u8], raw: &Data, now: u64, cmd: &str) -> ActionResult<u64> {
    let n = parse_i64(raw.as_ref())?;
    if n <= 0 {
        return err(format!("ERR invalid expire time in '{}' command", cmd));
    }
    let at = match opt {
        b"EX" => now.checked_add((n as u64).saturating_mul(1000)),
        b"PX" => now.checked_add(n as u64),
        b"EXAT" => (n as u64).checked_mul(1000),
        b"PXAT" => Some(n as u64),
        _ => None,
    };
    at.ok_or_else(|| ActionError::from(responses::ERR_NOT_INTEGER))
}

action! {
    /// `SET key value [EX s|PX ms|EXAT t|PXAT t] [NX|XX] [KEEPTTL] [GET]`
    fn set(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let key = &act[0];
        let value = act[1].clone();
        let (mut nx, mut xx, mut get, mut keepttl) = (false, false, false, false);
        let mut expire: Option<u64> = None;
        let mut i = 2;
        while i < act.len() {
            let opt = act[i].to_ascii_uppercase();
            match opt.as_slice() {
                b"NX" if !xx => nx = true,
                b"XX" if !nx => xx = true,
                b"GET" => get = true,
                b"KEEPTTL" if expire.is_none() => keepttl = true,
                b"EX" | b"PX" | b"EXAT" | b"PXAT" if !keepttl && expire.is_none() => {
                    i += 1;
                    let raw = match act.get(i) {
                        Some(raw) => raw,
                        None => return err(responses::ERR_SYNTAX),
                    };
                    expire = Some(expiry_to_instant(opt.as_slice(), raw, now, "set")?);
                }
                _ => return err(responses::ERR_SYNTAX),
            }
            i += 1;
        }
        let mut ks = handle.keyspace_mut();
        let (exists, old, old_expiry) = match ks.get_entry(key.as_ref(), now) {
            Some(entry) => {
                if get && entry.value.tag() != Tag::Str {
                    return err(responses::WRONGTYPE_ERR);
                }
                (true, entry.value.as_str().cloned(), entry.expires_at)
            }
            None => (false, None, None),
        };
        if (nx && exists) || (xx && !exists) {
            return Ok(if get {
                Response::bulk_or_null(old)
            } else {
                Response::NullBulk
            });
        }
        let expires_at = match expire {
            Some(at) => Some(at),
            None if keepttl => old_expiry,
            None => None,
        };
        ks.insert(key.clone(), Value::Str(value), expires_at);
        drop(ks);
        handle.mark_dirty(1);
        Ok(if get {
            Response::bulk_or_null(old)
        } else {
            Response::Okay
        })
    }

    /// `GET key`
    fn get(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        match get_typed!(ks, act[0], now, Str) {
            Some(data) => Ok(Response::Bulk(data.clone())),
            None => Ok(Response::NullBulk),
        }
    }

    /// `GETDEL key`
    fn getdel(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let old = match get_typed_mut!(ks, act[0], now, Str) {
            Some(data) => data.clone(),
            None => return Ok(Response::NullBulk),
        };
        let _ = ks.remove(act[0].as_ref(), now);
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Bulk(old))
    }

    /// `GETSET key value`
    fn getset(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let old = match ks.get(act[0].as_ref(), now) {
            Some(Value::Str(data)) => Some(data.clone()),
            Some(_) => return err(responses::WRONGTYPE_ERR),
            None => None,
        };
        ks.insert(act[0].clone(), Value::Str(act[1].clone()), None);
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::bulk_or_null(old))
    }

    /// `GETEX key [EX s|PX ms|EXAT t|PXAT t|PERSIST]`
    fn getex(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut directive: Option<TtlDirective> = None;
        let mut i = 1;
        while i < act.len() {
            if directive.is_some() {
                return err(responses::ERR_SYNTAX);
            }
            let opt = act[i].to_ascii_uppercase();
            match opt.as_slice() {
                b"PERSIST" => directive = Some(TtlDirective::Clear),
                b"EX" | b"PX" | b"EXAT" | b"PXAT" => {
                    i += 1;
                    let raw = match act.get(i) {
                        Some(raw) => raw,
                        None => return err(responses::ERR_SYNTAX),
                    };
                    directive =
                        Some(TtlDirective::At(expiry_to_instant(opt.as_slice(), raw, now, "getex")?));
                }
                _ => return err(responses::ERR_SYNTAX),
            }
            i += 1;
        }
        let mut ks = handle.keyspace_mut();
        let mut changed = false;
        let value = match ks.get_entry_mut(act[0].as_ref(), now) {
            Some(entry) => {
                let data = match &entry.value {
                    Value::Str(data) => data.clone(),
                    _ => return err(responses::WRONGTYPE_ERR),
                };
                changed = match directive {
                    Some(TtlDirective::Clear) => entry.expires_at.take().is_some(),
                    Some(TtlDirective::At(at)) => {
                        entry.expires_at = Some(at);
                        true
                    }
                    None => false,
                };
                Some(data)
            }
            None => None,
        };
        drop(ks);
        if changed {
            handle.mark_dirty(1);
        }
        Ok(Response::bulk_or_null(value))
    }

    /// `APPEND key value`
    fn append(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let newlen = match ks.get_or_create(&act[0], Tag::Str, now) {
            Some(Value::Str(data)) => {
                let mut buf = Vec::with_capacity(data.len() + act[1].len());
                buf.extend_from_slice(data.as_ref());
                buf.extend_from_slice(act[1].as_ref());
                let newlen = buf.len();
                *data = Data::from(buf);
                newlen
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(newlen as i64))
    }

    /// `STRLEN key`
    fn strlen(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let len = get_typed!(ks, act[0], now, Str).map(|d| d.len()).unwrap_or(0);
        Ok(Response::Integer(len as i64))
    }

    /// `GETRANGE key start end` (inclusive, negative offsets count from the
    /// end; out of range is an empty string, never an error)
    fn getrange(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let start = parse_i64(act[1].as_ref())?;
        let stop = parse_i64(act[2].as_ref())?;
        let ks = handle.keyspace();
        let data = match get_typed!(ks, act[0], now, Str) {
            Some(data) => data,
            None => return Ok(Response::Bulk(Data::empty())),
        };
        match normalize_range(start, stop, data.len()) {
            Some((start, stop)) => Ok(Response::Bulk(Data::copy_from_slice(
                &data.as_ref()[start..=stop],
            ))),
            None => Ok(Response::Bulk(Data::empty())),
        }
    }

    /// `SETRANGE key offset value`: overwrite at offset, zero-padding any
    /// gap
    fn setrange(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let offset = parse_i64(act[1].as_ref())?;
        if offset < 0 {
            return err(responses::ERR_OFFSET_OUT_OF_RANGE);
        }
        let offset = offset as usize;
        let patch = &act[2];
        let mut ks = handle.keyspace_mut();
        if patch.is_empty() && ks.get(act[0].as_ref(), now).is_none() {
            // nothing to write and nothing to create
            return Ok(Response::Integer(0));
        }
        let newlen = match ks.get_or_create(&act[0], Tag::Str, now) {
            Some(Value::Str(data)) => {
                let mut buf = data.as_ref().to_vec();
                if buf.len() < offset + patch.len() {
                    buf.resize(offset + patch.len(), 0);
                }
                buf[offset..offset + patch.len()].copy_from_slice(patch.as_ref());
                let newlen = buf.len();
                *data = Data::from(buf);
                newlen
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(newlen as i64))
    }

    /// `INCR key`
    fn incr(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        incr_by(handle, con, &act[0], 1)
    }

    /// `DECR key`
    fn decr(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        incr_by(handle, con, &act[0], -1)
    }

    /// `INCRBY key n`
    fn incrby(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let delta = parse_i64(act[1].as_ref())?;
        incr_by(handle, con, &act[0], delta)
    }

    /// `DECRBY key n`
    fn decrby(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let delta = parse_i64(act[1].as_ref())?;
        incr_by(handle, con, &act[0], delta.checked_neg().ok_or_else(|| {
            ActionError::from(responses::ERR_OVERFLOW)
        })?)
    }

    /// `INCRBYFLOAT key f`
    fn incrbyfloat(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let delta = parse_f64(act[1].as_ref(), responses::ERR_NOT_FLOAT)?;
        let mut ks = handle.keyspace_mut();
        let formatted = match ks.get_entry_mut(act[0].as_ref(), now) {
            Some(entry) => {
                let cur = match &entry.value {
                    Value::Str(data) => parse_f64(data.as_ref(), responses::ERR_NOT_FLOAT)?,
                    _ => return err(responses::WRONGTYPE_ERR),
                };
                let new = cur + delta;
                if !new.is_finite() {
                    return err(responses::ERR_FLOAT_NAN_OR_INF);
                }
                let formatted = fmt_f64(new);
                entry.value = Value::Str(Data::from(formatted.as_str()));
                formatted
            }
            None => {
                if !delta.is_finite() {
                    return err(responses::ERR_FLOAT_NAN_OR_INF);
                }
                let formatted = fmt_f64(delta);
                ks.insert(act[0].clone(), Value::Str(Data::from(formatted.as_str())), None);
                formatted
            }
        };
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Bulk(Data::from(formatted)))
    }

    /// `MGET key [key ...]`: a null for every miss or type mismatch
    fn mget(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let values = act
            .iter()
            .map(|key| match ks.get(key.as_ref(), now) {
                Some(Value::Str(data)) => Response::Bulk(data.clone()),
                _ => Response::NullBulk,
            })
            .collect();
        Ok(Response::Array(values))
    }

    /// `MSET key value [key value ...]`
    fn mset(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        if act.len() % 2 != 0 {
            return err("ERR wrong number of arguments for 'mset' command");
        }
        let mut ks = handle.keyspace_mut();
        for pair in act.chunks_exact(2) {
            ks.insert(pair[0].clone(), Value::Str(pair[1].clone()), None);
        }
        drop(ks);
        handle.mark_dirty(act.len() / 2);
        Ok(Response::Okay)
    }

    /// `MSETNX key value [key value ...]`: all-or-nothing
    fn msetnx(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        if act.len() % 2 != 0 {
            return err("ERR wrong number of arguments for 'msetnx' command");
        }
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let clash = act
            .chunks_exact(2)
            .any(|pair| ks.contains(pair[0].as_ref(), now));
        if clash {
            return Ok(Response::Integer(0));
        }
        for pair in act.chunks_exact(2) {
            ks.insert(pair[0].clone(), Value::Str(pair[1].clone()), None);
        }
        drop(ks);
        handle.mark_dirty(act.len() / 2);
        Ok(Response::Integer(1))
    }

    /// `SETNX key value`
    fn setnx(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        if ks.contains(act[0].as_ref(), now) {
            return Ok(Response::Integer(0));
        }
        ks.insert(act[0].clone(), Value::Str(act[1].clone()), None);
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(1))
    }

    /// `SETEX key seconds value`
    fn setex(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        set_with_lifetime(handle, act, 1000, "setex")
    }

    /// `PSETEX key milliseconds value`
    fn psetex(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        set_with_lifetime(handle, act, 1, "psetex")
    }
}

fn set_with_lifetime(
    handle: &Corestore,
    act: &[Data],
    unit_ms: u64,
    cmd: &str,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let lifetime = parse_i64(act[1].as_ref())?;
    if lifetime <= 0 {
        return err(format!("ERR invalid expire time in '{}' command", cmd));
    }
    let expires_at = now.saturating_add((lifetime as u64).saturating_mul(unit_ms));
    let mut ks = handle.keyspace_mut();
    ks.insert(act[0].clone(), Value::Str(act[2].clone()), Some(expires_at));
    drop(ks);
    handle.mark_dirty(1);
    Ok(Response::Okay)
}

fn incr_by(
    handle: &Corestore,
    _con: &mut ClientContext,
    key: &Data,
    delta: i64,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let mut ks = handle.keyspace_mut();
    let new = match ks.get_entry_mut(key.as_ref(), now) {
        Some(entry) => {
            let cur = match &entry.value {
                Value::Str(data) => parse_i64(data.as_ref())?,
                _ => return err(responses::WRONGTYPE_ERR),
            };
            let new = cur
                .checked_add(delta)
                .ok_or_else(|| ActionError::from(responses::ERR_OVERFLOW))?;
            entry.value = Value::Str(Data::from(new.to_string()));
            new
        }
        None => {
            ks.insert(key.clone(), Value::Str(Data::from(delta.to_string())), None);
            delta
        }
    };
    drop(ks);
    handle.mark_dirty(1);
    Ok(Response::Integer(new))
}
