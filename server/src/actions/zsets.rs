/*
 * Created on Wed Jun 23 2021
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

//! The sorted set commands, layered over [`SortedSet`]. Range queries use
//! true strict comparisons for `(` bounds, never an epsilon

use crate::actions::keys::{parse_cursor, parse_scan_opts, scan_page, scan_reply};
use crate::actions::{err, fmt_f64, parse_f64, parse_i64, normalize_range, ActionResult};
use crate::corestore::zset::{LexBound, ScoreBound, SortedSet};
use crate::corestore::{glob_matches, Corestore, Data, Tag, Value};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::util;

fn parse_score_bound(raw: &Data) -> ActionResult<ScoreBound> {
    let bytes = raw.as_ref();
    match bytes.split_first() {
        Some((b'(', rest)) => {
            let score = std::str::from_utf8(rest)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|f| !f.is_nan());
            match score {
                Some(score) => Ok(ScoreBound::Exclusive(score)),
                None => err(responses::ERR_MIN_MAX_NOT_FLOAT),
            }
        }
        _ => parse_f64(bytes, responses::ERR_MIN_MAX_NOT_FLOAT).map(ScoreBound::Inclusive),
    }
}

fn parse_lex_bound(raw: &Data) -> ActionResult<LexBound> {
    let bytes = raw.as_ref();
    match bytes.split_first() {
        Some((b'-', rest)) if rest.is_empty() => Ok(LexBound::NegInfinity),
        Some((b'+', rest)) if rest.is_empty() => Ok(LexBound::PosInfinity),
        Some((b'[', rest)) => Ok(LexBound::Inclusive(Data::copy_from_slice(rest))),
        Some((b'(', rest)) => Ok(LexBound::Exclusive(Data::copy_from_slice(rest))),
        _ => err(responses::ERR_MIN_MAX_NOT_LEX),
    }
}

/// Which index a range query runs against
#[derive(Clone, Copy, PartialEq)]
enum RangeBy {
    Rank,
    Score,
    Lex,
}

struct RangeSpec {
    by: RangeBy,
    rev: bool,
    /// (offset, count): count < 0 means unlimited
    limit: Option<(i64, i64)>,
}

/// Run a parsed range spec against a sorted set. For `REV` with score or
/// lex ranges the caller passes the arguments in `(max, min)` order, as
/// the wire protocol does
fn execute_range(
    zs: &SortedSet,
    start_raw: &Data,
    stop_raw: &Data,
    spec: &RangeSpec,
) -> ActionResult<Vec<(Data, f64)>> {
    let (offset, count) = spec.limit.unwrap_or((0, -1));
    if offset < 0 {
        return Ok(Vec::new());
    }
    let (offset, count) = (offset as usize, count);
    match spec.by {
        RangeBy::Rank => {
            let start = parse_i64(start_raw.as_ref())?;
            let stop = parse_i64(stop_raw.as_ref())?;
            let len = zs.len();
            let range = match normalize_range(start, stop, len) {
                Some(range) => range,
                None => return Ok(Vec::new()),
            };
            let (lo, hi) = if spec.rev {
                // indexes counted from the high end
                (len - 1 - range.1, len - 1 - range.0)
            } else {
                range
            };
            let mut out = zs.range_by_rank(lo, hi);
            if spec.rev {
                out.reverse();
            }
            Ok(out)
        }
        RangeBy::Score => {
            let (min_raw, max_raw) = if spec.rev {
                (stop_raw, start_raw)
            } else {
                (start_raw, stop_raw)
            };
            let min = parse_score_bound(min_raw)?;
            let max = parse_score_bound(max_raw)?;
            Ok(zs.range_by_score(&min, &max, spec.rev, offset, count))
        }
        RangeBy::Lex => {
            let (min_raw, max_raw) = if spec.rev {
                (stop_raw, start_raw)
            } else {
                (start_raw, stop_raw)
            };
            let min = parse_lex_bound(min_raw)?;
            let max = parse_lex_bound(max_raw)?;
            Ok(zs.range_by_lex(&min, &max, spec.rev, offset, count))
        }
    }
}

/// Parse the option tail of `ZRANGE`/`ZRANGESTORE`:
/// `[BYSCORE|BYLEX] [REV] [LIMIT offset count] [WITHSCORES]`
fn parse_range_options(
    opts: &[Data],
    allow_withscores: bool,
) -> ActionResult<(RangeSpec, bool)> {
    let mut spec = RangeSpec {
        by: RangeBy::Rank,
        rev: false,
        limit: None,
    };
    let mut withscores = false;
    let mut i = 0;
    while i < opts.len() {
        match opts[i].to_ascii_uppercase().as_slice() {
            b"BYSCORE" => spec.by = RangeBy::Score,
            b"BYLEX" => spec.by = RangeBy::Lex,
            b"REV" => spec.rev = true,
            b"WITHSCORES" if allow_withscores => withscores = true,
            b"LIMIT" => {
                if i + 2 >= opts.len() {
                    return err(responses::ERR_SYNTAX);
                }
                let offset = parse_i64(opts[i + 1].as_ref())?;
                let count = parse_i64(opts[i + 2].as_ref())?;
                spec.limit = Some((offset, count));
                i += 2;
            }
            _ => return err(responses::ERR_SYNTAX),
        }
        i += 1;
    }
    if spec.limit.is_some() && spec.by == RangeBy::Rank {
        return err(responses::ERR_LIMIT_NEEDS_BY);
    }
    if withscores && spec.by == RangeBy::Lex {
        return err(responses::ERR_WITHSCORES_WITH_BYLEX);
    }
    Ok((spec, withscores))
}

fn range_reply(entries: Vec<(Data, f64)>, withscores: bool) -> Response {
    if withscores {
        let mut flat = Vec::with_capacity(entries.len() * 2);
        for (member, score) in entries {
            flat.push(Response::Bulk(member));
            flat.push(Response::Bulk(Data::from(fmt_f64(score))));
        }
        Response::Array(flat)
    } else {
        Response::str_array(entries.into_iter().map(|(m, _)| m).collect())
    }
}

action! {
    /// `ZADD key [NX|XX] [GT|LT] [CH] [INCR] score member [score member ...]`
    fn zadd(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let (mut nx, mut xx, mut gt, mut lt, mut ch, mut incr) =
            (false, false, false, false, false, false);
        let mut i = 1;
        while i < act.len() {
            match act[i].to_ascii_uppercase().as_slice() {
                b"NX" => nx = true,
                b"XX" => xx = true,
                b"GT" => gt = true,
                b"LT" => lt = true,
                b"CH" => ch = true,
                b"INCR" => incr = true,
                _ => break,
            }
            i += 1;
        }
        if nx && xx {
            return err(responses::ERR_ZADD_NX_XX);
        }
        if (gt && lt) || (nx && (gt || lt)) {
            return err(responses::ERR_ZADD_GT_LT_NX);
        }
        let pairs = &act[i..];
        if pairs.is_empty() {
            return err("ERR wrong number of arguments for 'zadd' command");
        }
        if pairs.len() % 2 != 0 {
            return err(responses::ERR_SYNTAX);
        }
        if incr && pairs.len() != 2 {
            return err(responses::ERR_ZADD_INCR_PAIRS);
        }
        // validate every score before touching the keyspace
        let mut scores = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            scores.push(parse_f64(pair[0].as_ref(), responses::ERR_NOT_FLOAT)?);
        }
        let mut ks = handle.keyspace_mut();
        if xx && !ks.contains(act[0].as_ref(), now) {
            return Ok(if incr {
                Response::NullBulk
            } else {
                Response::Integer(0)
            });
        }
        let zs = match ks.get_or_create(&act[0], Tag::Zset, now) {
            Some(Value::Zset(zs)) => zs,
            _ => return err(responses::WRONGTYPE_ERR),
        };
        let mut added = 0usize;
        let mut changed = 0usize;
        let mut incr_reply: Option<Option<f64>> = None;
        for (idx, pair) in pairs.chunks_exact(2).enumerate() {
            let score = scores[idx];
            let member = &pair[1];
            match zs.score(member.as_ref()) {
                Some(old) => {
                    if nx {
                        if incr {
                            incr_reply = Some(None);
                        }
                        continue;
                    }
                    let new = if incr { old + score } else { score };
                    if new.is_nan() {
                        return err(responses::ERR_NAN_SCORE);
                    }
                    if (gt && new <= old) || (lt && new >= old) {
                        if incr {
                            incr_reply = Some(None);
                        }
                        continue;
                    }
                    if new != old {
                        zs.insert(member.clone(), new);
                        changed += 1;
                    }
                    if incr {
                        incr_reply = Some(Some(new));
                    }
                }
                None => {
                    if xx {
                        if incr {
                            incr_reply = Some(None);
                        }
                        continue;
                    }
                    zs.insert(member.clone(), score);
                    added += 1;
                    if incr {
                        incr_reply = Some(Some(score));
                    }
                }
            }
        }
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(added + changed);
        if incr {
            return Ok(match incr_reply.flatten() {
                Some(new) => Response::Bulk(Data::from(fmt_f64(new))),
                None => Response::NullBulk,
            });
        }
        Ok(Response::Integer(if ch {
            (added + changed) as i64
        } else {
            added as i64
        }))
    }

    /// `ZREM key member [member ...]`
    fn zrem(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let mut ks = handle.keyspace_mut();
        let removed = match get_typed_mut!(ks, act[0], now, Zset) {
            Some(zs) => act[1..]
                .iter()
                .filter(|member| zs.remove(member.as_ref()))
                .count(),
            None => 0,
        };
        ks.remove_if_drained(act[0].as_ref());
        drop(ks);
        handle.mark_dirty(removed);
        Ok(Response::Integer(removed as i64))
    }

    /// `ZSCORE key member`
    fn zscore(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let score = get_typed!(ks, act[0], now, Zset).and_then(|zs| zs.score(act[1].as_ref()));
        Ok(match score {
            Some(score) => Response::Bulk(Data::from(fmt_f64(score))),
            None => Response::NullBulk,
        })
    }

    /// `ZMSCORE key member [member ...]`
    fn zmscore(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let zs = get_typed!(ks, act[0], now, Zset);
        let scores = act[1..]
            .iter()
            .map(|member| {
                match zs.and_then(|z| z.score(member.as_ref())) {
                    Some(score) => Response::Bulk(Data::from(fmt_f64(score))),
                    None => Response::NullBulk,
                }
            })
            .collect();
        Ok(Response::Array(scores))
    }

    /// `ZCARD key`
    fn zcard(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let ks = handle.keyspace();
        let card = get_typed!(ks, act[0], now, Zset).map(|z| z.len()).unwrap_or(0);
        Ok(Response::Integer(card as i64))
    }

    /// `ZCOUNT key min max`
    fn zcount(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let min = parse_score_bound(&act[1])?;
        let max = parse_score_bound(&act[2])?;
        let ks = handle.keyspace();
        let count = get_typed!(ks, act[0], now, Zset)
            .map(|zs| zs.count_in_score_range(&min, &max))
            .unwrap_or(0);
        Ok(Response::Integer(count as i64))
    }

    /// `ZINCRBY key increment member`
    fn zincrby(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let delta = parse_f64(act[1].as_ref(), responses::ERR_NOT_FLOAT)?;
        let mut ks = handle.keyspace_mut();
        let new = match ks.get_or_create(&act[0], Tag::Zset, now) {
            Some(Value::Zset(zs)) => {
                let new = zs.score(act[2].as_ref()).unwrap_or(0.0) + delta;
                if new.is_nan() {
                    return err(responses::ERR_NAN_SCORE);
                }
                zs.insert(act[2].clone(), new);
                new
            }
            _ => return err(responses::WRONGTYPE_ERR),
        };
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Bulk(Data::from(fmt_f64(new))))
    }

    /// `ZRANK key member [WITHSCORE]`
    fn zrank(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        rank_of(handle, con, act, false)
    }

    /// `ZREVRANK key member [WITHSCORE]`
    fn zrevrank(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        rank_of(handle, con, act, true)
    }

    /// `ZRANGE key start stop [BYSCORE|BYLEX] [REV] [LIMIT offset count]
    /// [WITHSCORES]`: the unified range query
    fn zrange(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let (spec, withscores) = parse_range_options(&act[3..], true)?;
        let ks = handle.keyspace();
        let entries = match get_typed!(ks, act[0], now, Zset) {
            Some(zs) => execute_range(zs, &act[1], &act[2], &spec)?,
            None => Vec::new(),
        };
        Ok(range_reply(entries, withscores))
    }

    /// `ZREVRANGE key start stop [WITHSCORES]`
    fn zrevrange(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let withscores = parse_withscores_tail(&act[3..])?;
        let spec = RangeSpec { by: RangeBy::Rank, rev: true, limit: None };
        let ks = handle.keyspace();
        let entries = match get_typed!(ks, act[0], now, Zset) {
            Some(zs) => execute_range(zs, &act[1], &act[2], &spec)?,
            None => Vec::new(),
        };
        Ok(range_reply(entries, withscores))
    }

    /// `ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count]`
    fn zrangebyscore(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        score_range(handle, con, act, false)
    }

    /// `ZREVRANGEBYSCORE key max min [WITHSCORES] [LIMIT offset count]`
    fn zrevrangebyscore(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        score_range(handle, con, act, true)
    }

    /// `ZRANGEBYLEX key min max [LIMIT offset count]`
    fn zrangebylex(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        lex_range(handle, con, act, false)
    }

    /// `ZREVRANGEBYLEX key max min [LIMIT offset count]`
    fn zrevrangebylex(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        lex_range(handle, con, act, true)
    }

    /// `ZPOPMIN key [count]`
    fn zpopmin(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        pop_end(handle, con, act, true)
    }

    /// `ZPOPMAX key [count]`
    fn zpopmax(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        pop_end(handle, con, act, false)
    }

    /// `BZPOPMIN key [key ...] timeout`: degraded to a non-blocking poll
    fn bzpopmin(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        blocking_pop_end(handle, con, act, true)
    }

    /// `BZPOPMAX key [key ...] timeout`
    fn bzpopmax(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        blocking_pop_end(handle, con, act, false)
    }

    /// `ZRANGESTORE dst src start stop [BYSCORE|BYLEX] [REV] [LIMIT offset
    /// count]`: run a range on `src` and store the result at `dst`
    fn zrangestore(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let (spec, _) = parse_range_options(&act[4..], false)?;
        let mut ks = handle.keyspace_mut();
        let entries = match ks.get(act[1].as_ref(), now) {
            Some(Value::Zset(zs)) => execute_range(zs, &act[2], &act[3], &spec)?,
            Some(_) => return err(responses::WRONGTYPE_ERR),
            None => Vec::new(),
        };
        let card = entries.len();
        if entries.is_empty() {
            let _ = ks.remove(act[0].as_ref(), now);
        } else {
            ks.insert(act[0].clone(), Value::Zset(SortedSet::from_entries(entries)), None);
        }
        drop(ks);
        handle.mark_dirty(1);
        Ok(Response::Integer(card as i64))
    }

    /// `ZSCAN key cursor [MATCH pattern] [COUNT n]`: pages `(member,
    /// score)` pairs in rank order
    fn zscan(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let now = util::time_now_ms();
        let cursor = parse_cursor(&act[1])?;
        let opts = parse_scan_opts(&act[2..])?;
        let ks = handle.keyspace();
        let entries: Vec<(Data, f64)> = get_typed!(ks, act[0], now, Zset)
            .map(|zs| zs.iter().map(|(m, s)| (m.clone(), s)).collect())
            .unwrap_or_default();
        drop(ks);
        let (next, batch) = scan_page(entries, cursor, opts.count, |(member, _)| {
            match &opts.pattern {
                Some(pattern) => glob_matches(pattern.as_ref(), member.as_ref()),
                None => true,
            }
        });
        let mut flat = Vec::with_capacity(batch.len() * 2);
        for (member, score) in batch {
            flat.push(Response::Bulk(member));
            flat.push(Response::Bulk(Data::from(fmt_f64(score))));
        }
        Ok(scan_reply(next, flat))
    }
}

fn parse_withscores_tail(opts: &[Data]) -> ActionResult<bool> {
    match opts.len() {
        0 => Ok(false),
        1 if opts[0].to_ascii_uppercase().as_slice() == b"WITHSCORES" => Ok(true),
        _ => err(responses::ERR_SYNTAX),
    }
}

/// Parse `[WITHSCORES] [LIMIT offset count]` in either order
fn parse_score_range_tail(opts: &[Data]) -> ActionResult<(bool, Option<(i64, i64)>)> {
    let mut withscores = false;
    let mut limit = None;
    let mut i = 0;
    while i < opts.len() {
        match opts[i].to_ascii_uppercase().as_slice() {
            b"WITHSCORES" => withscores = true,
            b"LIMIT" => {
                if i + 2 >= opts.len() {
                    return err(responses::ERR_SYNTAX);
                }
                limit = Some((
                    parse_i64(opts[i + 1].as_ref())?,
                    parse_i64(opts[i + 2].as_ref())?,
                ));
                i += 2;
            }
            _ => return err(responses::ERR_SYNTAX),
        }
        i += 1;
    }
    Ok((withscores, limit))
}

fn score_range(
    handle: &Corestore,
    _con: &mut ClientContext,
    act: &[Data],
    rev: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let (withscores, limit) = parse_score_range_tail(&act[3..])?;
    let spec = RangeSpec {
        by: RangeBy::Score,
        rev,
        limit,
    };
    let ks = handle.keyspace();
    let entries = match get_typed!(ks, act[0], now, Zset) {
        Some(zs) => execute_range(zs, &act[1], &act[2], &spec)?,
        None => Vec::new(),
    };
    Ok(range_reply(entries, withscores))
}

fn lex_range(
    handle: &Corestore,
    _con: &mut ClientContext,
    act: &[Data],
    rev: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let (withscores, limit) = parse_score_range_tail(&act[3..])?;
    if withscores {
        return err(responses::ERR_WITHSCORES_WITH_BYLEX);
    }
    let spec = RangeSpec {
        by: RangeBy::Lex,
        rev,
        limit,
    };
    let ks = handle.keyspace();
    let entries = match get_typed!(ks, act[0], now, Zset) {
        Some(zs) => execute_range(zs, &act[1], &act[2], &spec)?,
        None => Vec::new(),
    };
    Ok(range_reply(entries, false))
}

fn rank_of(
    handle: &Corestore,
    _con: &mut ClientContext,
    act: &[Data],
    rev: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let withscore = match act.get(2) {
        Some(raw) if raw.to_ascii_uppercase().as_slice() == b"WITHSCORE" => true,
        Some(_) => return err(responses::ERR_SYNTAX),
        None => false,
    };
    let ks = handle.keyspace();
    let zs = get_typed!(ks, act[0], now, Zset);
    let found = zs.and_then(|z| {
        z.rank(act[1].as_ref(), rev)
            .and_then(|rank| z.score(act[1].as_ref()).map(|score| (rank, score)))
    });
    Ok(match found {
        Some((rank, score)) => {
            if withscore {
                Response::Array(vec![
                    Response::Integer(rank as i64),
                    Response::Bulk(Data::from(fmt_f64(score))),
                ])
            } else {
                Response::Integer(rank as i64)
            }
        }
        None => {
            if withscore {
                Response::NullArray
            } else {
                Response::NullBulk
            }
        }
    })
}

fn pop_end(
    handle: &Corestore,
    _con: &mut ClientContext,
    act: &[Data],
    min: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let count = match act.get(1) {
        Some(raw) => {
            let count = parse_i64(raw.as_ref())?;
            if count < 0 {
                return err(responses::ERR_VALUE_MUST_BE_POSITIVE);
            }
            count as usize
        }
        None => 1,
    };
    let mut ks = handle.keyspace_mut();
    let popped = match get_typed_mut!(ks, act[0], now, Zset) {
        Some(zs) => {
            if min {
                zs.pop_min(count)
            } else {
                zs.pop_max(count)
            }
        }
        None => Vec::new(),
    };
    ks.remove_if_drained(act[0].as_ref());
    drop(ks);
    handle.mark_dirty(popped.len());
    let mut flat = Vec::with_capacity(popped.len() * 2);
    for (member, score) in popped {
        flat.push(Response::Bulk(member));
        flat.push(Response::Bulk(Data::from(fmt_f64(score))));
    }
    Ok(Response::Array(flat))
}

fn blocking_pop_end(
    handle: &Corestore,
    _con: &mut ClientContext,
    act: &[Data],
    min: bool,
) -> ActionResult<Response> {
    let now = util::time_now_ms();
    let (keys, timeout) = act.split_at(act.len() - 1);
    let timeout = parse_f64(timeout[0].as_ref(), responses::ERR_TIMEOUT_NOT_FLOAT)?;
    if !timeout.is_finite() || timeout < 0.0 {
        return err(responses::ERR_TIMEOUT_NOT_FLOAT);
    }
    let mut ks = handle.keyspace_mut();
    for key in keys {
        let popped = match ks.get_mut(key.as_ref(), now) {
            Some(Value::Zset(zs)) => {
                if min {
                    zs.pop_min(1)
                } else {
                    zs.pop_max(1)
                }
            }
            Some(_) => return err(responses::WRONGTYPE_ERR),
            None => continue,
        };
        if let Some((member, score)) = popped.into_iter().next() {
            ks.remove_if_drained(key.as_ref());
            drop(ks);
            handle.mark_dirty(1);
            return Ok(Response::Array(vec![
                Response::Bulk(key.clone()),
                Response::Bulk(member),
                Response::Bulk(Data::from(fmt_f64(score))),
            ]));
        }
    }
    Ok(Response::NullArray)
}
